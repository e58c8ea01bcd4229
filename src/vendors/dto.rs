use serde::{Deserialize, Serialize};

use super::repo_types::{NewAddress, VendorFields, VendorUpdate};
use crate::{
    error::{ApiError, ApiResult},
    multipart::FormData,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct VendorCreated {
    pub message: String,
    pub vendor_id: i32,
    pub documents: usize,
}

#[derive(Debug, Serialize)]
pub struct VendorUpdated {
    pub vendor_id: i32,
}

impl VendorFields {
    pub fn from_form(form: &FormData) -> ApiResult<Self> {
        Ok(Self {
            vendor_name: form.required("vendor_name")?.to_string(),
            vendor_type: form.owned("vendor_type"),
            vendor_tier: form.owned("vendor_tier"),
            pan: form.owned("pan"),
            gstin: form.owned("gstin"),
            primary_contact_name: form.owned("primary_contact_name"),
            primary_contact_phone: form.owned("primary_contact_phone"),
            primary_contact_email: form.owned("primary_contact_email"),
            vendor_email: form.owned("vendor_email"),
            vendor_phone: form.owned("vendor_phone"),
            vendor_status: form
                .owned("vendor_status")
                .unwrap_or_else(|| "Active".into()),
            comments: form.owned("comments"),
        }
        .trimmed()?)
    }

    /// Trims the name and rejects a blank one.
    pub fn trimmed(mut self) -> ApiResult<Self> {
        self.vendor_name = self.vendor_name.trim().to_string();
        if self.vendor_name.is_empty() {
            return Err(ApiError::validation("vendor_name is required"));
        }
        Ok(self)
    }
}

impl VendorUpdate {
    /// Multipart edit: flat vendor fields plus an `addresses` JSON array.
    pub fn from_form(form: &FormData) -> ApiResult<Self> {
        let addresses = match form.text("addresses") {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|_| ApiError::validation("addresses must be a JSON array"))?,
            None => Vec::new(),
        };
        Ok(Self {
            fields: VendorFields::from_form(form)?,
            addresses,
        })
    }
}

impl NewAddress {
    /// The main address sent flat alongside the vendor fields.
    pub fn main_from_form(form: &FormData) -> Self {
        Self {
            address_type: "Main".into(),
            address_line_1: form.owned("address_line_1"),
            address_line_2: form.owned("address_line_2"),
            city: form.owned("city"),
            state: form.owned("state"),
            zip_code: form.owned("zip_code"),
            country: form.owned("country"),
            based_office: None,
            landmark: form.owned("landmark"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_default_status_and_main_address() {
        let form = FormData::default()
            .with_field("vendor_name", "  Acme Corp ")
            .with_field("gstin", "22AAAAA0000A1Z5")
            .with_field("city", "Pune")
            .with_field("landmark", " ");

        let fields = VendorFields::from_form(&form).unwrap();
        assert_eq!(fields.vendor_name, "Acme Corp");
        assert_eq!(fields.vendor_status, "Active");
        assert_eq!(fields.gstin.as_deref(), Some("22AAAAA0000A1Z5"));

        let address = NewAddress::main_from_form(&form);
        assert_eq!(address.address_type, "Main");
        assert_eq!(address.city.as_deref(), Some("Pune"));
        assert_eq!(address.landmark, None);
    }

    #[test]
    fn vendor_name_is_required() {
        let form = FormData::default().with_field("vendor_type", "Supplier");
        assert!(matches!(
            VendorFields::from_form(&form),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn update_body_carries_address_list() {
        let body = serde_json::json!({
            "vendor_name": "Acme",
            "vendor_status": "Inactive",
            "addresses": [
                {"address_line_1": "1 Main St", "city": "Pune"},
                {"address_type": "Branch", "based_office": true}
            ]
        });
        let update: VendorUpdate = serde_json::from_value(body).unwrap();
        assert_eq!(update.fields.vendor_status, "Inactive");
        assert_eq!(update.addresses.len(), 2);
        assert_eq!(update.addresses[0].address_type, "Main");
        assert_eq!(update.addresses[1].based_office, Some(true));
    }

    #[test]
    fn multipart_update_reads_address_json() {
        let form = FormData::default()
            .with_field("vendor_name", "Acme")
            .with_field(
                "addresses",
                r#"[{"address_type":"Branch","city":"Delhi","based_office":false}]"#,
            );
        let update = VendorUpdate::from_form(&form).unwrap();
        assert_eq!(update.fields.vendor_name, "Acme");
        assert_eq!(update.addresses.len(), 1);
        assert_eq!(update.addresses[0].city.as_deref(), Some("Delhi"));

        let bad = FormData::default()
            .with_field("vendor_name", "Acme")
            .with_field("addresses", "not json");
        assert!(matches!(
            VendorUpdate::from_form(&bad),
            Err(ApiError::Validation(_))
        ));
    }
}
