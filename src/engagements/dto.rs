use serde::Serialize;

use super::repo_types::{default_status, EngagementFields};
use crate::{
    error::{ApiError, ApiResult},
    multipart::FormData,
};

#[derive(Debug, Serialize)]
pub struct EngagementCreated {
    pub message: String,
    pub engagement_id: i32,
    pub documents: usize,
}

impl EngagementFields {
    pub fn from_form(form: &FormData) -> ApiResult<Self> {
        let engaged_vendor_id = form
            .parse::<i32>("engaged_vendor_id")?
            .ok_or_else(|| ApiError::validation("engaged_vendor_id is required"))?;
        Self {
            engaged_vendor_id,
            engagement_name: form.required("engagement_name")?.to_string(),
            engagement_type: form.owned("engagement_type"),
            start_date: form.date("start_date")?,
            end_date: form.date("end_date")?,
            engagement_status: form
                .owned("engagement_status")
                .unwrap_or_else(default_status),
            contact_name: form.owned("contact_name"),
            contact_email: form.owned("contact_email"),
            contact_phone: form.owned("contact_phone"),
            engaged_department: form.owned("engaged_department"),
        }
        .validated()
    }

    pub fn validated(mut self) -> ApiResult<Self> {
        self.engagement_name = self.engagement_name.trim().to_string();
        if self.engagement_name.is_empty() {
            return Err(ApiError::validation("engagement_name is required"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ApiError::validation("end_date must not be before start_date"));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn form_parses_ids_and_dates() {
        let form = FormData::default()
            .with_field("engaged_vendor_id", "12")
            .with_field("engagement_name", "Audit 2024")
            .with_field("start_date", "2024-01-01")
            .with_field("end_date", "2024-12-31T00:00:00.000Z");

        let fields = EngagementFields::from_form(&form).unwrap();
        assert_eq!(fields.engaged_vendor_id, 12);
        assert_eq!(fields.engagement_status, "Active");
        assert_eq!(fields.start_date, Some(date!(2024 - 01 - 01)));
        assert_eq!(fields.end_date, Some(date!(2024 - 12 - 31)));
    }

    #[test]
    fn vendor_id_must_be_numeric_and_present() {
        let form = FormData::default().with_field("engagement_name", "Audit");
        assert!(matches!(
            EngagementFields::from_form(&form),
            Err(ApiError::Validation(_))
        ));
        let form = form.with_field("engaged_vendor_id", "abc");
        assert!(matches!(
            EngagementFields::from_form(&form),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let form = FormData::default()
            .with_field("engaged_vendor_id", "1")
            .with_field("engagement_name", "Audit")
            .with_field("start_date", "2024-06-01")
            .with_field("end_date", "2024-05-01");
        assert!(matches!(
            EngagementFields::from_form(&form),
            Err(ApiError::Validation(_))
        ));
    }
}
