use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Vendor {
    pub vendor_id: i32,
    pub vendor_name: String,
    pub vendor_type: Option<String>,
    pub vendor_tier: Option<String>,
    pub pan: Option<String>,
    pub gstin: Option<String>,
    pub primary_contact_name: Option<String>,
    pub primary_contact_phone: Option<String>,
    pub primary_contact_email: Option<String>,
    pub vendor_email: Option<String>,
    pub vendor_phone: Option<String>,
    pub vendor_status: String,
    pub comments: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
    pub address_id: i32,
    pub vendor_id: i32,
    pub address_type: String,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub based_office: Option<bool>,
    pub landmark: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct VendorWithAddresses {
    #[serde(flatten)]
    pub vendor: Vendor,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct VendorSuggestion {
    pub vendor_id: i32,
    pub vendor_name: String,
}

/// Vendor columns shared by create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorFields {
    pub vendor_name: String,
    pub vendor_type: Option<String>,
    pub vendor_tier: Option<String>,
    pub pan: Option<String>,
    pub gstin: Option<String>,
    pub primary_contact_name: Option<String>,
    pub primary_contact_phone: Option<String>,
    pub primary_contact_email: Option<String>,
    pub vendor_email: Option<String>,
    pub vendor_phone: Option<String>,
    #[serde(default = "default_status")]
    pub vendor_status: String,
    pub comments: Option<String>,
}

fn default_status() -> String {
    "Active".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    #[serde(default = "main_address")]
    pub address_type: String,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub based_office: Option<bool>,
    pub landmark: Option<String>,
}

fn main_address() -> String {
    "Main".into()
}

/// `PUT /vendors/:id` body; the address list replaces the stored one.
#[derive(Debug, Deserialize)]
pub struct VendorUpdate {
    #[serde(flatten)]
    pub fields: VendorFields,
    #[serde(default)]
    pub addresses: Vec<NewAddress>,
}
