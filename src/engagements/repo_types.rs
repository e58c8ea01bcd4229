use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Engagement {
    pub engagement_id: i32,
    pub engaged_vendor_id: i32,
    pub engagement_name: String,
    pub engagement_type: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub engagement_status: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub engaged_department: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, FromRow)]
pub struct EngagementView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub engagement: Engagement,
    pub vendor_name: Option<String>,
}

/// Columns written on create and replaced on update.
#[derive(Debug, Clone, Deserialize)]
pub struct EngagementFields {
    pub engaged_vendor_id: i32,
    pub engagement_name: String,
    pub engagement_type: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    #[serde(default = "default_status")]
    pub engagement_status: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub engaged_department: Option<String>,
}

pub(crate) fn default_status() -> String {
    "Active".into()
}
