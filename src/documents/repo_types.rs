use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::{fmt, str::FromStr};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Kind of record a document is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Vendor,
    Engagement,
    Expense,
    Department,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Vendor => "Vendor",
            EntityType::Engagement => "Engagement",
            EntityType::Expense => "Expense",
            EntityType::Department => "Department",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vendor" => Ok(EntityType::Vendor),
            "engagement" => Ok(EntityType::Engagement),
            "expense" => Ok(EntityType::Expense),
            "department" => Ok(EntityType::Department),
            other => Err(format!("unknown entity type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    pub document_id: i32,
    pub document_name: String,
    pub document_type: String,
    pub document_category: Option<String>,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i32>,
    pub status: String,
    pub description: Option<String>,
    pub expiry_date: Option<Date>,
    pub tags: Json<Vec<String>>,
    pub validity_flag: bool,
    pub validity_start_date: Option<Date>,
    pub validity_end_date: Option<Date>,
    pub storage_key: String,
    pub file_size: i64,
    pub file_type: String,
    pub original_filename: String,
    /// Current version; versions count up from 1.
    pub version: i32,
    pub uploaded_by: Option<Uuid>,
    pub upload_date: OffsetDateTime,
    pub last_modified_by: Option<Uuid>,
    pub last_modified_date: Option<OffsetDateTime>,
}

/// A document with the display name of the record it belongs to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DocumentView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub document: Document,
    pub related_entity_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DocumentVersion {
    pub version_id: i32,
    pub document_id: i32,
    pub version: i32,
    pub storage_key: String,
    pub file_size: i64,
    pub created_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub change_notes: Option<String>,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VersionView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub version: DocumentVersion,
    pub created_by_name: Option<String>,
}

/// What a download needs: where the bytes are and what to call them.
#[derive(Debug, Clone, FromRow)]
pub struct StoredFile {
    pub storage_key: String,
    pub original_filename: String,
    pub version: i32,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub document_name: String,
    pub document_type: String,
    pub document_category: Option<String>,
    pub related_entity_type: Option<EntityType>,
    pub related_entity_id: Option<i32>,
    pub status: String,
    pub description: Option<String>,
    pub expiry_date: Option<Date>,
    pub tags: Vec<String>,
    pub validity_flag: bool,
    pub validity_start_date: Option<Date>,
    pub validity_end_date: Option<Date>,
    pub storage_key: String,
    pub file_size: i64,
    pub file_type: String,
    pub original_filename: String,
    pub uploaded_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewVersion {
    pub storage_key: String,
    pub file_size: i64,
    pub file_type: String,
    pub original_filename: String,
    pub created_by: Uuid,
    pub change_notes: Option<String>,
}

/// Partial metadata update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub document_name: Option<String>,
    pub document_type: Option<String>,
    pub document_category: Option<String>,
    pub related_entity_type: Option<EntityType>,
    pub related_entity_id: Option<i32>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub expiry_date: Option<Date>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub related_entity_type: Option<EntityType>,
    pub related_entity_id: Option<i32>,
}

#[cfg(test)]
impl DocumentFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        let type_ok = self
            .related_entity_type
            .map_or(true, |t| doc.related_entity_type.as_deref() == Some(t.as_str()));
        let id_ok = self
            .related_entity_id
            .map_or(true, |id| doc.related_entity_id == Some(id));
        type_ok && id_ok
    }
}
