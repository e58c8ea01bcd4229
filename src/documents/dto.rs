use time::Date;

use super::repo_types::EntityType;
use crate::{
    error::{ApiError, ApiResult},
    multipart::FormData,
};

/// Metadata sent alongside an uploaded document.
#[derive(Debug, Default)]
pub struct DocumentMeta {
    pub document_name: String,
    pub document_type: String,
    pub document_category: Option<String>,
    pub related_entity_type: Option<EntityType>,
    pub related_entity_id: Option<i32>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub expiry_date: Option<Date>,
    pub tags: Vec<String>,
}

impl DocumentMeta {
    pub fn from_form(form: &FormData) -> ApiResult<Self> {
        let (Some(name), Some(kind)) = (form.text("document_name"), form.text("document_type"))
        else {
            return Err(ApiError::validation(
                "Document name and type are required",
            ));
        };
        Ok(Self {
            document_name: name.to_string(),
            document_type: kind.to_string(),
            document_category: form.owned("document_category"),
            related_entity_type: form.parse("related_entity_type")?,
            related_entity_id: form.parse("related_entity_id")?,
            status: form.owned("status"),
            description: form.owned("description"),
            expiry_date: form.date("expiry_date")?,
            tags: parse_tags(form.text("tags")),
        })
    }
}

/// Tags arrive either as a JSON array or as a comma separated string.
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let tags = serde_json::from_str::<Vec<String>>(raw)
        .unwrap_or_else(|_| raw.split(',').map(str::to_string).collect());
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
