use std::{collections::HashMap, str::FromStr};

use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
};
use time::{macros::format_description, Date};

use crate::{
    error::{ApiError, ApiResult},
    storage::UploadedFile,
};

/// A multipart body split into text fields and files.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the allowed size".into())
    } else {
        ApiError::validation(e.body_text())
    }
}

pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    // `2024-05-01` or the date part of an ISO timestamp
    let day = raw.trim().get(..10).unwrap_or(raw.trim());
    Date::parse(day, format_description!("[year]-[month]-[day]"))
}

impl FormData {
    pub async fn read(mut mp: Multipart) -> ApiResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(|s| s.trim_end_matches("[]").to_string()) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(original_name) => {
                    let content_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".into());
                    let body = field.bytes().await.map_err(multipart_error)?;
                    form.files.push((
                        name,
                        UploadedFile {
                            original_name,
                            content_type,
                            body,
                        },
                    ));
                }
                None => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// Trimmed value; blank counts as missing.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn owned(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    pub fn required(&self, name: &str) -> ApiResult<&str> {
        self.text(name)
            .ok_or_else(|| ApiError::validation(format!("{} is required", name)))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> ApiResult<Option<T>> {
        self.text(name)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| ApiError::validation(format!("{} is not valid", name)))
            })
            .transpose()
    }

    pub fn date(&self, name: &str) -> ApiResult<Option<Date>> {
        self.text(name)
            .map(|v| {
                parse_date(v)
                    .map_err(|_| ApiError::validation(format!("{} must be a YYYY-MM-DD date", name)))
            })
            .transpose()
    }

    /// Comma separated list; positions are kept so entries line up with files.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition::<Vec<_>, _>(|(field, _)| field == name);
        self.files = rest;
        taken.into_iter().map(|(_, file)| file).collect()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let pos = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(pos).1)
    }
}

#[cfg(test)]
impl FormData {
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_file(mut self, name: &str, file: UploadedFile) -> Self {
        self.files.push((name.to_string(), file));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use time::Month;

    fn pdf(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.into(),
            content_type: "application/pdf".into(),
            body: Bytes::from_static(b"%PDF"),
        }
    }

    #[test]
    fn blank_fields_are_missing() {
        let form = FormData::default()
            .with_field("vendor_name", "  Acme ")
            .with_field("comments", "   ");
        assert_eq!(form.text("vendor_name"), Some("Acme"));
        assert_eq!(form.text("comments"), None);
        assert!(matches!(form.required("comments"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn parses_numbers_and_dates() {
        let form = FormData::default()
            .with_field("vendor_id", "12")
            .with_field("bad", "x12")
            .with_field("start", "2024-03-05T00:00:00.000Z");
        assert_eq!(form.parse::<i32>("vendor_id").unwrap(), Some(12));
        assert!(form.parse::<i32>("bad").is_err());
        assert_eq!(form.parse::<i32>("missing").unwrap(), None);
        let date = form.date("start").unwrap().unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, Month::March, 5));
    }

    #[test]
    fn lists_keep_positions() {
        let form = FormData::default().with_field("validity_end_dates", "2025-01-01,,2026-01-01");
        assert_eq!(form.list("validity_end_dates"), vec!["2025-01-01", "", "2026-01-01"]);
        assert!(form.list("missing").is_empty());
    }

    #[test]
    fn files_are_taken_by_field() {
        let mut form = FormData::default()
            .with_file("documents", pdf("a.pdf"))
            .with_file("file", pdf("b.pdf"))
            .with_file("documents", pdf("c.pdf"));
        let docs = form.take_files("documents");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].original_name, "c.pdf");
        assert_eq!(form.take_file("file").unwrap().original_name, "b.pdf");
        assert!(form.take_file("file").is_none());
    }
}
