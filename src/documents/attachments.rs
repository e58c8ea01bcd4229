use sqlx::PgConnection;
use time::{Date, OffsetDateTime};
use tracing::warn;

use super::{
    repo::insert_document_tx,
    repo_types::{EntityType, NewDocument},
    services::{check_upload, storage_prefix},
};
use crate::{
    auth::extractors::Identity,
    error::ApiResult,
    multipart::{parse_date, FormData},
    storage::{delete_many, object_key, StorageClient, UploadedFile},
};

/// A file submitted with a vendor, engagement or expense form.
#[derive(Debug)]
pub struct Attachment {
    pub file: UploadedFile,
    pub category: String,
    pub validity_flag: bool,
    pub validity_start_date: Option<Date>,
    pub validity_end_date: Option<Date>,
}

/// Reads the `documents` files and lines each one up with the comma separated
/// `document_categories`, `validity_flags`, `validity_start_dates` and
/// `validity_end_dates` fields. A single `document_category` applies to all.
pub fn attachments_from_form(form: &mut FormData) -> ApiResult<Vec<Attachment>> {
    let categories = form.list("document_categories");
    let default_category = form
        .owned("document_category")
        .unwrap_or_else(|| "Uncategorized".into());
    let flags = form.list("validity_flags");
    let starts = form.list("validity_start_dates");
    let ends = form.list("validity_end_dates");

    let date_at = |list: &[String], i: usize| -> Option<Date> {
        list.get(i).filter(|s| !s.is_empty()).and_then(|s| parse_date(s).ok())
    };

    let files = form.take_files("documents");
    let mut out = Vec::with_capacity(files.len());
    for (i, file) in files.into_iter().enumerate() {
        check_upload(&file)?;
        out.push(Attachment {
            category: categories
                .get(i)
                .filter(|c| !c.is_empty())
                .cloned()
                .unwrap_or_else(|| default_category.clone()),
            validity_flag: flags.get(i).map_or(false, |f| f.eq_ignore_ascii_case("true")),
            validity_start_date: date_at(&starts, i),
            validity_end_date: date_at(&ends, i),
            file,
        });
    }
    Ok(out)
}

/// Attachments already written to object storage, waiting for their rows.
#[derive(Debug, Default)]
pub struct StagedDocuments {
    docs: Vec<NewDocument>,
}

impl StagedDocuments {
    pub async fn upload(
        storage: &dyn StorageClient,
        identity: &Identity,
        entity: EntityType,
        attachments: Vec<Attachment>,
    ) -> ApiResult<Self> {
        let mut staged = StagedDocuments::default();
        for a in attachments {
            let key = object_key(&storage_prefix(Some(entity.as_str())), &a.file);
            if let Err(e) = storage
                .put_object(&key, a.file.body.clone(), &a.file.content_type)
                .await
            {
                staged.discard(storage).await;
                return Err(e.into());
            }
            staged.docs.push(NewDocument {
                document_name: a.file.original_name.clone(),
                document_type: format!("{}_doc", entity.as_str().to_ascii_lowercase()),
                document_category: Some(a.category),
                related_entity_type: Some(entity),
                related_entity_id: None,
                status: "Active".into(),
                description: None,
                expiry_date: a.validity_end_date,
                tags: Vec::new(),
                validity_flag: a.validity_flag,
                validity_start_date: a.validity_start_date,
                validity_end_date: a.validity_end_date,
                storage_key: key,
                file_size: a.file.size(),
                file_type: a.file.content_type,
                original_filename: a.file.original_name,
                uploaded_by: identity.id,
            });
        }
        Ok(staged)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Inserts one document row per staged file on the caller's transaction.
    pub async fn insert_tx(
        &self,
        conn: &mut PgConnection,
        entity_id: i32,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        for doc in &self.docs {
            let mut doc = doc.clone();
            doc.related_entity_id = Some(entity_id);
            insert_document_tx(&mut *conn, &doc, now).await?;
        }
        Ok(())
    }

    /// Removes the stored objects after a failed transaction.
    pub async fn discard(&self, storage: &dyn StorageClient) {
        let keys: Vec<String> = self.docs.iter().map(|d| d.storage_key.clone()).collect();
        if keys.is_empty() {
            return;
        }
        let removed = delete_many(storage, &keys).await;
        warn!(removed, total = keys.len(), "discarded staged documents");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::roles::Role, error::ApiError, testing::TestContext};
    use bytes::Bytes;

    fn file(name: &str, content_type: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.into(),
            content_type: content_type.into(),
            body: Bytes::from_static(b"data"),
        }
    }

    #[test]
    fn parallel_lists_line_up_with_files() {
        let mut form = FormData::default()
            .with_field("document_categories", "GST,PAN")
            .with_field("validity_flags", "true,false")
            .with_field("validity_start_dates", "2024-01-01,")
            .with_field("validity_end_dates", "2025-01-01,")
            .with_file("documents", file("gst.pdf", "application/pdf"))
            .with_file("documents", file("pan.png", "image/png"))
            .with_file("documents", file("extra.pdf", "application/pdf"));

        let attachments = attachments_from_form(&mut form).unwrap();
        assert_eq!(attachments.len(), 3);
        assert_eq!(attachments[0].category, "GST");
        assert!(attachments[0].validity_flag);
        assert!(attachments[0].validity_end_date.is_some());
        assert_eq!(attachments[1].category, "PAN");
        assert!(!attachments[1].validity_flag);
        assert_eq!(attachments[1].validity_start_date, None);
        assert_eq!(attachments[2].category, "Uncategorized");
    }

    #[test]
    fn disallowed_attachment_fails_the_form() {
        let mut form = FormData::default().with_file("documents", file("x.zip", "application/zip"));
        assert!(matches!(
            attachments_from_form(&mut form),
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn staged_files_can_be_discarded() {
        let ctx = TestContext::new();
        let (user, _) = ctx.logged_in("stage@x.com", Role::Manager).await;
        let identity = crate::testing::identity_for(&user);
        let mut form = FormData::default()
            .with_file("documents", file("a.pdf", "application/pdf"))
            .with_file("documents", file("b.pdf", "application/pdf"));
        let attachments = attachments_from_form(&mut form).unwrap();

        let staged = StagedDocuments::upload(
            ctx.state.storage.as_ref(),
            &identity,
            EntityType::Vendor,
            attachments,
        )
        .await
        .unwrap();
        assert_eq!(staged.len(), 2);
        assert_eq!(ctx.storage.len(), 2);
        assert!(ctx.storage.keys().iter().all(|k| k.starts_with("documents/vendor/")));

        staged.discard(ctx.state.storage.as_ref()).await;
        assert_eq!(ctx.storage.len(), 0);
    }
}
