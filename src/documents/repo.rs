use anyhow::Context;
use axum::async_trait;
use sqlx::{types::Json, PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{
    Document, DocumentFilter, DocumentUpdate, DocumentVersion, DocumentView, NewDocument,
    NewVersion, StoredFile, VersionView,
};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts the document and its first version together.
    async fn create(&self, new: &NewDocument, now: OffsetDateTime) -> anyhow::Result<Document>;
    /// Appends the next version and makes it the only current one.
    /// `None` when the document does not exist.
    async fn add_version(
        &self,
        document_id: i32,
        new: &NewVersion,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<DocumentVersion>>;
    /// Removes the document with all versions and returns the distinct storage keys.
    async fn delete(&self, document_id: i32) -> anyhow::Result<Option<Vec<String>>>;

    async fn list(&self, filter: &DocumentFilter) -> anyhow::Result<Vec<DocumentView>>;
    async fn find(&self, document_id: i32) -> anyhow::Result<Option<DocumentView>>;
    async fn update_metadata(
        &self,
        document_id: i32,
        update: DocumentUpdate,
        modified_by: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<DocumentView>>;
    async fn list_versions(&self, document_id: i32) -> anyhow::Result<Option<Vec<VersionView>>>;
    async fn current_file(&self, document_id: i32) -> anyhow::Result<Option<StoredFile>>;
    async fn version_file(&self, document_id: i32, version_id: i32)
        -> anyhow::Result<Option<StoredFile>>;
}

const DOCUMENT_COLUMNS: &str = r#"
    document_id, document_name, document_type, document_category, related_entity_type,
    related_entity_id, status, description, expiry_date, tags, validity_flag,
    validity_start_date, validity_end_date, storage_key, file_size, file_type,
    original_filename, version, uploaded_by, upload_date, last_modified_by, last_modified_date
"#;

const VIEW_SELECT: &str = r#"
    SELECT d.document_id, d.document_name, d.document_type, d.document_category,
           d.related_entity_type, d.related_entity_id, d.status, d.description, d.expiry_date,
           d.tags, d.validity_flag, d.validity_start_date, d.validity_end_date, d.storage_key,
           d.file_size, d.file_type, d.original_filename, d.version, d.uploaded_by,
           d.upload_date, d.last_modified_by, d.last_modified_date,
           CASE d.related_entity_type
               WHEN 'Vendor' THEN v.vendor_name
               WHEN 'Engagement' THEN e.engagement_name
               WHEN 'Expense' THEN x.expense_description
               WHEN 'Department' THEN dept.department_name
           END AS related_entity_name
      FROM documents d
      LEFT JOIN vendor v ON d.related_entity_type = 'Vendor' AND v.vendor_id = d.related_entity_id
      LEFT JOIN engagement e ON d.related_entity_type = 'Engagement' AND e.engagement_id = d.related_entity_id
      LEFT JOIN expenses x ON d.related_entity_type = 'Expense' AND x.expense_id = d.related_entity_id
      LEFT JOIN departments dept ON d.related_entity_type = 'Department' AND dept.department_id = d.related_entity_id
"#;

const VERSION_COLUMNS: &str = r#"
    version_id, document_id, version, storage_key, file_size, created_by, created_at,
    change_notes, is_current
"#;

/// Inserts a document at version 1 on an open transaction.
pub(crate) async fn insert_document_tx(
    conn: &mut PgConnection,
    new: &NewDocument,
    now: OffsetDateTime,
) -> anyhow::Result<Document> {
    let doc = sqlx::query_as::<_, Document>(&format!(
        r#"
        INSERT INTO documents (
            document_name, document_type, document_category, related_entity_type,
            related_entity_id, status, description, expiry_date, tags, validity_flag,
            validity_start_date, validity_end_date, storage_key, file_size, file_type,
            original_filename, version, uploaded_by, upload_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 1, $17, $18)
        RETURNING {DOCUMENT_COLUMNS}
        "#
    ))
    .bind(&new.document_name)
    .bind(&new.document_type)
    .bind(&new.document_category)
    .bind(new.related_entity_type.map(|t| t.as_str()))
    .bind(new.related_entity_id)
    .bind(&new.status)
    .bind(&new.description)
    .bind(new.expiry_date)
    .bind(Json(&new.tags))
    .bind(new.validity_flag)
    .bind(new.validity_start_date)
    .bind(new.validity_end_date)
    .bind(&new.storage_key)
    .bind(new.file_size)
    .bind(&new.file_type)
    .bind(&new.original_filename)
    .bind(new.uploaded_by)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .context("insert document")?;

    sqlx::query(
        r#"
        INSERT INTO document_versions (
            document_id, version, storage_key, file_size, created_by, created_at,
            change_notes, is_current
        )
        VALUES ($1, 1, $2, $3, $4, $5, 'Initial version', TRUE)
        "#,
    )
    .bind(doc.document_id)
    .bind(&doc.storage_key)
    .bind(doc.file_size)
    .bind(new.uploaded_by)
    .bind(now)
    .execute(&mut *conn)
    .await
    .context("insert initial version")?;

    Ok(doc)
}

#[derive(Clone)]
pub struct PgDocumentStore {
    db: PgPool,
}

impl PgDocumentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(&self, new: &NewDocument, now: OffsetDateTime) -> anyhow::Result<Document> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let doc = insert_document_tx(&mut *tx, new, now).await?;
        tx.commit().await.context("commit tx")?;
        Ok(doc)
    }

    async fn add_version(
        &self,
        document_id: i32,
        new: &NewVersion,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<DocumentVersion>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // concurrent uploads queue on this row lock
        let current: Option<(i32,)> =
            sqlx::query_as("SELECT version FROM documents WHERE document_id = $1 FOR UPDATE")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await
                .context("lock document")?;
        let Some((current,)) = current else {
            return Ok(None);
        };
        let next = current + 1;

        sqlx::query("UPDATE document_versions SET is_current = FALSE WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .context("retire current version")?;

        let version = sqlx::query_as::<_, DocumentVersion>(&format!(
            r#"
            INSERT INTO document_versions (
                document_id, version, storage_key, file_size, created_by, created_at,
                change_notes, is_current
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING {VERSION_COLUMNS}
            "#
        ))
        .bind(document_id)
        .bind(next)
        .bind(&new.storage_key)
        .bind(new.file_size)
        .bind(new.created_by)
        .bind(now)
        .bind(
            new.change_notes
                .clone()
                .unwrap_or_else(|| format!("Version {}", next)),
        )
        .fetch_one(&mut *tx)
        .await
        .context("insert version")?;

        sqlx::query(
            r#"
            UPDATE documents
               SET storage_key = $1, file_size = $2, file_type = $3, original_filename = $4,
                   version = $5, last_modified_by = $6, last_modified_date = $7
             WHERE document_id = $8
            "#,
        )
        .bind(&new.storage_key)
        .bind(new.file_size)
        .bind(&new.file_type)
        .bind(&new.original_filename)
        .bind(next)
        .bind(new.created_by)
        .bind(now)
        .bind(document_id)
        .execute(&mut *tx)
        .await
        .context("point document at new version")?;

        tx.commit().await.context("commit tx")?;
        Ok(Some(version))
    }

    async fn delete(&self, document_id: i32) -> anyhow::Result<Option<Vec<String>>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let head: Option<(String,)> =
            sqlx::query_as("SELECT storage_key FROM documents WHERE document_id = $1 FOR UPDATE")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await
                .context("lock document")?;
        let Some((head,)) = head else {
            return Ok(None);
        };

        let versions: Vec<(String,)> = sqlx::query_as(
            "SELECT storage_key FROM document_versions WHERE document_id = $1 ORDER BY version",
        )
        .bind(document_id)
        .fetch_all(&mut *tx)
        .await
        .context("load version keys")?;

        sqlx::query("DELETE FROM document_versions WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .context("delete versions")?;
        sqlx::query("DELETE FROM documents WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .context("delete document")?;
        tx.commit().await.context("commit tx")?;

        let mut keys = vec![head];
        for (key,) in versions {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(Some(keys))
    }

    async fn list(&self, filter: &DocumentFilter) -> anyhow::Result<Vec<DocumentView>> {
        let rows = sqlx::query_as::<_, DocumentView>(&format!(
            r#"
            {VIEW_SELECT}
             WHERE ($1::text IS NULL OR d.related_entity_type = $1)
               AND ($2::int IS NULL OR d.related_entity_id = $2)
             ORDER BY d.upload_date DESC
            "#
        ))
        .bind(filter.related_entity_type.map(|t| t.as_str()))
        .bind(filter.related_entity_id)
        .fetch_all(&self.db)
        .await
        .context("list documents")?;
        Ok(rows)
    }

    async fn find(&self, document_id: i32) -> anyhow::Result<Option<DocumentView>> {
        let row = sqlx::query_as::<_, DocumentView>(&format!(
            "{VIEW_SELECT} WHERE d.document_id = $1"
        ))
        .bind(document_id)
        .fetch_optional(&self.db)
        .await
        .context("find document")?;
        Ok(row)
    }

    async fn update_metadata(
        &self,
        document_id: i32,
        update: DocumentUpdate,
        modified_by: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<DocumentView>> {
        let updated = sqlx::query(
            r#"
            UPDATE documents
               SET document_name = COALESCE($1, document_name),
                   document_type = COALESCE($2, document_type),
                   document_category = COALESCE($3, document_category),
                   related_entity_type = COALESCE($4, related_entity_type),
                   related_entity_id = COALESCE($5, related_entity_id),
                   status = COALESCE($6, status),
                   description = COALESCE($7, description),
                   expiry_date = COALESCE($8, expiry_date),
                   tags = COALESCE($9, tags),
                   last_modified_by = $10,
                   last_modified_date = $11
             WHERE document_id = $12
            "#,
        )
        .bind(update.document_name)
        .bind(update.document_type)
        .bind(update.document_category)
        .bind(update.related_entity_type.map(|t| t.as_str()))
        .bind(update.related_entity_id)
        .bind(update.status)
        .bind(update.description)
        .bind(update.expiry_date)
        .bind(update.tags.map(Json))
        .bind(modified_by)
        .bind(now)
        .bind(document_id)
        .execute(&self.db)
        .await
        .context("update document")?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find(document_id).await
    }

    async fn list_versions(&self, document_id: i32) -> anyhow::Result<Option<Vec<VersionView>>> {
        let exists: Option<(i32,)> =
            sqlx::query_as("SELECT document_id FROM documents WHERE document_id = $1")
                .bind(document_id)
                .fetch_optional(&self.db)
                .await
                .context("find document")?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, VersionView>(
            r#"
            SELECT v.version_id, v.document_id, v.version, v.storage_key, v.file_size,
                   v.created_by, v.created_at, v.change_notes, v.is_current,
                   COALESCE(NULLIF(TRIM(CONCAT_WS(' ', u.first_name, u.last_name)), ''),
                            u.user_name, u.email) AS created_by_name
              FROM document_versions v
              LEFT JOIN users u ON u.id = v.created_by
             WHERE v.document_id = $1
             ORDER BY v.version DESC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.db)
        .await
        .context("list versions")?;
        Ok(Some(rows))
    }

    async fn current_file(&self, document_id: i32) -> anyhow::Result<Option<StoredFile>> {
        let row = sqlx::query_as::<_, StoredFile>(
            "SELECT storage_key, original_filename, version FROM documents WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_optional(&self.db)
        .await
        .context("load document file")?;
        Ok(row)
    }

    async fn version_file(
        &self,
        document_id: i32,
        version_id: i32,
    ) -> anyhow::Result<Option<StoredFile>> {
        let row = sqlx::query_as::<_, StoredFile>(
            r#"
            SELECT v.storage_key, d.original_filename, v.version
              FROM document_versions v
              JOIN documents d ON d.document_id = v.document_id
             WHERE v.document_id = $1 AND v.version_id = $2
            "#,
        )
        .bind(document_id)
        .bind(version_id)
        .fetch_optional(&self.db)
        .await
        .context("load version file")?;
        Ok(row)
    }
}
