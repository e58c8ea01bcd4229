use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    dto::DocumentMeta,
    repo_types::{DocumentFilter, DocumentUpdate, DocumentView, NewDocument, NewVersion, VersionView},
};
use crate::{
    auth::extractors::Identity,
    error::{ApiError, ApiResult},
    state::AppState,
    storage::{delete_many, object_key, UploadedFile},
};

pub const ALLOWED_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "image/jpeg",
    "image/png",
];
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
const DOWNLOAD_URL_TTL_SECS: u64 = 300;

pub fn check_upload(file: &UploadedFile) -> ApiResult<()> {
    if !ALLOWED_TYPES.contains(&file.content_type.as_str()) {
        return Err(ApiError::validation(
            "Invalid file type. Only PDF, DOC, DOCX, XLS, XLSX, JPG, and PNG files are allowed.",
        ));
    }
    if file.body.len() > MAX_DOCUMENT_BYTES {
        return Err(ApiError::PayloadTooLarge(format!(
            "{} exceeds the 10MB limit",
            file.original_name
        )));
    }
    Ok(())
}

/// `report.pdf` at version 3 downloads as `report_v3.pdf`.
pub fn versioned_filename(name: &str, version: i32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_v{}.{}", stem, version, ext),
        _ => format!("{}_v{}", name, version),
    }
}

pub(crate) fn storage_prefix(entity: Option<&str>) -> String {
    match entity {
        Some(entity) => format!("documents/{}", entity.to_ascii_lowercase()),
        None => "documents/general".to_string(),
    }
}

pub async fn upload_document(
    st: &AppState,
    identity: &Identity,
    meta: DocumentMeta,
    file: UploadedFile,
    now: OffsetDateTime,
) -> ApiResult<DocumentView> {
    check_upload(&file)?;

    let key = object_key(
        &storage_prefix(meta.related_entity_type.map(|t| t.as_str())),
        &file,
    );
    st.storage
        .put_object(&key, file.body.clone(), &file.content_type)
        .await?;

    let new = NewDocument {
        document_name: meta.document_name,
        document_type: meta.document_type,
        document_category: meta.document_category,
        related_entity_type: meta.related_entity_type,
        related_entity_id: meta.related_entity_id,
        status: meta.status.unwrap_or_else(|| "Active".into()),
        description: meta.description,
        expiry_date: meta.expiry_date,
        tags: meta.tags,
        validity_flag: false,
        validity_start_date: None,
        validity_end_date: None,
        storage_key: key.clone(),
        file_size: file.size(),
        file_type: file.content_type,
        original_filename: file.original_name,
        uploaded_by: identity.id,
    };
    let doc = match st.documents.create(&new, now).await {
        Ok(doc) => doc,
        Err(e) => {
            delete_many(st.storage.as_ref(), &[key]).await;
            return Err(e.into());
        }
    };
    info!(document_id = doc.document_id, user_id = %identity.id, "document uploaded");

    get_document(st, doc.document_id).await
}

pub async fn upload_new_version(
    st: &AppState,
    identity: &Identity,
    document_id: i32,
    file: UploadedFile,
    change_notes: Option<String>,
    now: OffsetDateTime,
) -> ApiResult<DocumentView> {
    check_upload(&file)?;

    let entity = st
        .documents
        .find(document_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?
        .document
        .related_entity_type;
    let key = object_key(&storage_prefix(entity.as_deref()), &file);
    st.storage
        .put_object(&key, file.body.clone(), &file.content_type)
        .await?;

    let new = NewVersion {
        storage_key: key.clone(),
        file_size: file.size(),
        file_type: file.content_type,
        original_filename: file.original_name,
        created_by: identity.id,
        change_notes: change_notes.filter(|n| !n.trim().is_empty()),
    };
    let version = match st.documents.add_version(document_id, &new, now).await {
        Ok(Some(v)) => v,
        Ok(None) => {
            // deleted between the lookup and the lock
            delete_many(st.storage.as_ref(), &[key]).await;
            return Err(ApiError::not_found("Document not found"));
        }
        Err(e) => {
            delete_many(st.storage.as_ref(), &[key]).await;
            return Err(e.into());
        }
    };
    info!(document_id, version = version.version, user_id = %identity.id, "document version added");

    get_document(st, document_id).await
}

/// Database rows go first; stored objects are then removed best-effort.
pub async fn delete_document(st: &AppState, document_id: i32) -> ApiResult<()> {
    let keys = st
        .documents
        .delete(document_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    let removed = delete_many(st.storage.as_ref(), &keys).await;
    if removed < keys.len() {
        warn!(document_id, removed, total = keys.len(), "some stored objects were left behind");
    }
    info!(document_id, "document deleted");
    Ok(())
}

pub async fn list_documents(st: &AppState, filter: &DocumentFilter) -> ApiResult<Vec<DocumentView>> {
    Ok(st.documents.list(filter).await?)
}

pub async fn get_document(st: &AppState, document_id: i32) -> ApiResult<DocumentView> {
    st.documents
        .find(document_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))
}

pub async fn update_document(
    st: &AppState,
    identity: &Identity,
    document_id: i32,
    update: DocumentUpdate,
    now: OffsetDateTime,
) -> ApiResult<DocumentView> {
    st.documents
        .update_metadata(document_id, update, identity.id, now)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))
}

pub async fn list_versions(st: &AppState, document_id: i32) -> ApiResult<Vec<VersionView>> {
    st.documents
        .list_versions(document_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))
}

pub async fn download_url(st: &AppState, document_id: i32) -> ApiResult<String> {
    let file = st
        .documents
        .current_file(document_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    Ok(st
        .storage
        .presign_get(&file.storage_key, DOWNLOAD_URL_TTL_SECS, Some(&file.original_filename))
        .await?)
}

pub async fn version_download_url(
    st: &AppState,
    document_id: i32,
    version_id: i32,
) -> ApiResult<String> {
    let file = st
        .documents
        .version_file(document_id, version_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document version not found"))?;
    let name = versioned_filename(&file.original_filename, file.version);
    Ok(st
        .storage
        .presign_get(&file.storage_key, DOWNLOAD_URL_TTL_SECS, Some(&name))
        .await?)
}
