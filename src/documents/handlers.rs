use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::DocumentMeta,
    repo_types::{DocumentFilter, DocumentUpdate, DocumentView, VersionView},
    services::{self, MAX_DOCUMENT_BYTES},
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::{ApiError, ApiResult},
    multipart::FormData,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/:id", get(get_document))
        .route("/documents/:id/download", get(download))
        .route("/documents/:id/versions", get(list_versions))
        .route(
            "/documents/:id/versions/:version_id/download",
            get(download_version),
        )
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(upload_document))
        .route(
            "/documents/:id",
            put(update_document).delete(delete_document),
        )
        .route("/documents/:id/file", put(upload_new_version))
        // file limit plus room for the form fields
        .layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES + 1024 * 1024))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_documents(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(filter): Query<DocumentFilter>,
) -> ApiResult<Json<Vec<DocumentView>>> {
    Ok(Json(services::list_documents(&state, &filter).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn get_document(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<DocumentView>> {
    Ok(Json(services::get_document(&state, id).await?))
}

/// POST /documents, multipart with a `file` part and metadata fields.
#[instrument(skip(state, identity, mp), fields(user_id = %identity.id))]
pub async fn upload_document(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<DocumentView>)> {
    let mut form = FormData::read(mp).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;
    let meta = DocumentMeta::from_form(&form)?;

    let view =
        services::upload_document(&state, &identity, meta, file, OffsetDateTime::now_utc()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state, identity, update), fields(user_id = %identity.id))]
pub async fn update_document(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
    Json(update): Json<DocumentUpdate>,
) -> ApiResult<Json<DocumentView>> {
    let view =
        services::update_document(&state, &identity, id, update, OffsetDateTime::now_utc()).await?;
    Ok(Json(view))
}

/// PUT /documents/:id/file, multipart with `file` and optional `change_notes`.
#[instrument(skip(state, identity, mp), fields(user_id = %identity.id))]
pub async fn upload_new_version(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
    mp: Multipart,
) -> ApiResult<Json<DocumentView>> {
    let mut form = FormData::read(mp).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;
    let notes = form.owned("change_notes");

    let view = services::upload_new_version(
        &state,
        &identity,
        id,
        file,
        notes,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(view))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn delete_document(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_document(&state, id).await?;
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_versions(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<Vec<VersionView>>> {
    Ok(Json(services::list_versions(&state, id).await?))
}

/// Redirects to a short-lived url of the current file.
#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn download(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Redirect> {
    let url = services::download_url(&state, id).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn download_version(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((id, version_id)): Path<(i32, i32)>,
) -> ApiResult<Redirect> {
    let url = services::version_download_url(&state, id, version_id).await?;
    Ok(Redirect::temporary(&url))
}
