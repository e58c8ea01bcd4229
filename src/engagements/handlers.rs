use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::EngagementCreated,
    repo,
    repo_types::{EngagementFields, EngagementView},
    services,
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    documents::{attachments::attachments_from_form, services::MAX_DOCUMENT_BYTES},
    error::{ApiError, ApiResult},
    multipart::FormData,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/engagements",
            get(list_engagements)
                .post(create_engagement)
                .layer(DefaultBodyLimit::max(5 * MAX_DOCUMENT_BYTES)),
        )
        .route("/engagements/active", get(list_active))
        .route(
            "/engagements/:id",
            get(get_engagement)
                .put(update_engagement)
                .delete(delete_engagement),
        )
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_engagements(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<EngagementView>>> {
    Ok(Json(repo::list(&state.db, false).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_active(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<EngagementView>>> {
    Ok(Json(repo::list(&state.db, true).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn get_engagement(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<EngagementView>> {
    repo::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Engagement not found"))
}

#[instrument(skip(state, identity, mp), fields(user_id = %identity.id))]
pub async fn create_engagement(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<EngagementCreated>)> {
    let mut form = FormData::read(mp).await?;
    let fields = EngagementFields::from_form(&form)?;
    let attachments = attachments_from_form(&mut form)?;

    let (engagement_id, documents) = services::create_engagement(
        &state,
        &identity,
        fields,
        attachments,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(EngagementCreated {
            message: "Engagement created successfully".into(),
            engagement_id,
            documents,
        }),
    ))
}

#[instrument(skip(state, identity, body), fields(user_id = %identity.id))]
pub async fn update_engagement(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
    Json(body): Json<EngagementFields>,
) -> ApiResult<Json<MessageResponse>> {
    services::update_engagement(&state, id, body, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::new("Engagement updated successfully")))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn delete_engagement(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_engagement(&state, id).await?;
    Ok(Json(MessageResponse::new("Engagement deleted successfully")))
}
