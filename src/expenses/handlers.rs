use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::ExpenseCreated,
    repo,
    repo_types::{ExpenseEngagement, ExpenseView, NewExpense, StatusUpdate},
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
            "/expenses",
            get(list_expenses)
                .post(create_expense)
                .layer(DefaultBodyLimit::max(5 * MAX_DOCUMENT_BYTES)),
        )
        .route("/expenses/engagements", get(list_engagements))
        .route("/expenses/:id", get(get_expense).delete(delete_expense))
        .route("/expenses/:id/status", put(update_status))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<ExpenseView>>> {
    Ok(Json(repo::list(&state.db).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_engagements(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<ExpenseEngagement>>> {
    Ok(Json(repo::active_engagements(&state.db).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn get_expense(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ExpenseView>> {
    repo::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Expense not found"))
}

/// Multipart: expense fields plus optional `documents`.
#[instrument(skip(state, identity, mp), fields(user_id = %identity.id))]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<ExpenseCreated>)> {
    let mut form = FormData::read(mp).await?;
    let new = NewExpense::from_form(&form)?;
    let attachments = attachments_from_form(&mut form)?;

    let (id, documents) = services::create_expense(
        &state,
        &identity,
        new,
        attachments,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ExpenseCreated {
            message: "Expense added successfully".into(),
            id,
            documents,
        }),
    ))
}

#[instrument(skip(state, identity, body), fields(user_id = %identity.id))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Json<MessageResponse>> {
    services::set_status(
        &state,
        &identity,
        id,
        body.expense_status,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(MessageResponse::new(format!(
        "Expense {}",
        body.expense_status.as_str().to_lowercase()
    ))))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_expense(&state, &identity, id).await?;
    Ok(Json(MessageResponse::new("Expense deleted successfully")))
}
