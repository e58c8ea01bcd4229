use anyhow::Context;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize, FromRow)]
pub struct DocumentCategory {
    pub category_id: i32,
    pub category_name: String,
    #[serde(rename = "formType")]
    pub form_type: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "formType")]
    pub form_type: Option<String>,
}

impl CategoryQuery {
    fn form_type(&self) -> ApiResult<&str> {
        self.form_type
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ApiError::validation("formType parameter is required"))
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/document-categories", get(list_categories))
}

async fn for_form(db: &PgPool, form_type: &str) -> anyhow::Result<Vec<DocumentCategory>> {
    let rows = sqlx::query_as::<_, DocumentCategory>(
        r#"
        SELECT category_id, category_name, form_type
        FROM document_categories
        WHERE form_type ILIKE $1 AND is_active = TRUE
        ORDER BY category_name
        "#,
    )
    .bind(form_type)
    .fetch_all(db)
    .await
    .context("list document categories")?;
    Ok(rows)
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(q): Query<CategoryQuery>,
) -> ApiResult<Json<Vec<DocumentCategory>>> {
    let form_type = q.form_type()?;
    Ok(Json(for_form(&state.db, form_type).await?))
}
