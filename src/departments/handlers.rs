use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::repo::{self, Department, NewDepartment};
use crate::{
    auth::{extractors::AuthUser, roles::Permission},
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/departments", get(list_departments).post(create_department))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_departments(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<Department>>> {
    Ok(Json(repo::list(&state.db).await?))
}

#[instrument(skip(state, identity, body), fields(user_id = %identity.id))]
pub async fn create_department(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(body): Json<NewDepartment>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    identity.require_permission(Permission::ManageDepartments)?;
    let name = body.department_name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("department_name is required"));
    }
    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let dept = repo::create(&state.db, name, description, OffsetDateTime::now_utc()).await?;
    info!(department_id = dept.department_id, "department created");
    Ok((StatusCode::CREATED, Json(dept)))
}

#[cfg(test)]
mod tests {
    use crate::{app::build_app, auth::roles::Role, testing::TestContext};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn create_request(token: &str, name: &str) -> Request<Body> {
        Request::post("/api/departments")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "department_name": name }).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn managers_cannot_create_departments() {
        let ctx = TestContext::new();
        let (_, token) = ctx.logged_in("mgr@x.com", Role::Manager).await;
        let resp = build_app(ctx.state.clone())
            .oneshot(create_request(&token, "Finance"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn blank_department_name_is_rejected() {
        let ctx = TestContext::new();
        let (_, token) = ctx.logged_in("admin@x.com", Role::Admin).await;
        let resp = build_app(ctx.state.clone())
            .oneshot(create_request(&token, "  "))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
