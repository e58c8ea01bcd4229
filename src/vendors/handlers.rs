use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{SearchQuery, VendorCreated, VendorUpdated},
    repo,
    repo_types::{NewAddress, Vendor, VendorFields, VendorSuggestion, VendorUpdate, VendorWithAddresses},
    services,
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    documents::{attachments::attachments_from_form, services::MAX_DOCUMENT_BYTES},
    error::{ApiError, ApiResult},
    multipart::FormData,
    state::AppState,
};

/// Room for several attachments on one form.
const FORM_BODY_LIMIT: usize = 5 * MAX_DOCUMENT_BYTES;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/vendors",
            get(list_vendors)
                .post(create_vendor)
                .layer(DefaultBodyLimit::max(FORM_BODY_LIMIT)),
        )
        .route("/vendors/active", get(list_active))
        .route("/vendors/search", get(search))
        .route(
            "/vendors/:id",
            get(get_vendor)
                .put(update_vendor)
                .delete(delete_vendor)
                .layer(DefaultBodyLimit::max(FORM_BODY_LIMIT)),
        )
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_vendors(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<VendorWithAddresses>>> {
    Ok(Json(repo::list_with_addresses(&state.db).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_active(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<Vendor>>> {
    Ok(Json(repo::list_active(&state.db).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn search(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Json<Vec<VendorSuggestion>>> {
    let query = q.query.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(repo::search_active(&state.db, query).await?))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn get_vendor(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<VendorWithAddresses>> {
    repo::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Vendor not found"))
}

/// Multipart: vendor fields, the main address and `documents` files.
#[instrument(skip(state, identity, mp), fields(user_id = %identity.id))]
pub async fn create_vendor(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<VendorCreated>)> {
    services::require_manage(&identity)?;
    let mut form = FormData::read(mp).await?;
    let fields = VendorFields::from_form(&form)?;
    let address = NewAddress::main_from_form(&form);
    let attachments = attachments_from_form(&mut form)?;

    let (vendor_id, documents) = services::create_vendor(
        &state,
        &identity,
        fields,
        address,
        attachments,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(VendorCreated {
            message: "Vendor created successfully".into(),
            vendor_id,
            documents,
        }),
    ))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("multipart/form-data"))
}

/// JSON body, or multipart with the vendor fields, an `addresses` JSON array
/// and new `documents` files.
#[instrument(skip(state, identity, req), fields(user_id = %identity.id))]
pub async fn update_vendor(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
    req: Request,
) -> ApiResult<Json<VendorUpdated>> {
    services::require_manage(&identity)?;
    let (update, attachments) = if is_multipart(req.headers()) {
        let mp = Multipart::from_request(req, &state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        let mut form = FormData::read(mp).await?;
        let update = VendorUpdate::from_form(&form)?;
        (update, attachments_from_form(&mut form)?)
    } else {
        let Json(update) = Json::<VendorUpdate>::from_request(req, &state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        (update, Vec::new())
    };

    services::update_vendor(
        &state,
        &identity,
        id,
        update,
        attachments,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(VendorUpdated { vendor_id: id }))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn delete_vendor(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_vendor(&state, &identity, id).await?;
    Ok(Json(MessageResponse::new("Vendor deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{app::build_app, auth::roles::Role, testing::TestContext};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn vendor_routes_require_a_token() {
        let ctx = TestContext::new();
        let resp = build_app(ctx.state.clone())
            .oneshot(Request::get("/api/vendors").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_needs_manage_vendors() {
        let ctx = TestContext::new();
        let (_, token) = ctx.logged_in("viewer@x.com", Role::User).await;
        let resp = build_app(ctx.state.clone())
            .oneshot(
                Request::delete("/api/vendors/3")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn multipart_update_without_name_is_a_bad_request() {
        let ctx = TestContext::new();
        let (_, token) = ctx.logged_in("editor@x.com", Role::Manager).await;
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"vendor_type\"\r\n\r\n",
            "Supplier\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"documents\"; filename=\"gst.pdf\"\r\n",
            "Content-Type: application/pdf\r\n\r\n",
            "%PDF-1.4\r\n",
            "--XBOUNDARY--\r\n",
        );
        let resp = build_app(ctx.state.clone())
            .oneshot(
                Request::put("/api/vendors/3")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.storage.len(), 0);
    }
}
