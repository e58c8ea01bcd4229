use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::AppendHeaders,
    routing::{delete, get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
            MessageResponse, ProfilePictureResponse, ProfileResponse, ProfileUpdatedResponse,
            PublicUser, RegisterRequest, RegisterResponse, ResetPasswordRequest, SessionItem,
        },
        extractors::{AuthUser, MaybeAuthUser},
        repo_types::ProfileUpdate,
        services::{self, PROFILE_PICTURE_MAX_BYTES, RESET_REQUESTED_MESSAGE},
    },
    cookie::{clear_cookie, extract_cookie, CookieOptions, SESSION_COOKIE, TOKEN_COOKIE},
    error::{ApiError, ApiResult},
    multipart::FormData,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/forgot-password", post(forgot_password))
        .route("/users/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/logout", post(logout))
        .route("/users/me", get(get_me))
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/change-password", put(change_password))
        .route("/users/sessions", get(list_sessions))
        .route("/users/sessions/:id", delete(terminate_session))
        .route(
            "/users/profile-picture",
            post(upload_profile_picture)
                .layer(DefaultBodyLimit::max(PROFILE_PICTURE_MAX_BYTES + 64 * 1024)),
        )
}

#[instrument(skip(state, caller, payload))]
pub async fn register(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let user = services::register(&state, payload, caller.as_ref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user: PublicUser::from(&user),
        }),
    ))
}

/// Sets the `token` and `session` cookies and echoes the token in the body.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(AppendHeaders<[(header::HeaderName, header::HeaderValue); 2]>, Json<LoginResponse>)>
{
    let out = services::login(&state, payload, OffsetDateTime::now_utc()).await?;

    let max_age_secs = out.ttl().whole_seconds();
    let secure = state.config.production;
    let token_cookie = CookieOptions {
        name: TOKEN_COOKIE,
        secure,
        max_age_secs,
    }
    .header_value(&out.token)?;
    let session_cookie = CookieOptions {
        name: SESSION_COOKIE,
        secure,
        max_age_secs,
    }
    .header_value(&out.session.session_token)?;

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, token_cookie),
            (header::SET_COOKIE, session_cookie),
        ]),
        Json(LoginResponse {
            user_id: out.user.id,
            email: out.user.email,
            user_role: out.user.user_role,
            token: out.token,
        }),
    ))
}

/// Clears both cookies even when the token or session is already gone.
#[instrument(skip(state, identity, headers))]
pub async fn logout(
    State(state): State<AppState>,
    MaybeAuthUser(identity): MaybeAuthUser,
    headers: HeaderMap,
) -> ApiResult<(AppendHeaders<[(header::HeaderName, header::HeaderValue); 2]>, Json<MessageResponse>)>
{
    let session_token = extract_cookie(&headers, SESSION_COOKIE);
    services::logout(&state, identity.as_ref(), session_token.as_deref()).await?;
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, clear_cookie(TOKEN_COOKIE)),
            (header::SET_COOKIE, clear_cookie(SESSION_COOKIE)),
        ]),
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::request_password_reset(&state, &payload.email, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::consume_password_reset(&state, payload, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = services::load_user(&state, identity.id).await?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let user = services::load_user(&state, identity.id).await?;
    Ok(Json(ProfileResponse::from(&user)))
}

#[instrument(skip(state, identity, update), fields(user_id = %identity.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<ProfileUpdatedResponse>> {
    let user = services::update_profile(&state, &identity, update).await?;
    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully".into(),
        user: ProfileResponse::from(&user),
    }))
}

#[instrument(skip(state, identity, payload), fields(user_id = %identity.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::change_password(&state, &identity, payload).await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// Multipart with a single `profilePicture` image.
#[instrument(skip(state, identity, mp), fields(user_id = %identity.id))]
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mp: Multipart,
) -> ApiResult<Json<ProfilePictureResponse>> {
    let mut form = FormData::read(mp).await?;
    let file = form
        .take_file("profilePicture")
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;
    let key = services::upload_profile_picture(&state, &identity, file).await?;
    Ok(Json(ProfilePictureResponse {
        message: "Profile picture updated successfully".into(),
        profile_picture: key,
    }))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<SessionItem>>> {
    let sessions = services::list_sessions(&state, &identity).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionItem {
                current: s.id == identity.session_id,
                session_id: s.id,
                created_at: s.created_at,
                expires_at: s.expires_at,
            })
            .collect(),
    ))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn terminate_session(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    services::terminate_session(&state, &identity, session_id).await?;
    Ok(Json(MessageResponse::new("Session terminated")))
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<ProfileResponse>>> {
    let users = services::list_users(&state, &identity).await?;
    Ok(Json(users.iter().map(ProfileResponse::from).collect()))
}
