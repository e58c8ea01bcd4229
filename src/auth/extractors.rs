use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    jwt::{JwtError, JwtKeys},
    roles::{Permission, Role},
};
use crate::{
    cookie::{extract_cookie, TOKEN_COOKIE},
    error::ApiError,
    state::AppState,
};

/// The authenticated caller, reloaded from the user store on every request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub session_id: Uuid,
}

impl Identity {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            return Ok(());
        }
        warn!(user_id = %self.id, role = %self.role, "role not allowed");
        Err(ApiError::Forbidden(
            "You do not have permission to perform this action".into(),
        ))
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), ApiError> {
        if self.role.has_permission(permission) {
            return Ok(());
        }
        warn!(user_id = %self.id, role = %self.role, ?permission, "permission denied");
        Err(ApiError::Forbidden(
            "You do not have permission to perform this action".into(),
        ))
    }
}

/// Rejects the request unless it carries a valid token for a live session.
pub struct AuthUser(pub Identity);

/// Same checks as [`AuthUser`], but any failure yields `None`.
pub struct MaybeAuthUser(pub Option<Identity>);

/// Cookie first, then `Authorization` with or without the `Bearer` prefix.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_cookie(headers, TOKEN_COOKIE) {
        return Some(token);
    }
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

async fn resolve(state: &AppState, token: &str) -> Result<Identity, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|e| match e {
        JwtError::Expired => ApiError::TokenExpired,
        JwtError::Invalid(reason) => {
            debug!(%reason, "token rejected");
            ApiError::unauthorized("Invalid token")
        }
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let session = state
        .users
        .find_session(claims.sid)
        .await?
        .filter(|s| s.user_id == user.id)
        .ok_or_else(|| ApiError::unauthorized("Session not found"))?;
    if session.expires_at <= OffsetDateTime::now_utc() {
        return Err(ApiError::unauthorized("Session expired"));
    }

    Ok(Identity {
        id: user.id,
        name: user.display_name(),
        email: user.email,
        // role changes take effect without a new token
        role: user.user_role,
        session_id: session.id,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("No token, authorization denied"))?;
        Ok(AuthUser(resolve(state, &token).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeAuthUser(None));
        };
        let identity = resolve(state, &token)
            .await
            .map_err(|e| debug!(error = %e, "optional auth ignored"))
            .ok();
        Ok(MaybeAuthUser(identity))
    }
}
