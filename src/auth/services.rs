use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{ChangePasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest},
        extractors::Identity,
        jwt::JwtKeys,
        password::{hash_password, random_token, verify_password, MIN_PASSWORD_LEN},
        repo_types::{NewUser, ProfileUpdate, Session, User},
        roles::{Permission, Role},
    },
    error::{ApiError, ApiResult},
    mail::password_reset_email,
    state::AppState,
    storage::{object_key, UploadedFile},
};

/// Failed attempts that lock an account.
pub const MAX_LOGIN_ATTEMPTS: i32 = 4;
pub const LOCKOUT: Duration = Duration::minutes(15);
pub const SESSION_TTL: Duration = Duration::hours(24);
pub const REMEMBER_ME_TTL: Duration = Duration::days(30);
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

pub const RESET_REQUESTED_MESSAGE: &str =
    "If your email exists in our system, you will receive a password reset link";

const PROFILE_PICTURE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];
pub const PROFILE_PICTURE_MAX_BYTES: usize = 5 * 1024 * 1024;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_new_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Registers a user. Open while no user exists; afterwards only callers
/// allowed to manage users may register accounts.
pub async fn register(
    st: &AppState,
    req: RegisterRequest,
    caller: Option<&Identity>,
) -> ApiResult<User> {
    if st.users.count().await? > 0 {
        match caller {
            None => return Err(ApiError::unauthorized("No token, authorization denied")),
            Some(c) => c.require_permission(Permission::ManageUsers)?,
        }
    }

    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!("register with invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    check_new_password(&req.password)?;
    let role = req.user_role.unwrap_or_default();

    if st.users.find_by_email(&email).await?.is_some() {
        warn!("email already registered");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let new = NewUser {
        email,
        password_hash: hash_password(&req.password)?,
        user_name: req
            .user_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        user_role: role,
    };
    // a concurrent registration can still win the unique index
    let user = st
        .users
        .create(new)
        .await?
        .ok_or_else(|| ApiError::Conflict("User already exists".into()))?;

    info!(user_id = %user.id, role = %user.user_role, "user registered");
    Ok(user)
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
    pub token: String,
}

impl LoginOutcome {
    pub fn ttl(&self) -> Duration {
        self.session.expires_at - self.session.created_at
    }
}

pub async fn login(st: &AppState, req: LoginRequest, now: OffsetDateTime) -> ApiResult<LoginOutcome> {
    let email = normalize_email(&req.email);
    let Some(mut user) = st.users.find_by_email(&email).await? else {
        warn!("login for unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if user.is_locked_at(now) {
        warn!(user_id = %user.id, "login refused, account locked");
        return Err(ApiError::AccountLocked);
    }
    if user.account_locked && st.users.clear_expired_lock(user.id, now).await? {
        info!(user_id = %user.id, "lockout window elapsed, account unlocked");
        user.account_locked = false;
        user.locked_until = None;
        user.login_attempts = 0;
    }

    // counted before the comparison; a correct password clears it in `complete_login`
    let Some(attempt) = st
        .users
        .claim_login_attempt(user.id, MAX_LOGIN_ATTEMPTS, now + LOCKOUT, now)
        .await?
    else {
        warn!(user_id = %user.id, "login refused, account locked");
        return Err(ApiError::AccountLocked);
    };

    if !verify_password(&req.password, &user.password_hash)? {
        if attempt.locked {
            warn!(user_id = %user.id, attempts = attempt.attempts, "account locked");
            return Err(ApiError::AccountLocked);
        }
        warn!(user_id = %user.id, attempts = attempt.attempts, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let ttl = if req.remember_me { REMEMBER_ME_TTL } else { SESSION_TTL };
    let session = Session {
        id: Uuid::new_v4(),
        user_id: user.id,
        session_token: random_token(),
        created_at: now,
        expires_at: now + ttl,
    };
    st.users.complete_login(&session, now).await?;

    let keys = JwtKeys::from(&st.config.jwt);
    let token = keys.sign(user.id, user.user_role, session.id, now, session.expires_at)?;

    user.login_attempts = 0;
    user.last_login = Some(now);
    info!(user_id = %user.id, remember_me = req.remember_me, "user logged in");
    Ok(LoginOutcome {
        user,
        session,
        token,
    })
}

/// Deletes the session named by the cookie token and/or the bearer's session id.
pub async fn logout(
    st: &AppState,
    identity: Option<&Identity>,
    session_token: Option<&str>,
) -> ApiResult<()> {
    if let Some(token) = session_token {
        st.users.delete_session_by_token(token).await?;
    }
    if let Some(identity) = identity {
        st.users
            .delete_session(identity.id, identity.session_id)
            .await?;
        info!(user_id = %identity.id, "user logged out");
    }
    Ok(())
}

pub async fn list_sessions(st: &AppState, identity: &Identity) -> ApiResult<Vec<Session>> {
    Ok(st.users.list_sessions(identity.id).await?)
}

pub async fn terminate_session(st: &AppState, identity: &Identity, session_id: Uuid) -> ApiResult<()> {
    let removed = st.users.delete_session(identity.id, session_id).await?;
    info!(user_id = %identity.id, %session_id, removed, "session terminated");
    Ok(())
}

/// Always succeeds with the same outcome so callers cannot probe for accounts.
pub async fn request_password_reset(st: &AppState, email: &str, now: OffsetDateTime) -> ApiResult<()> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    let Some(user) = st.users.find_by_email(&email).await? else {
        return Ok(());
    };

    let token = random_token();
    let token_hash = hash_password(&token)?;
    st.users
        .set_reset_token(user.id, &token_hash, now + RESET_TOKEN_TTL)
        .await?;

    let reset_url = format!(
        "{}/reset-password?token={}&userId={}",
        st.config.frontend_url.trim_end_matches('/'),
        token,
        user.id
    );
    let (subject, body) = password_reset_email(&reset_url);
    if let Err(e) = st.mailer.send(&user.email, &subject, &body).await {
        // the token stays valid; the user can ask again
        warn!(error = %e, user_id = %user.id, "failed to send reset email");
    }
    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

pub async fn consume_password_reset(
    st: &AppState,
    req: ResetPasswordRequest,
    now: OffsetDateTime,
) -> ApiResult<()> {
    if req.token.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    check_new_password(&req.new_password)?;

    let user = st
        .users
        .find_by_id(req.user_id)
        .await?
        .ok_or(ApiError::InvalidOrExpiredToken)?;
    let (Some(stored), Some(expiry)) = (user.reset_token.as_deref(), user.reset_token_expiry) else {
        return Err(ApiError::InvalidOrExpiredToken);
    };
    if now > expiry {
        warn!(user_id = %user.id, "expired reset token presented");
        return Err(ApiError::InvalidOrExpiredToken);
    }
    if !verify_password(&req.token, stored)? {
        warn!(user_id = %user.id, "wrong reset token presented");
        return Err(ApiError::InvalidOrExpiredToken);
    }

    let hash = hash_password(&req.new_password)?;
    // a concurrent reset with the same token may have consumed it already
    if !st.users.consume_reset(user.id, stored, &hash, now).await? {
        warn!(user_id = %user.id, "reset token consumed concurrently");
        return Err(ApiError::InvalidOrExpiredToken);
    }
    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

pub async fn change_password(
    st: &AppState,
    identity: &Identity,
    req: ChangePasswordRequest,
) -> ApiResult<()> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation(
            "Current password and new password are required",
        ));
    }
    let user = load_user(st, identity.id).await?;
    if !verify_password(&req.current_password, &user.password_hash)? {
        warn!(user_id = %user.id, "change password with wrong current password");
        return Err(ApiError::InvalidCredentials);
    }
    check_new_password(&req.new_password)?;

    let hash = hash_password(&req.new_password)?;
    st.users.update_password(user.id, &hash).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

pub async fn load_user(st: &AppState, user_id: Uuid) -> ApiResult<User> {
    st.users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn update_profile(st: &AppState, identity: &Identity, update: ProfileUpdate) -> ApiResult<User> {
    st.users
        .update_profile(identity.id, update.normalized())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn list_users(st: &AppState, identity: &Identity) -> ApiResult<Vec<User>> {
    identity.require_permission(Permission::ManageUsers)?;
    Ok(st.users.list().await?)
}

/// Stores a new profile picture and removes the previous object.
pub async fn upload_profile_picture(
    st: &AppState,
    identity: &Identity,
    file: UploadedFile,
) -> ApiResult<String> {
    if !PROFILE_PICTURE_TYPES.contains(&file.content_type.as_str()) {
        return Err(ApiError::validation("Only image files are allowed!"));
    }
    if file.body.len() > PROFILE_PICTURE_MAX_BYTES {
        return Err(ApiError::PayloadTooLarge("Profile picture exceeds 5MB".into()));
    }

    let key = object_key(&format!("profile-pictures/{}", identity.id), &file);
    st.storage
        .put_object(&key, file.body, &file.content_type)
        .await?;

    let previous = match st.users.set_profile_picture(identity.id, &key).await {
        Ok(prev) => prev,
        Err(e) => {
            let _ = st.storage.delete_object(&key).await;
            return Err(e.into());
        }
    };
    if let Some(old) = previous.filter(|old| old != &key) {
        if let Err(e) = st.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete old profile picture");
        }
    }
    info!(user_id = %identity.id, "profile picture updated");
    Ok(key)
}
