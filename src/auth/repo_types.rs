use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::roles::Role;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub user_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub user_role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub department: Option<String>,
    pub profile_picture: Option<String>,
    pub login_attempts: i32,
    pub account_locked: bool,
    pub locked_until: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>, // Argon2 hash of the emailed token
    #[serde(skip_serializing)]
    pub reset_token_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// `first last`, falling back to the user name, then the email.
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.user_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.email.clone())
    }

    pub fn is_locked_at(&self, now: OffsetDateTime) -> bool {
        self.account_locked && self.locked_until.map_or(false, |until| until > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub user_name: Option<String>,
    pub user_role: Role,
}

/// Partial profile update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub department: Option<String>,
}

impl ProfileUpdate {
    /// Blank strings count as "not provided".
    pub fn normalized(self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            user_name: keep(self.user_name),
            first_name: keep(self.first_name),
            last_name: keep(self.last_name),
            phone_number: keep(self.phone_number),
            department: keep(self.department),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// A login attempt claimed before the password is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginAttempt {
    pub attempts: i32,
    pub locked: bool,
}
