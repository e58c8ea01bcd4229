use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{LoginAttempt, NewUser, ProfileUpdate, Session, User};

/// Credential store: users, lockout counters, reset tokens and sessions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn count(&self) -> anyhow::Result<i64>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Returns `None` when the email is already registered.
    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>>;

    /// Clears a lock whose window has elapsed; returns whether anything changed.
    async fn clear_expired_lock(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<bool>;
    /// Counts an attempt against an unlocked account, locking it once the
    /// count reaches `threshold`. `None` when the account is locked at `now`.
    async fn claim_login_attempt(
        &self,
        user_id: Uuid,
        threshold: i32,
        lock_until: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<LoginAttempt>>;
    /// Resets counters, stamps `last_login` and stores the session atomically.
    async fn complete_login(&self, session: &Session, now: OffsetDateTime) -> anyhow::Result<()>;

    async fn find_session(&self, session_id: Uuid) -> anyhow::Result<Option<Session>>;
    async fn list_sessions(&self, user_id: Uuid) -> anyhow::Result<Vec<Session>>;
    async fn delete_session_by_token(&self, token: &str) -> anyhow::Result<u64>;
    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> anyhow::Result<u64>;

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;
    /// Replaces the password and clears reset token and lockout fields, but only
    /// while `token_hash` is still the stored, unexpired token.
    async fn consume_reset(
        &self,
        user_id: Uuid,
        token_hash: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool>;
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate)
        -> anyhow::Result<Option<User>>;
    /// Stores the new picture key and returns the previous one.
    async fn set_profile_picture(&self, user_id: Uuid, key: &str)
        -> anyhow::Result<Option<String>>;
}

const USER_COLUMNS: &str = r#"
    id, email, password_hash, user_name, user_role, first_name, last_name,
    phone_number, department, profile_picture, login_attempts, account_locked,
    locked_until, last_login, reset_token, reset_token_expiry, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn count(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;
        Ok(n)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, user_name, user_role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.user_name)
        .bind(new.user_role.as_str())
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn clear_expired_lock(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET account_locked = FALSE, locked_until = NULL, login_attempts = 0
             WHERE id = $1
               AND account_locked
               AND (locked_until IS NULL OR locked_until <= $2)
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.db)
        .await
        .context("clear expired lock")?;
        Ok(res.rows_affected() > 0)
    }

    async fn claim_login_attempt(
        &self,
        user_id: Uuid,
        threshold: i32,
        lock_until: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<LoginAttempt>> {
        // every right-hand side sees the pre-update row
        let row: Option<(i32, bool)> = sqlx::query_as(
            r#"
            UPDATE users
               SET login_attempts = login_attempts + 1,
                   last_login_attempt = $2,
                   account_locked = account_locked OR login_attempts + 1 >= $3,
                   locked_until = CASE WHEN login_attempts + 1 >= $3 THEN $4 ELSE locked_until END,
                   updated_at = $2
             WHERE id = $1
               AND NOT (account_locked AND COALESCE(locked_until > $2, FALSE))
            RETURNING login_attempts, account_locked
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(threshold)
        .bind(lock_until)
        .fetch_optional(&self.db)
        .await
        .context("claim login attempt")?;
        Ok(row.map(|(attempts, locked)| LoginAttempt { attempts, locked }))
    }

    async fn complete_login(&self, session: &Session, now: OffsetDateTime) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query(
            r#"
            UPDATE users
               SET login_attempts = 0, account_locked = FALSE, locked_until = NULL,
                   last_login = $2, updated_at = $2
             WHERE id = $1
            "#,
        )
        .bind(session.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("reset login attempts")?;

        sqlx::query(
            r#"
            INSERT INTO user_sessions (id, user_id, session_token, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.session_token)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await
        .context("insert session")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn find_session(&self, session_id: Uuid) -> anyhow::Result<Option<Session>> {
        let s = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, session_token, created_at, expires_at
              FROM user_sessions
             WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await
        .context("find session")?;
        Ok(s)
    }

    async fn list_sessions(&self, user_id: Uuid) -> anyhow::Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, session_token, created_at, expires_at
              FROM user_sessions
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list sessions")?;
        Ok(rows)
    }

    async fn delete_session_by_token(&self, token: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM user_sessions WHERE session_token = $1")
            .bind(token)
            .execute(&self.db)
            .await
            .context("delete session by token")?;
        Ok(res.rows_affected())
    }

    async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM user_sessions WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete session")?;
        Ok(res.rows_affected())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET reset_token = $1, reset_token_expiry = $2 WHERE id = $3",
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.db)
        .await
        .context("store reset token")?;
        Ok(())
    }

    async fn consume_reset(
        &self,
        user_id: Uuid,
        token_hash: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $1, reset_token = NULL, reset_token_expiry = NULL,
                   login_attempts = 0, account_locked = FALSE, locked_until = NULL,
                   updated_at = $4
             WHERE id = $2
               AND reset_token = $3
               AND reset_token_expiry >= $4
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .execute(&self.db)
        .await
        .context("consume reset token")?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("update password")?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET user_name = COALESCE($1, user_name),
                   first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   phone_number = COALESCE($4, phone_number),
                   department = COALESCE($5, department),
                   updated_at = NOW()
             WHERE id = $6
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(update.user_name)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.phone_number)
        .bind(update.department)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("update profile")?;
        Ok(user)
    }

    async fn set_profile_picture(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> anyhow::Result<Option<String>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let previous: Option<(Option<String>,)> =
            sqlx::query_as("SELECT profile_picture FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .context("load profile picture")?;
        let Some((previous,)) = previous else {
            anyhow::bail!("user {} not found", user_id);
        };
        sqlx::query("UPDATE users SET profile_picture = $1, updated_at = NOW() WHERE id = $2")
            .bind(key)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("store profile picture")?;
        tx.commit().await.context("commit tx")?;
        Ok(previous)
    }
}
