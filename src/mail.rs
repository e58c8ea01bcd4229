use axum::async_trait;
use tracing::{debug, info};

/// Outbound email. Delivery itself lives outside this service.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Hands messages to the log instead of an SMTP relay.
pub struct LogMailer {
    from: String,
    /// Print message bodies (which can hold reset links) at debug level.
    reveal_body: bool,
}

impl LogMailer {
    pub fn new(from: impl Into<String>, reveal_body: bool) -> Self {
        Self {
            from: from.into(),
            reveal_body,
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(from = %self.from, %to, %subject, "email queued");
        if self.reveal_body {
            debug!(%to, %body, "email body");
        }
        Ok(())
    }
}

pub fn password_reset_email(reset_url: &str) -> (String, String) {
    let subject = "Password Reset Request".to_string();
    let body = format!(
        "<p>You requested a password reset</p>\
         <p>Click this <a href=\"{url}\">link</a> to reset your password</p>\
         <p>This link will expire in 1 hour</p>",
        url = reset_url
    );
    (subject, body)
}
