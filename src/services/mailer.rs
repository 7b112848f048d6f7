//! Outbound email. Failures are reported to the caller, who logs them;
//! no request fails because an email could not be sent.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::{config::SmtpConfig, error::AppError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::InternalServerError(format!("invalid MAIL_FROM: {e}")))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::InternalServerError(format!("smtp relay: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("invalid recipient: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| AppError::InternalServerError(format!("build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::InternalServerError(format!("smtp send: {e}")))?;
        Ok(())
    }
}

/// Used when SMTP is not configured: the email is only logged.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        tracing::info!(to = %email.to, subject = %email.subject, "email (not sent, SMTP disabled)");
        Ok(())
    }
}

pub fn welcome_email(to: &str, first_name: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Welcome to the civic platform".to_string(),
        body: format!(
            "Hello {first_name},\n\nYour account has been created. You can now follow \
             discussions, reach your representatives and take part in surveys.\n"
        ),
    }
}

pub fn verification_decision_email(to: &str, approved: bool, notes: Option<&str>) -> Email {
    let (subject, verdict) = if approved {
        ("Your verification was approved", "approved")
    } else {
        ("Your verification was rejected", "rejected")
    };
    let mut body = format!("Your verification request has been {verdict}.\n");
    if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
        body.push_str(&format!("\nReviewer notes: {notes}\n"));
    }
    Email {
        to: to.to_string(),
        subject: subject.to_string(),
        body,
    }
}

/// Sends without propagating; the outcome is only logged.
pub async fn send_best_effort(mailer: &dyn Mailer, email: Email) {
    let to = email.to.clone();
    if let Err(e) = mailer.send(email).await {
        tracing::warn!(%to, "failed to send email: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer;
        assert!(mailer.send(welcome_email("a@example.com", "Amina")).await.is_ok());
    }

    #[test]
    fn rejection_email_includes_notes() {
        let email = verification_decision_email("a@example.com", false, Some("Blurry ID scan"));
        assert!(email.subject.contains("rejected"));
        assert!(email.body.contains("Blurry ID scan"));

        let approved = verification_decision_email("a@example.com", true, Some("  "));
        assert!(!approved.body.contains("Reviewer notes"));
    }
}
