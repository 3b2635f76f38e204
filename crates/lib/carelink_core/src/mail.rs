//! Outgoing email.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info};

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Could not build message: {0}")]
    Build(String),

    #[error("SMTP transport: {0}")]
    Transport(String),
}

/// Sends a plain-text email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, subject: &str, body: &str, recipient: &str)
    -> Result<(), MailError>;
}

/// SMTP relay over STARTTLS with username/password credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, username: &str, password: &str, from: &str) -> Result<Self, MailError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| MailError::Address(format!("{from}: {e}")))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_email(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> Result<(), MailError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| MailError::Address(format!("{recipient}: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(recipient, subject, "email sent");
        Ok(())
    }
}

/// Writes mail to the log instead of sending it. Used when SMTP is not
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> Result<(), MailError> {
        info!(recipient, subject, "email not sent: SMTP not configured");
        debug!(body, "unsent email body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        LogMailer
            .send_email("Subject", "Body", "a@x.com")
            .await
            .unwrap();
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        let err = SmtpMailer::new("smtp.example.com", "u", "p", "not an address")
            .err()
            .unwrap();
        assert!(matches!(err, MailError::Address(_)));
    }
}
