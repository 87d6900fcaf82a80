use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use std::sync::Arc;
use studymate_core::MailConfig;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Mail delivery is not configured: {0}")]
    NotConfigured(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// A message submitted through the contact form
#[derive(Debug, Clone, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_contact(&self, message: &ContactMessage) -> Result<(), MailError>;
}

pub type MailerRef = Arc<dyn Mailer>;

/// Delivers contact messages through an SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

fn parse_mailbox(value: &str) -> Result<Mailbox, MailError> {
    value
        .parse()
        .map_err(|_| MailError::InvalidAddress(value.to_string()))
}

impl SmtpMailer {
    /// Builds a mailer, or `Ok(None)` when no SMTP host is configured
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>, MailError> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        let to = config
            .to
            .as_deref()
            .ok_or_else(|| MailError::NotConfigured("mail.to is required".to_string()))?;
        let from = config
            .from
            .as_deref()
            .or(config.username.as_deref())
            .ok_or_else(|| MailError::NotConfigured("mail.from or mail.username is required".to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp_port);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from: parse_mailbox(from)?,
            to: parse_mailbox(to)?,
        }))
    }
}

/// Builds the email sent for a contact-form submission
pub fn build_contact_email(from: &Mailbox, to: &Mailbox, contact: &ContactMessage) -> Result<Message, MailError> {
    let reply_to = parse_mailbox(contact.email.trim())?;
    let subject = contact
        .subject
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("Contact form: {}", s.trim()))
        .unwrap_or_else(|| format!("Contact form message from {}", contact.name.trim()));

    let body = format!(
        "Name: {}\nEmail: {}\n\n{}",
        contact.name.trim(),
        contact.email.trim(),
        contact.message.trim()
    );

    Message::builder()
        .from(from.clone())
        .reply_to(reply_to)
        .to(to.clone())
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_contact(&self, message: &ContactMessage) -> Result<(), MailError> {
        let email = build_contact_email(&self.from, &self.to, message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(sender = %message.email, "Delivered contact message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: &str, subject: Option<&str>) -> ContactMessage {
        ContactMessage {
            name: "Ada".to_string(),
            email: email.to_string(),
            subject: subject.map(str::to_string),
            message: "Loved the quiz feature!".to_string(),
        }
    }

    #[test]
    fn test_contact_email_headers() {
        let from: Mailbox = "noreply@studymate.test".parse().unwrap();
        let to: Mailbox = "team@studymate.test".parse().unwrap();
        let email = build_contact_email(&from, &to, &contact("ada@example.com", Some("Feedback"))).unwrap();

        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Reply-To: ada@example.com"));
        assert!(raw.contains("Subject: Contact form: Feedback"));
        assert!(raw.contains("Loved the quiz feature!"));
    }

    #[test]
    fn test_invalid_sender_address() {
        let from: Mailbox = "noreply@studymate.test".parse().unwrap();
        let to: Mailbox = "team@studymate.test".parse().unwrap();
        let result = build_contact_email(&from, &to, &contact("not-an-address", None));
        assert!(matches!(result, Err(MailError::InvalidAddress(_))));
    }

    #[test]
    fn test_mailer_disabled_without_host() {
        assert!(SmtpMailer::from_config(&MailConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_mailer_requires_recipient() {
        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            username: Some("bot@example.com".to_string()),
            ..MailConfig::default()
        };
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(MailError::NotConfigured(_))
        ));
    }
}
