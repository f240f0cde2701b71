use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::{NotificationSink, NotifyError, RenderedMessage};

/// SMTP transport configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

impl EmailConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            from_address: from_address.into(),
            from_name: "Cadence".to_owned(),
            use_tls: true,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Email sink over an async SMTP transport.
pub struct EmailSink {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSink")
            .field("config", &self.config.host)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl EmailSink {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        let transport = build_transport(&config)?;
        Ok(Self { config, transport })
    }

    /// Inject a pre-built transport; for tests.
    #[must_use]
    pub fn with_transport(
        config: EmailConfig,
        transport: AsyncSmtpTransport<Tokio1Executor>,
    ) -> Self {
        Self { config, transport }
    }
}

fn build_transport(
    config: &EmailConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
    let mut builder = if config.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Configuration(format!("invalid SMTP host: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    };
    builder = builder.port(config.port);
    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }
    Ok(builder.build())
}

/// Build a `lettre::Message` from a rendered message and sender config.
///
/// Free function so it can be tested without a transport.
pub fn build_message(
    config: &EmailConfig,
    message: &RenderedMessage,
) -> Result<Message, NotifyError> {
    let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
        .parse()
        .map_err(|e| NotifyError::Configuration(format!("invalid from address: {e}")))?;
    let to: Mailbox = format!("{} <{}>", message.to_name, message.to_email)
        .parse()
        .map_err(|e| NotifyError::SendFailed(format!("invalid recipient address: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(&message.subject)
        .body(message.body.clone())
        .map_err(|e| NotifyError::SendFailed(format!("failed to build message: {e}")))
}

#[async_trait]
impl NotificationSink for EmailSink {
    async fn send(&self, message: &RenderedMessage) -> Result<(), NotifyError> {
        let email = build_message(&self.config, message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        debug!(to = %message.to_email, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_builds_with_named_mailboxes() {
        let config = EmailConfig::new("smtp.example.com", "noreply@example.com");
        let rendered = RenderedMessage {
            to_email: "ada@example.com".to_owned(),
            to_name: "Ada".to_owned(),
            subject: "Status check: T-1".to_owned(),
            body: "Is T-1 on track?".to_owned(),
        };
        let message = build_message(&config, &rendered).unwrap();
        let headers = format!("{:?}", message.headers());
        assert!(headers.contains("ada@example.com"));
        assert!(headers.contains("Status check: T-1"));
    }

    #[test]
    fn invalid_recipient_is_a_send_error() {
        let config = EmailConfig::new("smtp.example.com", "noreply@example.com");
        let rendered = RenderedMessage {
            to_email: "not an address".to_owned(),
            to_name: "Nobody".to_owned(),
            subject: "x".to_owned(),
            body: "y".to_owned(),
        };
        assert!(matches!(
            build_message(&config, &rendered),
            Err(NotifyError::SendFailed(_))
        ));
    }
}
