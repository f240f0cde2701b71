//! Notification sinks.
//!
//! Transports are out-of-scope collaborators: the tracking loop renders a
//! message and hands it to a [`NotificationSink`]; what happens on the wire
//! (SMTP, chat webhook) is this crate's concern and nobody else's. Sends
//! are best-effort — a failed send never fails the operation that queued
//! it.

pub mod chat;
pub mod email;
pub mod render;

pub use chat::{WebhookConfig, WebhookSink};
pub use email::{EmailConfig, EmailSink};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Errors from a notification transport.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport configuration error: {0}")]
    Configuration(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A fully rendered outbound message, transport-agnostic.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
}

/// Something that can deliver a rendered message.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &RenderedMessage) -> Result<(), NotifyError>;
}

/// Sink that only logs. Used in development and tests, and as the fallback
/// when no transport is configured.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn send(&self, message: &RenderedMessage) -> Result<(), NotifyError> {
        info!(
            to = %message.to_email,
            subject = %message.subject,
            "notification (logging sink, not delivered)"
        );
        Ok(())
    }
}

/// Fan-out sink: delivers to every configured transport, reporting the
/// first failure after attempting all of them.
pub struct MultiSink {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl MultiSink {
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl NotificationSink for MultiSink {
    async fn send(&self, message: &RenderedMessage) -> Result<(), NotifyError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.send(message).await
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
