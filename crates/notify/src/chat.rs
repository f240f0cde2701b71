use async_trait::async_trait;
use tracing::debug;

use crate::{NotificationSink, NotifyError, RenderedMessage};

/// Incoming-webhook configuration for the chat transport.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub webhook_url: String,
}

/// Chat sink posting messages to an incoming webhook.
pub struct WebhookSink {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookSink {
    #[must_use]
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, message: &RenderedMessage) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "text": format!("*{}*\n{}", message.subject, message.body),
        });
        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::SendFailed(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        debug!(to = %message.to_email, "chat message posted");
        Ok(())
    }
}
