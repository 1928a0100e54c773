//! HTTP webhook status notifier

use crate::config::NotificationConfig;
use crate::core::notify::{StatusEvent, StatusNotifier};
use crate::domain::{ExportError, NotifyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// POSTs each status event as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a notifier for `url`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ExportError::Configuration(format!("Failed to build webhook client: {e}"))
        })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Builds the notifier from `[notification]`, if a webhook is configured
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>> {
        config
            .webhook_url
            .as_ref()
            .map(|url| Self::new(url.clone(), Duration::from_secs(config.webhook_timeout_seconds)))
            .transpose()
    }
}

#[async_trait]
impl StatusNotifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, event: &StatusEvent) -> std::result::Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(url = %self.url, status = %event.status, "Webhook delivered");
        Ok(())
    }
}
