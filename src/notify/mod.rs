//! End-of-run notifications
//!
//! A notifier is fire-and-forget: failures are logged and never change the
//! outcome of a run.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str);
}

/// Posts `{"text": message}` to a webhook
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) {
        let result = self
            .client
            .post(&self.url)
            .json(&json!({ "text": message }))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => tracing::debug!("Notification delivered to {}", self.url),
            Err(e) => tracing::warn!("Notification to {} failed: {}", self.url, e),
        }
    }
}

/// Discards every message
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _message: &str) {}
}
