//! Notification gateway
//!
//! The schedulers only know the `send` contract; delivery is
//! fire-and-forget and failures surface as log entries, never as rolled
//! back state transitions.

use async_trait::async_trait;
use uuid::Uuid;

use salv_common::{Error, Result};

/// Outbound notification contract consumed by the schedulers
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, recipient_ids: &[Uuid], subject: &str, body: &str) -> Result<()>;
}

/// Posts one JSON object per dispatch to the configured webhook endpoint.
/// The response body is ignored; only success/failure is reported.
pub struct HttpNotificationGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotificationGateway {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn send(&self, recipient_ids: &[Uuid], subject: &str, body: &str) -> Result<()> {
        let payload = serde_json::json!({
            "recipients": recipient_ids,
            "subject": subject,
            "body": body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notification(format!("Dispatch to {} failed: {}", self.endpoint, e)))?;

        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "Dispatch to {} returned {}",
                self.endpoint,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Gateway used when no endpoint is configured; every dispatch is a log line
pub struct LogOnlyGateway;

#[async_trait]
impl NotificationGateway for LogOnlyGateway {
    async fn send(&self, recipient_ids: &[Uuid], subject: &str, _body: &str) -> Result<()> {
        tracing::info!(
            recipients = recipient_ids.len(),
            subject,
            "Notification dispatch (no endpoint configured)"
        );
        Ok(())
    }
}
