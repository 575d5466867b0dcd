//! Downstream Publishers
//!
//! HTTP implementations of the notification-channel and event-sink
//! contracts. Delivery is best effort; the orchestrator logs failures and
//! never blocks on them.

use crate::metrics::HealthMetric;
use crate::sync::{EventSink, NotificationChannel, PublishError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

fn build_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
}

/// Posts alert text to a webhook as `{"text": ...}`.
pub struct WebhookNotifier {
    name: String,
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: build_client(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, alert_text: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "text": alert_text }))
            .send()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PublishError::Status(response.status().as_u16()))
        }
    }
}

/// Posts individual metric records to an HTTP event sink (e.g. a
/// calendar-event writer service).
pub struct HttpEventSink {
    client: Client,
    url: String,
}

impl HttpEventSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn publish_event(&self, metric: &HealthMetric) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .json(metric)
            .send()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PublishError::Status(response.status().as_u16()))
        }
    }
}
