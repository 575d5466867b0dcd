//! Sync Orchestration
//!
//! Contracts for the external collaborators (source adapters, notification
//! channels, the calendar/event sink), the per-source status model, and the
//! orchestrator that drives each sync cycle.

mod orchestrator;

pub use orchestrator::{CycleReport, SyncOrchestrator, SyncSettings};

use crate::metrics::{HealthMetric, MetricType, RawReading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One external health-data feed.
///
/// Adapters only translate the vendor protocol; retry and rate limiting are
/// owned by the orchestrator, never by the adapter.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable logical identifier, e.g. `withings_weight`.
    fn source_id(&self) -> &str;

    /// The metric family this source feeds.
    fn metric_type(&self) -> MetricType;

    /// Fetch the latest raw readings from the vendor.
    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError>;
}

/// One notification channel. Failures are logged by the orchestrator and
/// never block other channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, alert_text: &str) -> Result<(), PublishError>;
}

/// Downstream per-metric event sink (e.g. a calendar writer). Best effort:
/// the orchestrator counts outcomes but does not retry.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish_event(&self, metric: &HealthMetric) -> Result<(), PublishError>;
}

/// Errors from a source fetch attempt.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timeout")]
    Timeout,

    #[error("vendor API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Errors from a downstream publish (notification or event sink).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("publish rejected with status {0}")]
    Status(u16),
}

/// Latest known state of one logical source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Unknown,
    Success,
    Error,
}

/// Per-source sync status. Overwritten on every fetch attempt, never
/// deleted; no history is retained beyond the latest transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSyncStatus {
    pub source_id: String,
    pub status: SourceState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl SourceSyncStatus {
    pub fn unknown(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            status: SourceState::Unknown,
            timestamp: Utc::now(),
            error_detail: None,
        }
    }
}
