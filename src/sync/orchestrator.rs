//! Sync Cycle Orchestrator
//!
//! Coordinates fetch -> cache -> analyze -> alert -> publish for each sync
//! cycle, tracking per-source health. Failure of one source never aborts
//! the cycle for the others.

use super::{
    EventSink, NotificationChannel, SourceAdapter, SourceState, SourceSyncStatus,
};
use crate::alerts::{Alert, AlertEngine};
use crate::analysis::{Aggregator, HealthSummary};
use crate::cache::{KeyDescriptor, TieredCache};
use crate::metrics::{normalize, HealthMetric, MetricType};
use crate::resilience::{RateLimiter, RetryPolicy};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Tunable policy knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub calls_per_minute: usize,
    pub retry_count: u32,
    pub retry_base_delay: Duration,
    pub cache_ttl: Duration,
    pub summary_cache_ttl: Duration,
    pub sync_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            calls_per_minute: 30,
            retry_count: 3,
            retry_base_delay: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(3600),
            summary_cache_ttl: Duration::from_secs(3600),
            sync_interval: Duration::from_secs(60),
        }
    }
}

/// Cycle-completion record: downstream write counts for event logging.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub events_attempted: usize,
    pub events_published: usize,
    pub alerts_changed: bool,
}

/// Drives sync cycles across all registered sources.
///
/// The summary cache and the previous-alert set are process-wide state
/// owned here; the driver loop runs cycles strictly one at a time, which
/// keeps both single-writer.
pub struct SyncOrchestrator {
    settings: SyncSettings,
    limiter: RateLimiter,
    retry: RetryPolicy,
    cache: TieredCache,
    aggregator: Aggregator,
    alert_engine: AlertEngine,
    sources: Vec<Arc<dyn SourceAdapter>>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    event_sink: Option<Arc<dyn EventSink>>,
    status: RwLock<HashMap<String, SourceSyncStatus>>,
    active_alerts: RwLock<Vec<Alert>>,
}

impl SyncOrchestrator {
    pub fn new(
        settings: SyncSettings,
        cache: TieredCache,
        sources: Vec<Arc<dyn SourceAdapter>>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        event_sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        let status = sources
            .iter()
            .map(|s| {
                (
                    s.source_id().to_string(),
                    SourceSyncStatus::unknown(s.source_id()),
                )
            })
            .collect();

        Self {
            limiter: RateLimiter::new(settings.calls_per_minute),
            retry: RetryPolicy::new(settings.retry_count, settings.retry_base_delay),
            aggregator: Aggregator::new(settings.summary_cache_ttl),
            alert_engine: AlertEngine::new(),
            settings,
            cache,
            sources,
            channels,
            event_sink,
            status: RwLock::new(status),
            active_alerts: RwLock::new(Vec::new()),
        }
    }

    /// Run one full fetch -> cache -> analyze -> alert -> publish pass.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = std::time::Instant::now();
        tracing::info!(%cycle_id, "starting sync cycle");

        let mut series: HashMap<MetricType, Vec<HealthMetric>> = HashMap::new();
        for source in &self.sources {
            let metrics = self.fetch_series(source.as_ref()).await;
            series.entry(source.metric_type()).or_default().extend(metrics);
        }

        let empty = Vec::new();
        let summary = self
            .aggregator
            .generate_summary(
                series.get(&MetricType::Weight).unwrap_or(&empty),
                series.get(&MetricType::BloodPressure).unwrap_or(&empty),
                series.get(&MetricType::HeartRate).unwrap_or(&empty),
                series.get(&MetricType::Sleep).unwrap_or(&empty),
            )
            .await;

        let alerts = self.alert_engine.derive_alerts(&summary);
        let alerts_changed = {
            let previous = self.active_alerts.read().await;
            self.alert_engine.changed(&previous, &alerts)
        };
        if alerts_changed {
            *self.active_alerts.write().await = alerts.clone();
            self.send_alert_notifications(&alerts).await;
        }

        let mut events_attempted = 0;
        let mut events_published = 0;
        if let Some(sink) = &self.event_sink {
            for metric in series.values().flatten() {
                events_attempted += 1;
                match sink.publish_event(metric).await {
                    Ok(()) => events_published += 1,
                    Err(e) => {
                        tracing::error!(
                            metric_type = %metric.metric_type,
                            error = %e,
                            "failed to publish metric event"
                        );
                    }
                }
            }
        }

        self.log_persistent_errors().await;

        let (sources_ok, sources_failed) = {
            let status = self.status.read().await;
            let ok = status
                .values()
                .filter(|s| s.status == SourceState::Success)
                .count();
            let failed = status
                .values()
                .filter(|s| s.status == SourceState::Error)
                .count();
            (ok, failed)
        };

        let report = CycleReport {
            cycle_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            sources_ok,
            sources_failed,
            events_attempted,
            events_published,
            alerts_changed,
        };

        tracing::info!(
            %cycle_id,
            sources_ok,
            sources_failed,
            events_published,
            events_attempted,
            alerts_changed,
            "sync cycle completed"
        );

        report
    }

    /// Fetch one source's normalized series, consulting the cache first.
    ///
    /// Cache keys embed the source identity and the current UTC date, so
    /// same-day lookups are idempotent and cross-source collisions are
    /// impossible. On a terminal fetch failure the error status is recorded
    /// and an empty series is returned.
    async fn fetch_series(&self, source: &dyn SourceAdapter) -> Vec<HealthMetric> {
        let source_id = source.source_id();
        let key = KeyDescriptor::new()
            .field("function", source_id)
            .field("date", Utc::now().date_naive().to_string());

        if let Some(value) = self.cache.get(&key).await {
            match serde_json::from_value::<Vec<HealthMetric>>(value) {
                Ok(metrics) => {
                    tracing::debug!(source = source_id, "serving readings from cache");
                    return metrics;
                }
                Err(e) => {
                    tracing::warn!(
                        source = source_id,
                        error = %e,
                        "cached readings were malformed, refetching"
                    );
                }
            }
        }

        // rate-limit inside each retry attempt so backoff and limiter waits stack
        let result = self
            .retry
            .execute(source_id, || async move {
                self.limiter.acquire(source_id).await;
                source.fetch_readings().await
            })
            .await;

        match result {
            Ok(raw) => {
                let mut metrics = Vec::with_capacity(raw.len());
                for reading in &raw {
                    match normalize(reading) {
                        Ok(metric) => metrics.push(metric),
                        Err(e) => {
                            tracing::warn!(
                                source = source_id,
                                error = %e,
                                "dropping malformed reading"
                            );
                        }
                    }
                }

                self.record_status(source_id, SourceState::Success, None).await;

                match serde_json::to_value(&metrics) {
                    Ok(value) => {
                        self.cache
                            .put(&key, value, Some(self.settings.cache_ttl))
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            source = source_id,
                            error = %e,
                            "failed to serialize readings for cache"
                        );
                    }
                }

                metrics
            }
            Err(e) => {
                tracing::error!(
                    source = source_id,
                    error = %e,
                    "source fetch failed after retries"
                );
                self.record_status(source_id, SourceState::Error, Some(e.to_string()))
                    .await;
                Vec::new()
            }
        }
    }

    async fn record_status(
        &self,
        source_id: &str,
        state: SourceState,
        error_detail: Option<String>,
    ) {
        self.status.write().await.insert(
            source_id.to_string(),
            SourceSyncStatus {
                source_id: source_id.to_string(),
                status: state,
                timestamp: Utc::now(),
                error_detail,
            },
        );
    }

    async fn send_alert_notifications(&self, alerts: &[Alert]) {
        if alerts.is_empty() {
            return;
        }

        let body = alerts
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let text = format!("New health alerts:\n{}", body);

        for channel in &self.channels {
            if let Err(e) = channel.notify(&text).await {
                tracing::error!(
                    channel = channel.name(),
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
    }

    /// Persistent per-source errors surface as a logged warning each cycle,
    /// not as an end-user alert.
    async fn log_persistent_errors(&self) {
        for status in self.status.read().await.values() {
            if status.status == SourceState::Error {
                tracing::warn!(
                    source = %status.source_id,
                    error = status.error_detail.as_deref().unwrap_or("unknown"),
                    "persistent sync error"
                );
            }
        }
    }

    /// Snapshot of all per-source statuses, ordered by source id.
    pub async fn sync_status(&self) -> Vec<SourceSyncStatus> {
        let mut statuses: Vec<SourceSyncStatus> =
            self.status.read().await.values().cloned().collect();
        statuses.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        statuses
    }

    /// The currently active alert set.
    pub async fn active_alerts(&self) -> Vec<Alert> {
        self.active_alerts.read().await.clone()
    }

    /// The most recently generated summary, if any cycle has run.
    pub async fn latest_summary(&self) -> Option<HealthSummary> {
        self.aggregator.cached_summary().await
    }

    /// Start the periodic driver. One loop runs cycles back to back, so a
    /// slow cycle simply delays the next tick instead of overlapping it.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            interval_secs = self.settings.sync_interval.as_secs(),
            "starting sync driver"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.sync_interval);

            loop {
                ticker.tick().await;
                self.run_cycle().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{PublishError, SourceError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StaticSource {
        id: &'static str,
        kind: MetricType,
        readings: Vec<crate::metrics::RawReading>,
        fetches: AtomicUsize,
    }

    impl StaticSource {
        fn new(
            id: &'static str,
            kind: MetricType,
            readings: Vec<crate::metrics::RawReading>,
        ) -> Arc<Self> {
            Arc::new(Self {
                id,
                kind,
                readings,
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for StaticSource {
        fn source_id(&self) -> &str {
            self.id
        }

        fn metric_type(&self) -> MetricType {
            self.kind
        }

        async fn fetch_readings(&self) -> Result<Vec<crate::metrics::RawReading>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.readings.clone())
        }
    }

    struct BrokenSource {
        id: &'static str,
        kind: MetricType,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl SourceAdapter for BrokenSource {
        fn source_id(&self) -> &str {
            self.id
        }

        fn metric_type(&self) -> MetricType {
            self.kind
        }

        async fn fetch_readings(&self) -> Result<Vec<crate::metrics::RawReading>, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::Transport("connection refused".to_string()))
        }
    }

    struct RecordingChannel {
        notifications: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn notify(&self, alert_text: &str) -> Result<(), PublishError> {
            self.notifications
                .lock()
                .unwrap()
                .push(alert_text.to_string());
            Ok(())
        }
    }

    struct CountingSink {
        published: AtomicUsize,
    }

    #[async_trait]
    impl EventSink for CountingSink {
        async fn publish_event(&self, _metric: &HealthMetric) -> Result<(), PublishError> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn weight_readings() -> Vec<crate::metrics::RawReading> {
        (0..6)
            .map(|i| {
                let value = if i < 3 { 70000.0 } else { 77000.0 };
                crate::metrics::RawReading::new(
                    MetricType::Weight,
                    json!({"value": value, "unit": "g", "timestamp": 1756000000 + i * 86400}),
                )
            })
            .collect()
    }

    fn bp_readings() -> Vec<crate::metrics::RawReading> {
        (0..4)
            .map(|i| {
                crate::metrics::RawReading::new(
                    MetricType::BloodPressure,
                    json!({
                        "systolic": 121.0 + i as f64,
                        "diastolic": 80.0,
                        "timestamp": 1756000000 + i * 86400
                    }),
                )
            })
            .collect()
    }

    fn hr_readings() -> Vec<crate::metrics::RawReading> {
        [62.0, 75.0, 105.0]
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                crate::metrics::RawReading::new(
                    MetricType::HeartRate,
                    json!({"value": value, "timestamp": 1756000000 + i as i64 * 3600}),
                )
            })
            .collect()
    }

    fn test_settings() -> SyncSettings {
        SyncSettings {
            summary_cache_ttl: Duration::ZERO,
            ..SyncSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_source_does_not_abort_the_cycle() {
        let weight = StaticSource::new("withings_weight", MetricType::Weight, weight_readings());
        let bp = StaticSource::new("omron_bp", MetricType::BloodPressure, bp_readings());
        let hr = StaticSource::new("omron_hr", MetricType::HeartRate, hr_readings());
        let sleep = Arc::new(BrokenSource {
            id: "withings_sleep",
            kind: MetricType::Sleep,
            fetches: AtomicUsize::new(0),
        });

        let orchestrator = SyncOrchestrator::new(
            test_settings(),
            TieredCache::new(Duration::from_secs(3600)),
            vec![weight.clone(), bp, hr, sleep.clone()],
            vec![],
            None,
        );

        let report = orchestrator.run_cycle().await;

        assert_eq!(report.sources_ok, 3);
        assert_eq!(report.sources_failed, 1);
        // terminal failure after the full retry budget
        assert_eq!(sleep.fetches.load(Ordering::SeqCst), 3);

        let summary = orchestrator.latest_summary().await.unwrap();
        assert!(summary.weight.is_some());
        assert!(summary.blood_pressure.is_some());
        assert!(summary.heart_rate.is_some());
        assert!(summary.sleep.is_none());

        let statuses = orchestrator.sync_status().await;
        let failed: Vec<_> = statuses
            .iter()
            .filter(|s| s.status == SourceState::Error)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source_id, "withings_sleep");
        assert!(failed[0].error_detail.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_alerts_notify_only_once() {
        let hr = StaticSource::new("omron_hr", MetricType::HeartRate, hr_readings());
        let channel = Arc::new(RecordingChannel {
            notifications: Mutex::new(Vec::new()),
        });

        let orchestrator = SyncOrchestrator::new(
            test_settings(),
            TieredCache::new(Duration::from_secs(3600)),
            vec![hr],
            vec![channel.clone()],
            None,
        );

        orchestrator.run_cycle().await;
        orchestrator.run_cycle().await;

        let sent = channel.notifications.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("105"));

        let alerts = orchestrator.active_alerts().await;
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_cycle_is_served_from_cache() {
        let weight = StaticSource::new("withings_weight", MetricType::Weight, weight_readings());

        let orchestrator = SyncOrchestrator::new(
            test_settings(),
            TieredCache::new(Duration::from_secs(3600)),
            vec![weight.clone()],
            vec![],
            None,
        );

        orchestrator.run_cycle().await;
        orchestrator.run_cycle().await;

        assert_eq!(weight.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn event_sink_counts_attempted_and_published() {
        let weight = StaticSource::new("withings_weight", MetricType::Weight, weight_readings());
        let sink = Arc::new(CountingSink {
            published: AtomicUsize::new(0),
        });

        let orchestrator = SyncOrchestrator::new(
            test_settings(),
            TieredCache::new(Duration::from_secs(3600)),
            vec![weight],
            vec![],
            Some(sink.clone()),
        );

        let report = orchestrator.run_cycle().await;

        assert_eq!(report.events_attempted, 6);
        assert_eq!(report.events_published, 6);
        assert_eq!(sink.published.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_readings_are_dropped_not_fatal() {
        let mut readings = weight_readings();
        readings.push(crate::metrics::RawReading::new(
            MetricType::Weight,
            json!({"unit": "g", "timestamp": 1756000000}),
        ));
        let weight = StaticSource::new("withings_weight", MetricType::Weight, readings);

        let orchestrator = SyncOrchestrator::new(
            test_settings(),
            TieredCache::new(Duration::from_secs(3600)),
            vec![weight],
            vec![],
            None,
        );

        let report = orchestrator.run_cycle().await;

        assert_eq!(report.sources_ok, 1);
        let summary = orchestrator.latest_summary().await.unwrap();
        // six valid readings survive, the malformed one is dropped
        assert!(summary.weight.is_some());
    }
}
