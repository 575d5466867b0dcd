//! # VitalSync
//!
//! Resilient Health-Data Synchronization - pulls readings from consumer
//! health APIs, normalizes them into a common metric model, and keeps an
//! aggregated health summary with trend-driven alerts.
//!
//! ## Features
//!
//! - **Resilient fetching**: Per-source rate limiting and exponential-backoff retry
//! - **Two-tier caching**: Local in-memory tier with an optional shared remote tier
//! - **Normalization**: Vendor payloads converted into one `HealthMetric` shape
//! - **Trend analysis**: Weight and blood-pressure trend classification with memoization
//! - **Alerting**: Rule-derived alerts delivered only when the active set changes
//!
//! ## Modules
//!
//! - [`resilience`]: Rate limiter and retry policy
//! - [`cache`]: Two-tier cache with deterministic key fingerprints
//! - [`metrics`]: The common metric model and the normalizer
//! - [`analysis`]: Trend analyzer and summary aggregator
//! - [`alerts`]: Alert derivation rules
//! - [`sync`]: The orchestrator driving the whole cycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vitalsync::analysis::Aggregator;
//! use vitalsync::cache::TieredCache;
//! use vitalsync::sync::{SyncOrchestrator, SyncSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = SyncSettings::default();
//!     let cache = TieredCache::new(settings.cache_ttl);
//!
//!     let orchestrator = Arc::new(SyncOrchestrator::new(settings, cache, vec![], vec![], None));
//!
//!     // One sync cycle: fetch, normalize, aggregate, alert
//!     let report = orchestrator.run_cycle().await;
//!     println!("Synced {} sources", report.sources_ok);
//!
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod publish;
pub mod resilience;
pub mod sources;
pub mod sync;

pub use alerts::{Alert, AlertEngine, Severity};
pub use analysis::{Aggregator, HealthSummary, HealthTrend, TrendAnalyzer, TrendDirection};
pub use cache::{KeyDescriptor, TieredCache};
pub use config::Config;
pub use metrics::{HealthMetric, MetricType, MetricValue, RawReading};
pub use resilience::{RateLimiter, RetryPolicy};
pub use sync::{CycleReport, SyncOrchestrator, SyncSettings};
