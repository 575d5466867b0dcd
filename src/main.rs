//! VitalSync CLI
//!
//! Command-line entry point for the health-data sync engine.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitalsync::cache::{HttpKvStore, TieredCache};
use vitalsync::config::{generate_default_config, Config};
use vitalsync::publish::{HttpEventSink, WebhookNotifier};
use vitalsync::sources::{
    OmronBloodPressureSource, OmronClient, OmronHeartRateSource, WithingsClient,
    WithingsSleepSource, WithingsWeightSource,
};
use vitalsync::sync::{EventSink, NotificationChannel, SourceAdapter, SyncOrchestrator, SyncSettings};

#[derive(Parser)]
#[command(name = "vitalsync", about = "Resilient health-data sync engine", version)]
struct Cli {
    /// Path to a config file (default locations are searched otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,

    /// Print a default config file to stdout and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.init_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_logging(&config);
    config.validate()?;

    tracing::info!("VitalSync v{}", env!("CARGO_PKG_VERSION"));

    let settings = SyncSettings {
        calls_per_minute: config.sync.calls_per_minute,
        retry_count: config.sync.retry_count,
        retry_base_delay: std::time::Duration::from_secs(config.sync.retry_base_delay_seconds),
        cache_ttl: std::time::Duration::from_secs(config.cache.ttl_seconds),
        summary_cache_ttl: std::time::Duration::from_secs(config.cache.summary_ttl_seconds),
        sync_interval: std::time::Duration::from_secs(config.sync.interval_seconds),
    };

    let cache = match &config.cache.remote_url {
        Some(url) => {
            tracing::info!(remote_url = %url, "remote cache tier enabled");
            TieredCache::with_remote(settings.cache_ttl, Arc::new(HttpKvStore::new(url.clone())))
        }
        None => TieredCache::new(settings.cache_ttl),
    };

    let sources = build_sources(&config);
    if sources.is_empty() {
        tracing::warn!("no sources enabled; cycles will produce empty summaries");
    }

    let channels = build_channels(&config);
    let event_sink = build_event_sink(&config);

    let orchestrator = Arc::new(SyncOrchestrator::new(
        settings, cache, sources, channels, event_sink,
    ));

    if cli.once {
        let report = orchestrator.run_cycle().await;
        tracing::info!(
            sources_ok = report.sources_ok,
            sources_failed = report.sources_failed,
            events_published = report.events_published,
            "cycle complete"
        );
        if let Some(summary) = orchestrator.latest_summary().await {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        return Ok(());
    }

    let driver = orchestrator.clone().start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    driver.abort();

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vitalsync={}", config.logging.level)),
    );

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_sources(config: &Config) -> Vec<Arc<dyn SourceAdapter>> {
    let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if let Some(withings) = &config.sources.withings {
        if withings.enabled {
            let client = Arc::new(WithingsClient::new(
                withings.access_token.clone(),
                withings.base_url.clone(),
            ));
            sources.push(Arc::new(WithingsWeightSource::new(client.clone())));
            sources.push(Arc::new(WithingsSleepSource::new(client)));
        }
    }

    if let Some(omron) = &config.sources.omron {
        if omron.enabled {
            let client = Arc::new(OmronClient::new(
                omron.access_token.clone(),
                omron.base_url.clone(),
            ));
            sources.push(Arc::new(OmronBloodPressureSource::new(client.clone())));
            sources.push(Arc::new(OmronHeartRateSource::new(client)));
        }
    }

    sources
}

fn build_channels(config: &Config) -> Vec<Arc<dyn NotificationChannel>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if let Some(webhook) = &config.notifications.webhook {
        if webhook.enabled {
            channels.push(Arc::new(WebhookNotifier::new(
                webhook.name.clone(),
                webhook.url.clone(),
            )));
        }
    }

    channels
}

fn build_event_sink(config: &Config) -> Option<Arc<dyn EventSink>> {
    config
        .events
        .sink_url
        .as_ref()
        .map(|url| Arc::new(HttpEventSink::new(url.clone())) as Arc<dyn EventSink>)
}
