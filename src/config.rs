//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sync cycle and resilience-policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_interval")]
    pub interval_seconds: u64,

    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute: usize,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_seconds: u64,
}

fn default_sync_interval() -> u64 {
    60
}

fn default_calls_per_minute() -> usize {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sync_interval(),
            calls_per_minute: default_calls_per_minute(),
            retry_count: default_retry_count(),
            retry_base_delay_seconds: default_retry_base_delay(),
        }
    }
}

/// Cache tier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    #[serde(default = "default_summary_ttl")]
    pub summary_ttl_seconds: u64,

    /// Optional remote-tier base URL. Absent means local-tier-only caching.
    pub remote_url: Option<String>,
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_summary_ttl() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            summary_ttl_seconds: default_summary_ttl(),
            remote_url: None,
        }
    }
}

/// Vendor source configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    pub withings: Option<WithingsSourceConfig>,
    pub omron: Option<OmronSourceConfig>,
}

/// Withings feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WithingsSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub access_token: String,
    pub base_url: Option<String>,
}

/// Omron feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OmronSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub access_token: String,
    pub base_url: Option<String>,
}

/// Notification channel configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    pub webhook: Option<WebhookConfig>,
}

/// Webhook notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_webhook_name")]
    pub name: String,
}

fn default_webhook_name() -> String {
    "webhook".to_string()
}

/// Event sink configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsConfig {
    /// Optional per-metric event sink URL (e.g. a calendar-writer service).
    pub sink_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("vitalsync").join("config.toml")),
            Some(PathBuf::from("/etc/vitalsync/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Validate that all required configuration is present.
    ///
    /// Missing settings on an enabled block are fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(withings) = &self.sources.withings {
            if withings.enabled && withings.access_token.is_empty() {
                return Err(ConfigError::Missing(
                    "sources.withings.access_token".to_string(),
                ));
            }
        }
        if let Some(omron) = &self.sources.omron {
            if omron.enabled && omron.access_token.is_empty() {
                return Err(ConfigError::Missing(
                    "sources.omron.access_token".to_string(),
                ));
            }
        }
        if let Some(webhook) = &self.notifications.webhook {
            if webhook.enabled && webhook.url.is_empty() {
                return Err(ConfigError::Missing(
                    "notifications.webhook.url".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(interval) = std::env::var("VITALSYNC_SYNC_INTERVAL") {
            if let Ok(v) = interval.parse() {
                self.sync.interval_seconds = v;
            }
        }
        if let Ok(limit) = std::env::var("VITALSYNC_CALLS_PER_MINUTE") {
            if let Ok(v) = limit.parse() {
                self.sync.calls_per_minute = v;
            }
        }
        if let Ok(ttl) = std::env::var("VITALSYNC_CACHE_TTL") {
            if let Ok(v) = ttl.parse() {
                self.cache.ttl_seconds = v;
            }
        }
        if let Ok(url) = std::env::var("VITALSYNC_REMOTE_CACHE_URL") {
            self.cache.remote_url = Some(url);
        }
        if let Ok(level) = std::env::var("VITALSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("VITALSYNC_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            cache: CacheConfig::default(),
            sources: SourcesConfig::default(),
            notifications: NotificationsConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# VitalSync Configuration
#
# Environment variables override these settings:
# - VITALSYNC_SYNC_INTERVAL
# - VITALSYNC_CALLS_PER_MINUTE
# - VITALSYNC_CACHE_TTL
# - VITALSYNC_REMOTE_CACHE_URL
# - VITALSYNC_LOG_LEVEL
# - VITALSYNC_LOG_FORMAT

[sync]
# How often to run a sync cycle (seconds)
interval_seconds = 60

# Per-source call budget in any trailing 60-second window
calls_per_minute = 30

# Total fetch attempts per source per cycle
retry_count = 3

# Base backoff delay between attempts (seconds, doubles each retry)
retry_base_delay_seconds = 1

[cache]
# Time-to-live for cached source readings (seconds)
ttl_seconds = 3600

# Time-to-live for the aggregated health summary (seconds)
summary_ttl_seconds = 3600

# Optional shared remote cache tier; omit for local-only caching
# remote_url = "http://localhost:7379"

[sources.withings]
# Enable the Withings weight and sleep feeds
enabled = false

# Pre-obtained API bearer token
access_token = ""

[sources.omron]
# Enable the Omron blood-pressure and heart-rate feeds
enabled = false

# Pre-obtained API bearer token
access_token = ""

[notifications.webhook]
# Enable webhook alert delivery
enabled = false

# Webhook endpoint receiving {"text": ...} payloads
url = ""

[events]
# Optional per-metric event sink (e.g. a calendar-writer service)
# sink_url = "http://localhost:8091/events"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = Config::default();
        assert_eq!(config.sync.interval_seconds, 60);
        assert_eq!(config.sync.calls_per_minute, 30);
        assert_eq!(config.sync.retry_count, 3);
        assert_eq!(config.sync.retry_base_delay_seconds, 1);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.cache.summary_ttl_seconds, 3600);
        assert!(config.cache.remote_url.is_none());
    }

    #[test]
    fn generated_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.sync.interval_seconds, 60);
        assert!(config.sources.withings.is_some());
        assert!(!config.sources.withings.unwrap().enabled);
    }

    #[test]
    fn loads_partial_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[sync]\ninterval_seconds = 120\n\n[cache]\nremote_url = \"http://cache:7379\"\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sync.interval_seconds, 120);
        assert_eq!(config.sync.calls_per_minute, 30);
        assert_eq!(
            config.cache.remote_url.as_deref(),
            Some("http://cache:7379")
        );
    }

    #[test]
    fn enabled_source_without_token_fails_validation() {
        let mut config = Config::default();
        config.sources.withings = Some(WithingsSourceConfig {
            enabled: true,
            access_token: String::new(),
            base_url: None,
        });

        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn disabled_source_without_token_is_fine() {
        let mut config = Config::default();
        config.sources.omron = Some(OmronSourceConfig {
            enabled: false,
            access_token: String::new(),
            base_url: None,
        });

        assert!(config.validate().is_ok());
    }
}
