//! Two-Tier Request Cache
//!
//! Content-addressed key/value store that shields sources from redundant
//! calls. Lookups check the remote tier first (if configured), then the
//! local in-memory tier. Writes go through to the remote tier and always
//! land in the local tier, regardless of the remote outcome.

mod remote;

pub use remote::{HttpKvStore, RemoteStore, RemoteStoreError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Canonicalized cache-key descriptor.
///
/// Fields live in a sorted map, so two descriptors with the same fields
/// produce the same fingerprint regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDescriptor {
    fields: BTreeMap<String, String>,
}

impl KeyDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Deterministic SHA-256 fingerprint over the sorted field pairs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in &self.fields {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// A single local-tier entry with its expiration instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

/// Two-tier cache: fast local map plus an optional shared remote store.
pub struct TieredCache {
    local: RwLock<HashMap<String, CacheEntry>>,
    remote: Option<Arc<dyn RemoteStore>>,
    default_ttl: Duration,
}

impl TieredCache {
    /// Local-tier-only cache.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            remote: None,
            default_ttl,
        }
    }

    /// Cache backed by a shared remote store.
    pub fn with_remote(default_ttl: Duration, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            remote: Some(remote),
            default_ttl,
        }
    }

    /// Look up a descriptor: remote tier first, then local.
    ///
    /// Remote hits are served as-is without backfilling the local tier.
    /// Remote errors degrade to a local lookup. Expired local entries are
    /// treated as absent.
    pub async fn get(&self, key: &KeyDescriptor) -> Option<serde_json::Value> {
        let fingerprint = key.fingerprint();

        if let Some(remote) = &self.remote {
            match remote.get(&fingerprint).await {
                Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                    Ok(value) => return Some(value),
                    Err(e) => {
                        tracing::warn!(key = %fingerprint, error = %e, "remote cache entry was not valid JSON");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %fingerprint, error = %e, "remote cache read failed, falling back to local tier");
                }
            }
        }

        let local = self.local.read().await;
        match local.get(&fingerprint) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.value.clone()),
            _ => None,
        }
    }

    /// Store a value under a descriptor with the given (or default) TTL.
    ///
    /// A remote write failure is logged and never aborts the local write.
    pub async fn put(&self, key: &KeyDescriptor, value: serde_json::Value, ttl: Option<Duration>) {
        let fingerprint = key.fingerprint();
        let ttl = ttl.unwrap_or(self.default_ttl);

        if let Some(remote) = &self.remote {
            match serde_json::to_vec(&value) {
                Ok(bytes) => {
                    if let Err(e) = remote.setex(&fingerprint, ttl.as_secs(), &bytes).await {
                        tracing::warn!(key = %fingerprint, error = %e, "remote cache write failed, keeping local entry only");
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %fingerprint, error = %e, "failed to serialize cache value for remote tier");
                }
            }
        }

        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        self.local
            .write()
            .await
            .insert(fingerprint, CacheEntry { value, expires_at });
    }
}
