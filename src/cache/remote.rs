//! Remote Cache Tier
//!
//! Optional shared key/value store behind the local tier. Absence of the
//! remote tier degrades gracefully to local-only caching.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

/// Contract for the shared remote tier: plain bytes with server-side TTL.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError>;

    async fn setex(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &[u8],
    ) -> Result<(), RemoteStoreError>;
}

/// Errors from the remote cache tier.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("remote cache unavailable")]
    Unavailable,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote cache error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request timeout")]
    Timeout,
}

/// HTTP key/value client for the remote tier.
///
/// Speaks a minimal REST protocol: `GET /kv/{key}` returns the stored bytes
/// or 404, `PUT /kv/{key}?ttl={seconds}` stores bytes with expiration
/// enforced by the server's clock.
pub struct HttpKvStore {
    client: Client,
    base_url: String,
}

impl HttpKvStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn classify(e: reqwest::Error) -> RemoteStoreError {
        if e.is_timeout() {
            RemoteStoreError::Timeout
        } else if e.is_connect() {
            RemoteStoreError::Unavailable
        } else {
            RemoteStoreError::Request(e)
        }
    }
}

#[async_trait]
impl RemoteStore for HttpKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError> {
        let url = format!("{}/kv/{}", self.base_url, key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::classify)?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteStoreError::Api { status, message });
        }

        let bytes = response.bytes().await.map_err(Self::classify)?;
        Ok(Some(bytes.to_vec()))
    }

    async fn setex(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &[u8],
    ) -> Result<(), RemoteStoreError> {
        let url = format!("{}/kv/{}?ttl={}", self.base_url, key, ttl_seconds);

        let response = self
            .client
            .put(&url)
            .body(value.to_vec())
            .send()
            .await
            .map_err(Self::classify)?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(RemoteStoreError::Api { status, message })
        }
    }
}
