//! Omron Source Adapters
//!
//! Blood-pressure and heart-rate readings from the Omron wellness API.

use super::{check_status, classify_request_error};
use crate::metrics::{MetricType, RawReading};
use crate::sync::{SourceAdapter, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://api-omronwellness.com/v1";

/// Shared Omron API client for the blood-pressure and heart-rate feeds.
pub struct OmronClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl OmronClient {
    pub fn new(access_token: impl Into<String>, base_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            access_token: access_token.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        response.json().await.map_err(classify_request_error)
    }

    /// Fetch the latest blood-pressure readings.
    pub async fn fetch_blood_pressure(&self) -> Result<Vec<RawReading>, SourceError> {
        let body: BloodPressureResponse = self.get_json("bloodpressure/readings").await?;

        Ok(body
            .readings
            .into_iter()
            .map(|r| {
                RawReading::new(
                    MetricType::BloodPressure,
                    json!({
                        "systolic": r.systolic,
                        "diastolic": r.diastolic,
                        "timestamp": r.datetime,
                        "pulse": r.pulse,
                        "irregular": r.irregular,
                    }),
                )
            })
            .collect())
    }

    /// Fetch the latest heart-rate readings.
    pub async fn fetch_heart_rate(&self) -> Result<Vec<RawReading>, SourceError> {
        let body: HeartRateResponse = self.get_json("heartrate/readings").await?;

        Ok(body
            .readings
            .into_iter()
            .map(|r| {
                RawReading::new(
                    MetricType::HeartRate,
                    json!({
                        "value": r.value,
                        "timestamp": r.datetime,
                        "activity_level": r.activity_level,
                        "source": r.source,
                    }),
                )
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct BloodPressureResponse {
    #[serde(default)]
    readings: Vec<BloodPressureReading>,
}

#[derive(Debug, Deserialize)]
struct BloodPressureReading {
    systolic: f64,
    diastolic: f64,
    datetime: String,
    #[serde(default)]
    pulse: Option<f64>,
    #[serde(default)]
    irregular: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HeartRateResponse {
    #[serde(default)]
    readings: Vec<HeartRateReading>,
}

#[derive(Debug, Deserialize)]
struct HeartRateReading {
    value: f64,
    datetime: String,
    #[serde(default)]
    activity_level: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

/// The `omron_bp` logical source.
pub struct OmronBloodPressureSource {
    client: Arc<OmronClient>,
}

impl OmronBloodPressureSource {
    pub fn new(client: Arc<OmronClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for OmronBloodPressureSource {
    fn source_id(&self) -> &str {
        "omron_bp"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::BloodPressure
    }

    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        self.client.fetch_blood_pressure().await
    }
}

/// The `omron_hr` logical source.
pub struct OmronHeartRateSource {
    client: Arc<OmronClient>,
}

impl OmronHeartRateSource {
    pub fn new(client: Arc<OmronClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for OmronHeartRateSource {
    fn source_id(&self) -> &str {
        "omron_hr"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::HeartRate
    }

    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        self.client.fetch_heart_rate().await
    }
}
