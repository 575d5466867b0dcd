//! Withings Source Adapters
//!
//! Weight measures arrive in device grams; sleep comes as state intervals
//! with start/end epochs. Unit conversion is left to the normalizer.

use super::{check_status, classify_request_error};
use crate::metrics::{MetricType, RawReading};
use crate::sync::{SourceAdapter, SourceError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://wbsapi.withings.net";

// Withings measure type for weight
const MEASTYPE_WEIGHT: i64 = 1;

/// Shared Withings API client for the weight and sleep feeds.
pub struct WithingsClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl WithingsClient {
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

    /// Fetch the latest weight measurements.
    pub async fn fetch_weight(&self) -> Result<Vec<RawReading>, SourceError> {
        let url = format!("{}/measure", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("action", "getmeas"), ("meastype", "1")])
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        let body: MeasureResponse = response.json().await.map_err(classify_request_error)?;

        let mut readings = Vec::new();
        for group in body.body.measuregrps {
            for measure in group.measures {
                if measure.measure_type == MEASTYPE_WEIGHT {
                    readings.push(RawReading::new(
                        MetricType::Weight,
                        json!({
                            "value": measure.value,
                            "unit": "g",
                            "timestamp": group.date,
                        }),
                    ));
                }
            }
        }

        Ok(readings)
    }

    /// Fetch today's sleep series.
    pub async fn fetch_sleep(&self) -> Result<Vec<RawReading>, SourceError> {
        let url = format!("{}/v2/sleep", self.base_url);
        let now = Utc::now();
        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_else(|| now.timestamp() - 86_400);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("action", "get".to_string()),
                ("startdate", start_of_day.to_string()),
                ("enddate", now.timestamp().to_string()),
            ])
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        let body: SleepResponse = response.json().await.map_err(classify_request_error)?;

        Ok(body
            .body
            .series
            .into_iter()
            .map(|series| {
                RawReading::new(
                    MetricType::Sleep,
                    json!({
                        "state": sleep_state_label(series.state),
                        "start": series.startdate,
                        "end": series.enddate,
                    }),
                )
            })
            .collect())
    }
}

fn sleep_state_label(state: i64) -> &'static str {
    match state {
        0 => "awake",
        1 => "light",
        2 => "deep",
        3 => "rem",
        _ => "unknown",
    }
}

#[derive(Debug, Deserialize)]
struct MeasureResponse {
    #[serde(default)]
    body: MeasureBody,
}

#[derive(Debug, Default, Deserialize)]
struct MeasureBody {
    #[serde(default)]
    measuregrps: Vec<MeasureGroup>,
}

#[derive(Debug, Deserialize)]
struct MeasureGroup {
    date: i64,
    #[serde(default)]
    measures: Vec<Measure>,
}

#[derive(Debug, Deserialize)]
struct Measure {
    value: f64,
    #[serde(rename = "type")]
    measure_type: i64,
}

#[derive(Debug, Deserialize)]
struct SleepResponse {
    #[serde(default)]
    body: SleepBody,
}

#[derive(Debug, Default, Deserialize)]
struct SleepBody {
    #[serde(default)]
    series: Vec<SleepSeries>,
}

#[derive(Debug, Deserialize)]
struct SleepSeries {
    startdate: i64,
    enddate: i64,
    state: i64,
}

/// The `withings_weight` logical source.
pub struct WithingsWeightSource {
    client: Arc<WithingsClient>,
}

impl WithingsWeightSource {
    pub fn new(client: Arc<WithingsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for WithingsWeightSource {
    fn source_id(&self) -> &str {
        "withings_weight"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Weight
    }

    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        self.client.fetch_weight().await
    }
}

/// The `withings_sleep` logical source.
pub struct WithingsSleepSource {
    client: Arc<WithingsClient>,
}

impl WithingsSleepSource {
    pub fn new(client: Arc<WithingsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for WithingsSleepSource {
    fn source_id(&self) -> &str {
        "withings_sleep"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Sleep
    }

    async fn fetch_readings(&self) -> Result<Vec<RawReading>, SourceError> {
        self.client.fetch_sleep().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_states_map_to_labels() {
        assert_eq!(sleep_state_label(0), "awake");
        assert_eq!(sleep_state_label(2), "deep");
        assert_eq!(sleep_state_label(3), "rem");
        assert_eq!(sleep_state_label(9), "unknown");
    }

    #[test]
    fn measure_response_parses_weight_groups() {
        let raw = r#"{
            "status": 0,
            "body": {
                "measuregrps": [
                    {"date": 1756100000, "measures": [{"value": 72400, "type": 1}, {"value": 510, "type": 8}]}
                ]
            }
        }"#;

        let parsed: MeasureResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.body.measuregrps.len(), 1);
        assert_eq!(parsed.body.measuregrps[0].measures[0].measure_type, 1);
    }
}
