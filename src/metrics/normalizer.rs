//! Metric Normalizer
//!
//! Pure conversion from source-specific raw readings to uniform
//! [`HealthMetric`] records. Unit conversions happen here, not in the
//! source adapters. Malformed input fails with a validation error and is
//! never retried.

use super::{HealthMetric, MetricType, MetricValue};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A reading as delivered by a source adapter, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReading {
    pub kind: MetricType,
    pub payload: Value,
}

impl RawReading {
    pub fn new(kind: MetricType, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// Validation errors for malformed raw readings.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing field '{0}' in raw reading")]
    MissingField(&'static str),

    #[error("field '{field}' has invalid value: {detail}")]
    InvalidField {
        field: &'static str,
        detail: String,
    },

    #[error("unsupported unit '{0}'")]
    UnsupportedUnit(String),
}

/// Normalize one raw reading into a [`HealthMetric`].
pub fn normalize(raw: &RawReading) -> Result<HealthMetric, NormalizeError> {
    match raw.kind {
        MetricType::Weight => normalize_weight(&raw.payload),
        MetricType::BloodPressure => normalize_blood_pressure(&raw.payload),
        MetricType::HeartRate => normalize_heart_rate(&raw.payload),
        MetricType::Sleep => normalize_sleep(&raw.payload),
    }
}

fn normalize_weight(payload: &Value) -> Result<HealthMetric, NormalizeError> {
    let value = require_f64(payload, "value")?;
    let timestamp = require_timestamp(payload, "timestamp")?;

    // Withings delivers device grams; everything is reported in kilograms.
    let unit = payload.get("unit").and_then(Value::as_str).unwrap_or("kg");
    let kilograms = match unit {
        "kg" => value,
        "g" => value / 1000.0,
        "lb" | "lbs" => value * 0.453_592_37,
        other => return Err(NormalizeError::UnsupportedUnit(other.to_string())),
    };

    Ok(HealthMetric::new(
        MetricValue::Scalar(kilograms),
        timestamp,
        MetricType::Weight,
        "kg",
    ))
}

fn normalize_blood_pressure(payload: &Value) -> Result<HealthMetric, NormalizeError> {
    let systolic = require_f64(payload, "systolic")?;
    let diastolic = require_f64(payload, "diastolic")?;
    let timestamp = require_timestamp(payload, "timestamp")?;

    let mut metric = HealthMetric::new(
        MetricValue::BloodPressure {
            systolic,
            diastolic,
        },
        timestamp,
        MetricType::BloodPressure,
        "mmHg",
    );
    if let Some(pulse) = payload.get("pulse") {
        if !pulse.is_null() {
            metric = metric.with_extra("pulse", pulse.clone());
        }
    }
    if let Some(irregular) = payload.get("irregular") {
        if !irregular.is_null() {
            metric = metric.with_extra("irregular", irregular.clone());
        }
    }
    Ok(metric)
}

fn normalize_heart_rate(payload: &Value) -> Result<HealthMetric, NormalizeError> {
    let value = require_f64(payload, "value")?;
    let timestamp = require_timestamp(payload, "timestamp")?;

    let mut metric = HealthMetric::new(
        MetricValue::Scalar(value),
        timestamp,
        MetricType::HeartRate,
        "bpm",
    );
    if let Some(level) = payload.get("activity_level") {
        if !level.is_null() {
            metric = metric.with_extra("activity_level", level.clone());
        }
    }
    if let Some(source) = payload.get("source") {
        if !source.is_null() {
            metric = metric.with_extra("measurement_source", source.clone());
        }
    }
    Ok(metric)
}

fn normalize_sleep(payload: &Value) -> Result<HealthMetric, NormalizeError> {
    let state = payload
        .get("state")
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingField("state"))?;
    let start = require_timestamp(payload, "start")?;
    let end = require_timestamp(payload, "end")?;

    if end < start {
        return Err(NormalizeError::InvalidField {
            field: "end",
            detail: "sleep interval ends before it starts".to_string(),
        });
    }

    Ok(HealthMetric::new(
        MetricValue::SleepState(state.to_string()),
        start,
        MetricType::Sleep,
        "state",
    )
    .with_extra("start", Value::String(start.to_rfc3339()))
    .with_extra("end", Value::String(end.to_rfc3339())))
}

fn require_f64(payload: &Value, field: &'static str) -> Result<f64, NormalizeError> {
    payload
        .get(field)
        .ok_or(NormalizeError::MissingField(field))?
        .as_f64()
        .ok_or_else(|| NormalizeError::InvalidField {
            field,
            detail: "expected a number".to_string(),
        })
}

/// Accepts epoch seconds or an RFC 3339 string.
fn require_timestamp(payload: &Value, field: &'static str) -> Result<DateTime<Utc>, NormalizeError> {
    let value = payload.get(field).ok_or(NormalizeError::MissingField(field))?;

    if let Some(secs) = value.as_i64() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| NormalizeError::InvalidField {
                field,
                detail: format!("epoch seconds out of range: {}", secs),
            });
    }

    if let Some(text) = value.as_str() {
        return DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| NormalizeError::InvalidField {
                field,
                detail: e.to_string(),
            });
    }

    Err(NormalizeError::InvalidField {
        field,
        detail: "expected epoch seconds or an RFC 3339 string".to_string(),
    })
}
