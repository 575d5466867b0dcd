//! Health Metric Data Model
//!
//! Uniform records produced by the normalizer and consumed by the trend
//! analyzer and aggregator.

mod normalizer;

pub use normalizer::{normalize, NormalizeError, RawReading};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The four metric families this engine tracks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Weight,
    BloodPressure,
    HeartRate,
    Sleep,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Weight => "weight",
            MetricType::BloodPressure => "blood_pressure",
            MetricType::HeartRate => "heart_rate",
            MetricType::Sleep => "sleep",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric payload: a plain scalar for weight and heart rate, a
/// systolic/diastolic pair for blood pressure, and a state label for sleep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    BloodPressure { systolic: f64, diastolic: f64 },
    SleepState(String),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `(systolic, diastolic)` for blood-pressure values.
    pub fn as_blood_pressure(&self) -> Option<(f64, f64)> {
        match self {
            MetricValue::BloodPressure {
                systolic,
                diastolic,
            } => Some((*systolic, *diastolic)),
            _ => None,
        }
    }

    pub fn as_sleep_state(&self) -> Option<&str> {
        match self {
            MetricValue::SleepState(s) => Some(s),
            _ => None,
        }
    }
}

/// A single normalized health reading. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
    pub value: MetricValue,
    pub timestamp: DateTime<Utc>,
    pub metric_type: MetricType,
    pub unit: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl HealthMetric {
    pub fn new(
        value: MetricValue,
        timestamp: DateTime<Utc>,
        metric_type: MetricType,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            value,
            timestamp,
            metric_type,
            unit: unit.into(),
            extra: HashMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
