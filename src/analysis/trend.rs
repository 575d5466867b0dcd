//! Trend Analyzer
//!
//! Computes directional trend and magnitude from a metric series. Results
//! are memoized by series content: repeated calls with an identical input
//! series are served from a small in-memory table.

use super::mean;
use crate::metrics::{HealthMetric, MetricType, MetricValue};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Categorical direction of a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Neutral,
    Notable,
    Concerning,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::Neutral => "neutral",
            TrendDirection::Notable => "notable",
            TrendDirection::Concerning => "concerning",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived trend description. Recomputed each cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthTrend {
    pub metric_type: MetricType,
    pub trend: TrendDirection,
    pub change_magnitude: f64,
    pub explanation: String,
}

impl HealthTrend {
    fn neutral(metric_type: MetricType) -> Self {
        Self {
            metric_type,
            trend: TrendDirection::Neutral,
            change_magnitude: 0.0,
            explanation: "insufficient data points".to_string(),
        }
    }
}

/// Trend computation with content-keyed memoization.
pub struct TrendAnalyzer {
    memo: Mutex<HashMap<u64, HealthTrend>>,
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Weight trend over a series: mean of the most recent 3 points against
    /// the mean of the earliest 3 (the available subset when shorter), as a
    /// percentage change. Fewer than 2 points yields `Neutral`.
    pub fn weight_trend(&self, series: &[HealthMetric]) -> HealthTrend {
        let key = series_key(MetricType::Weight, series);
        if let Some(hit) = self.memo.lock().unwrap().get(&key) {
            return hit.clone();
        }

        let trend = compute_weight_trend(series);
        self.memo.lock().unwrap().insert(key, trend.clone());
        trend
    }

    /// Blood-pressure trend: first-3 vs last-3 means of systolic and
    /// diastolic separately. Either delta over 10 is `Concerning`, over 5 is
    /// `Notable`. Magnitude is the larger absolute delta.
    pub fn blood_pressure_trend(&self, series: &[HealthMetric]) -> HealthTrend {
        let key = series_key(MetricType::BloodPressure, series);
        if let Some(hit) = self.memo.lock().unwrap().get(&key) {
            return hit.clone();
        }

        let trend = compute_blood_pressure_trend(series);
        self.memo.lock().unwrap().insert(key, trend.clone());
        trend
    }

    #[cfg(test)]
    fn memo_len(&self) -> usize {
        self.memo.lock().unwrap().len()
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_weight_trend(series: &[HealthMetric]) -> HealthTrend {
    let values = sorted_scalars(series);
    if values.len() < 2 {
        return HealthTrend::neutral(MetricType::Weight);
    }

    let take = values.len().min(3);
    let recent_avg = mean(&values[values.len() - take..]);
    let past_avg = mean(&values[..take]);

    let change = if past_avg == 0.0 {
        0.0
    } else {
        (recent_avg - past_avg) / past_avg * 100.0
    };

    let trend = if change > 1.0 {
        TrendDirection::Increasing
    } else if change < -1.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    HealthTrend {
        metric_type: MetricType::Weight,
        trend,
        change_magnitude: change,
        explanation: format!("Weight {} by {:.1}% over the period", trend, change.abs()),
    }
}

fn compute_blood_pressure_trend(series: &[HealthMetric]) -> HealthTrend {
    let mut sorted: Vec<&HealthMetric> = series.iter().collect();
    sorted.sort_by_key(|m| m.timestamp);

    let pairs: Vec<(f64, f64)> = sorted
        .iter()
        .filter_map(|m| m.value.as_blood_pressure())
        .collect();
    if pairs.len() < 2 {
        return HealthTrend::neutral(MetricType::BloodPressure);
    }

    let systolic: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let diastolic: Vec<f64> = pairs.iter().map(|p| p.1).collect();

    let take = pairs.len().min(3);
    let sys_change = mean(&systolic[systolic.len() - take..]) - mean(&systolic[..take]);
    let dia_change = mean(&diastolic[diastolic.len() - take..]) - mean(&diastolic[..take]);

    let trend = if sys_change.abs() > 10.0 || dia_change.abs() > 10.0 {
        TrendDirection::Concerning
    } else if sys_change.abs() > 5.0 || dia_change.abs() > 5.0 {
        TrendDirection::Notable
    } else {
        TrendDirection::Stable
    };

    HealthTrend {
        metric_type: MetricType::BloodPressure,
        trend,
        change_magnitude: sys_change.abs().max(dia_change.abs()),
        explanation: format!(
            "BP trend: systolic {:+.1}, diastolic {:+.1}",
            sys_change, dia_change
        ),
    }
}

fn sorted_scalars(series: &[HealthMetric]) -> Vec<f64> {
    let mut sorted: Vec<&HealthMetric> = series.iter().collect();
    sorted.sort_by_key(|m| m.timestamp);
    sorted
        .iter()
        .filter_map(|m| m.value.as_scalar())
        .collect()
}

fn series_key(metric_type: MetricType, series: &[HealthMetric]) -> u64 {
    let mut hasher = DefaultHasher::new();
    metric_type.hash(&mut hasher);
    for metric in series {
        metric.timestamp.timestamp_millis().hash(&mut hasher);
        match &metric.value {
            MetricValue::Scalar(v) => v.to_bits().hash(&mut hasher),
            MetricValue::BloodPressure {
                systolic,
                diastolic,
            } => {
                systolic.to_bits().hash(&mut hasher);
                diastolic.to_bits().hash(&mut hasher);
            }
            MetricValue::SleepState(s) => s.hash(&mut hasher),
        }
    }
    hasher.finish()
}
