//! Health Summary Aggregation
//!
//! Composes per-metric analyses into one [`HealthSummary`]. The aggregator
//! caches its own output: a summary younger than the configured TTL is
//! served instead of being recomputed.

use super::trend::{TrendAnalyzer, TrendDirection};
use super::{mean, population_stddev};
use crate::metrics::HealthMetric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of all metric families for one cycle.
///
/// An empty input series omits that family rather than erroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<BloodPressureSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<HeartRateSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep: Option<SleepSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSummary {
    pub trend: TrendDirection,
    pub change_percent: f64,
    pub analysis: String,
    pub latest: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureSummary {
    pub trend: TrendDirection,
    pub change_magnitude: f64,
    pub analysis: String,
    /// Most recent `(systolic, diastolic)` reading.
    pub latest: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSummary {
    pub latest: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation of the readings; 0 for fewer than 2.
    pub variability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSummary {
    pub average_duration_hours: f64,
    /// Most recent sleep-state label.
    pub quality: String,
    /// Standard deviation of per-entry durations.
    pub consistency: f64,
}

/// Builds health summaries and serves cached ones while they are fresh.
pub struct Aggregator {
    analyzer: TrendAnalyzer,
    cache_ttl: Duration,
    cached: RwLock<Option<HealthSummary>>,
}

impl Aggregator {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            analyzer: TrendAnalyzer::new(),
            cache_ttl,
            cached: RwLock::new(None),
        }
    }

    /// Generate a summary, or serve the cached one if it is younger than
    /// the configured TTL.
    pub async fn generate_summary(
        &self,
        weight: &[HealthMetric],
        blood_pressure: &[HealthMetric],
        heart_rate: &[HealthMetric],
        sleep: &[HealthMetric],
    ) -> HealthSummary {
        {
            let cached = self.cached.read().await;
            if let Some(summary) = cached.as_ref() {
                let age = Utc::now().signed_duration_since(summary.generated_at);
                if age.num_seconds() >= 0 && (age.num_seconds() as u64) < self.cache_ttl.as_secs()
                {
                    tracing::debug!(age_secs = age.num_seconds(), "serving cached health summary");
                    return summary.clone();
                }
            }
        }

        let summary = self.build_summary(weight, blood_pressure, heart_rate, sleep);
        *self.cached.write().await = Some(summary.clone());
        summary
    }

    /// The most recently generated summary, if any.
    pub async fn cached_summary(&self) -> Option<HealthSummary> {
        self.cached.read().await.clone()
    }

    fn build_summary(
        &self,
        weight: &[HealthMetric],
        blood_pressure: &[HealthMetric],
        heart_rate: &[HealthMetric],
        sleep: &[HealthMetric],
    ) -> HealthSummary {
        let weight_summary = if weight.is_empty() {
            None
        } else {
            let trend = self.analyzer.weight_trend(weight);
            Some(WeightSummary {
                trend: trend.trend,
                change_percent: trend.change_magnitude,
                analysis: trend.explanation,
                latest: latest_metric(weight).and_then(|m| m.value.as_scalar()),
            })
        };

        let bp_summary = if blood_pressure.is_empty() {
            None
        } else {
            let trend = self.analyzer.blood_pressure_trend(blood_pressure);
            Some(BloodPressureSummary {
                trend: trend.trend,
                change_magnitude: trend.change_magnitude,
                analysis: trend.explanation,
                latest: latest_metric(blood_pressure).and_then(|m| m.value.as_blood_pressure()),
            })
        };

        let hr_summary = build_heart_rate_summary(heart_rate);
        let sleep_summary = build_sleep_summary(sleep);

        HealthSummary {
            generated_at: Utc::now(),
            weight: weight_summary,
            blood_pressure: bp_summary,
            heart_rate: hr_summary,
            sleep: sleep_summary,
        }
    }
}

fn build_heart_rate_summary(series: &[HealthMetric]) -> Option<HeartRateSummary> {
    let values: Vec<f64> = series.iter().filter_map(|m| m.value.as_scalar()).collect();
    if values.is_empty() {
        return None;
    }

    let latest = latest_metric(series).and_then(|m| m.value.as_scalar())?;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    Some(HeartRateSummary {
        latest,
        min,
        max,
        variability: population_stddev(&values),
    })
}

fn build_sleep_summary(series: &[HealthMetric]) -> Option<SleepSummary> {
    if series.is_empty() {
        return None;
    }

    let durations: Vec<f64> = series.iter().filter_map(sleep_interval_hours).collect();
    if durations.is_empty() {
        tracing::warn!("sleep series had no usable start/end intervals");
        return None;
    }

    let quality = latest_metric(series)
        .and_then(|m| m.value.as_sleep_state())
        .unwrap_or("unknown")
        .to_string();

    Some(SleepSummary {
        average_duration_hours: mean(&durations),
        quality,
        consistency: population_stddev(&durations),
    })
}

/// Duration of one sleep entry in hours, from its `extra.start`/`extra.end`.
fn sleep_interval_hours(metric: &HealthMetric) -> Option<f64> {
    let start = metric.extra.get("start")?.as_str()?;
    let end = metric.extra.get("end")?.as_str()?;

    let start = DateTime::parse_from_rfc3339(start).ok()?;
    let end = DateTime::parse_from_rfc3339(end).ok()?;

    let seconds = end.signed_duration_since(start).num_seconds();
    if seconds < 0 {
        return None;
    }
    Some(seconds as f64 / 3600.0)
}

fn latest_metric(series: &[HealthMetric]) -> Option<&HealthMetric> {
    series.iter().max_by_key(|m| m.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricType, MetricValue};
    use chrono::TimeZone;
    use serde_json::json;

    fn hr_series(values: &[f64]) -> Vec<HealthMetric> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                HealthMetric::new(
                    MetricValue::Scalar(v),
                    Utc.with_ymd_and_hms(2026, 8, 25, 6 + i as u32, 0, 0).unwrap(),
                    MetricType::HeartRate,
                    "bpm",
                )
            })
            .collect()
    }

    fn sleep_entry(day: u32, start_hour: u32, hours: i64, state: &str) -> HealthMetric {
        let start = Utc
            .with_ymd_and_hms(2026, 8, day, start_hour, 0, 0)
            .unwrap();
        let end = start + chrono::Duration::hours(hours);
        HealthMetric::new(
            MetricValue::SleepState(state.to_string()),
            start,
            MetricType::Sleep,
            "state",
        )
        .with_extra("start", json!(start.to_rfc3339()))
        .with_extra("end", json!(end.to_rfc3339()))
    }

    #[tokio::test]
    async fn empty_series_omit_their_families() {
        let aggregator = Aggregator::new(Duration::from_secs(3600));
        let hr = hr_series(&[60.0, 62.0]);

        let summary = aggregator.generate_summary(&[], &[], &hr, &[]).await;

        assert!(summary.weight.is_none());
        assert!(summary.blood_pressure.is_none());
        assert!(summary.heart_rate.is_some());
        assert!(summary.sleep.is_none());
    }

    #[tokio::test]
    async fn heart_rate_reports_extremes_and_variability() {
        let aggregator = Aggregator::new(Duration::from_secs(3600));
        let hr = hr_series(&[58.0, 72.0, 105.0]);

        let summary = aggregator.generate_summary(&[], &[], &hr, &[]).await;
        let hr = summary.heart_rate.unwrap();

        assert_eq!(hr.min, 58.0);
        assert_eq!(hr.max, 105.0);
        assert_eq!(hr.latest, 105.0);
        assert!(hr.variability > 0.0);
    }

    #[tokio::test]
    async fn single_heart_rate_reading_has_zero_variability() {
        let aggregator = Aggregator::new(Duration::from_secs(3600));
        let hr = hr_series(&[64.0]);

        let summary = aggregator.generate_summary(&[], &[], &hr, &[]).await;

        assert_eq!(summary.heart_rate.unwrap().variability, 0.0);
    }

    #[tokio::test]
    async fn sleep_durations_come_from_start_end_extras() {
        let aggregator = Aggregator::new(Duration::from_secs(3600));
        let sleep = vec![
            sleep_entry(23, 23, 8, "deep"),
            sleep_entry(24, 23, 6, "light"),
        ];

        let summary = aggregator.generate_summary(&[], &[], &[], &sleep).await;
        let sleep = summary.sleep.unwrap();

        assert!((sleep.average_duration_hours - 7.0).abs() < 1e-9);
        assert_eq!(sleep.quality, "light");
        assert!((sleep.consistency - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fresh_summary_is_served_from_cache() {
        let aggregator = Aggregator::new(Duration::from_secs(3600));
        let hr = hr_series(&[60.0, 61.0]);

        let first = aggregator.generate_summary(&[], &[], &hr, &[]).await;
        // second call with different data still serves the cached summary
        let second = aggregator.generate_summary(&[], &[], &[], &[]).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn zero_ttl_disables_the_summary_cache() {
        let aggregator = Aggregator::new(Duration::ZERO);
        let hr = hr_series(&[60.0, 61.0]);

        let first = aggregator.generate_summary(&[], &[], &hr, &[]).await;
        let second = aggregator.generate_summary(&[], &[], &[], &[]).await;

        assert!(first.heart_rate.is_some());
        assert!(second.heart_rate.is_none());
    }
}
