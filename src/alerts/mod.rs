//! Alert Derivation & Diffing
//!
//! Derives a de-duplicated alert set from a health summary and compares it
//! against the previous set. Notification fires only when the ordered set
//! actually changed, so a persisting condition never re-notifies while any
//! change in alert composition reacts immediately.

use crate::analysis::{HealthSummary, TrendDirection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert severity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// One derived alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Derives alerts from a summary and diffs consecutive alert sets.
pub struct AlertEngine;

impl AlertEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the rule table in fixed order; all matching rules fire.
    pub fn derive_alerts(&self, summary: &HealthSummary) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(bp) = &summary.blood_pressure {
            if bp.trend == TrendDirection::Concerning {
                alerts.push(Alert::warning(format!(
                    "concerning blood pressure trend: {}",
                    bp.analysis
                )));
            }
        }

        if let Some(hr) = &summary.heart_rate {
            if hr.max > 100.0 {
                alerts.push(Alert::warning(format!(
                    "high heart rate detected: {:.0} bpm",
                    hr.max
                )));
            } else if hr.variability > 20.0 {
                alerts.push(Alert::info(format!(
                    "high heart rate variability: {:.1}",
                    hr.variability
                )));
            }
        }

        if let Some(sleep) = &summary.sleep {
            if sleep.average_duration_hours < 6.0 {
                alerts.push(Alert::warning(format!(
                    "low sleep duration: {:.1} hours",
                    sleep.average_duration_hours
                )));
            }
            if sleep.consistency > 2.0 {
                alerts.push(Alert::info("inconsistent sleep schedule detected"));
            }
        }

        alerts
    }

    /// Whether the new ordered alert set differs from the previous one.
    /// Order and content both matter.
    pub fn changed(&self, previous: &[Alert], new: &[Alert]) -> bool {
        previous != new
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        BloodPressureSummary, HeartRateSummary, SleepSummary, TrendDirection,
    };
    use chrono::Utc;

    fn empty_summary() -> HealthSummary {
        HealthSummary {
            generated_at: Utc::now(),
            weight: None,
            blood_pressure: None,
            heart_rate: None,
            sleep: None,
        }
    }

    fn hr(max: f64, variability: f64) -> HeartRateSummary {
        HeartRateSummary {
            latest: max,
            min: 55.0,
            max,
            variability,
        }
    }

    #[test]
    fn high_heart_rate_yields_one_warning_with_the_max() {
        let engine = AlertEngine::new();
        let mut summary = empty_summary();
        summary.heart_rate = Some(hr(105.0, 30.0));

        let alerts = engine.derive_alerts(&summary);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert!(alerts[0].message.contains("105"));
    }

    #[test]
    fn variability_alert_only_fires_below_the_max_threshold() {
        let engine = AlertEngine::new();
        let mut summary = empty_summary();
        summary.heart_rate = Some(hr(92.0, 25.5));

        let alerts = engine.derive_alerts(&summary);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Info);
        assert!(alerts[0].message.contains("25.5"));
    }

    #[test]
    fn concerning_blood_pressure_fires_first() {
        let engine = AlertEngine::new();
        let mut summary = empty_summary();
        summary.blood_pressure = Some(BloodPressureSummary {
            trend: TrendDirection::Concerning,
            change_magnitude: 20.0,
            analysis: "BP trend: systolic +20.0, diastolic +0.0".to_string(),
            latest: Some((140.0, 80.0)),
        });
        summary.heart_rate = Some(hr(110.0, 5.0));

        let alerts = engine.derive_alerts(&summary);

        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].message.contains("blood pressure"));
        assert!(alerts[1].message.contains("heart rate"));
    }

    #[test]
    fn short_and_inconsistent_sleep_both_fire() {
        let engine = AlertEngine::new();
        let mut summary = empty_summary();
        summary.sleep = Some(SleepSummary {
            average_duration_hours: 5.2,
            quality: "light".to_string(),
            consistency: 2.8,
        });

        let alerts = engine.derive_alerts(&summary);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[1].severity, Severity::Info);
    }

    #[test]
    fn identical_sets_are_unchanged() {
        let engine = AlertEngine::new();
        let mut summary = empty_summary();
        summary.heart_rate = Some(hr(105.0, 10.0));

        let first = engine.derive_alerts(&summary);
        let second = engine.derive_alerts(&summary);

        assert!(!engine.changed(&first, &second));
    }

    #[test]
    fn reordering_counts_as_a_change() {
        let engine = AlertEngine::new();
        let a = Alert::warning("one");
        let b = Alert::info("two");

        assert!(engine.changed(&[a.clone(), b.clone()], &[b, a]));
    }

    #[test]
    fn healthy_summary_yields_no_alerts() {
        let engine = AlertEngine::new();
        let mut summary = empty_summary();
        summary.heart_rate = Some(hr(88.0, 8.0));
        summary.sleep = Some(SleepSummary {
            average_duration_hours: 7.6,
            quality: "deep".to_string(),
            consistency: 0.5,
        });

        assert!(engine.derive_alerts(&summary).is_empty());
    }
}
