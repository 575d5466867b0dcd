//! Trend Analysis & Aggregation
//!
//! - [`TrendAnalyzer`]: directional trend + magnitude per metric family
//! - [`Aggregator`]: composes per-metric analyses into one [`HealthSummary`]

mod summary;
mod trend;

pub use summary::{
    Aggregator, BloodPressureSummary, HealthSummary, HeartRateSummary, SleepSummary,
    WeightSummary,
};
pub use trend::{HealthTrend, TrendAnalyzer, TrendDirection};

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for fewer than 2 points.
pub(crate) fn population_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn stddev_of_constant_series_is_zero() {
        assert_eq!(population_stddev(&[70.0, 70.0, 70.0]), 0.0);
    }

    #[test]
    fn stddev_matches_population_formula() {
        // variance of [2, 4, 4, 4, 5, 5, 7, 9] is 4
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_stddev(&values) - 2.0).abs() < 1e-12);
    }
}
