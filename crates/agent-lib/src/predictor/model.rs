//! Forecast model fitting
//!
//! A model is a handful of summary statistics over a sample window: mean,
//! population spread, least-squares trend per sample and a coarse seasonal
//! offset. Models are rebuilt from scratch on every training pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Samples needed before a seasonal offset is estimated (one day of hourly points)
pub const SEASONAL_WINDOW: usize = 24;

/// Fraction of the first window's spread used as the seasonal offset
const SEASONAL_FACTOR: f64 = 0.1;

/// Fitted statistics for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastModel {
    pub mean: f64,
    pub spread: f64,
    /// Least-squares slope of value against sample index
    pub trend: f64,
    pub seasonal_offset: f64,
    pub samples: usize,
    pub trained_at: DateTime<Utc>,
}

impl ForecastModel {
    /// Fit a model to an ordered history. Returns `None` for an empty or
    /// non-finite history.
    pub fn fit(history: &[f64]) -> Option<Self> {
        if history.is_empty() || history.iter().any(|v| !v.is_finite()) {
            return None;
        }

        Some(Self {
            mean: mean(history),
            spread: population_std_dev(history),
            trend: linear_regression_slope(history),
            seasonal_offset: seasonal_offset(history),
            samples: history.len(),
            trained_at: Utc::now(),
        })
    }

    /// Point prediction `horizon_secs` into the future
    pub fn predict_value(&self, horizon_secs: f64) -> f64 {
        self.mean + self.trend * (horizon_secs / 3600.0) + self.seasonal_offset
    }

    /// 1 - spread/|mean| clamped to [0, 1]; zero when the mean is zero
    pub fn confidence(&self) -> f64 {
        if self.mean.abs() < f64::EPSILON {
            return 0.0;
        }
        (1.0 - self.spread / self.mean.abs()).clamp(0.0, 1.0)
    }

    /// How far a predicted value sits from the mean, in units of three spreads
    pub fn anomaly_probability(&self, predicted: f64) -> f64 {
        if self.spread < f64::EPSILON {
            return 0.0;
        }
        ((predicted - self.mean).abs() / (3.0 * self.spread)).clamp(0.0, 1.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n)
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Calculate linear regression slope for trend detection
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Coarse seasonal offset: zero until a full window is available
fn seasonal_offset(values: &[f64]) -> f64 {
    if values.len() < SEASONAL_WINDOW {
        return 0.0;
    }
    population_std_dev(&values[..SEASONAL_WINDOW]) * SEASONAL_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_population_statistics() {
        let model = ForecastModel::fit(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((model.mean - 5.0).abs() < 1e-9);
        assert!((model.spread - 2.0).abs() < 1e-9);
        assert_eq!(model.samples, 8);
    }

    #[test]
    fn test_linear_regression_slope() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((linear_regression_slope(&values) - 1.0).abs() < 0.01);
        assert_eq!(linear_regression_slope(&[3.0]), 0.0);
        assert_eq!(linear_regression_slope(&[]), 0.0);
    }

    #[test]
    fn test_seasonal_offset_requires_full_window() {
        let short: Vec<f64> = (0..23).map(|i| (i % 5) as f64).collect();
        assert_eq!(ForecastModel::fit(&short).unwrap().seasonal_offset, 0.0);

        let long: Vec<f64> = (0..48).map(|i| (i % 5) as f64).collect();
        let model = ForecastModel::fit(&long).unwrap();
        let expected = population_std_dev(&long[..24]) * 0.1;
        assert!((model.seasonal_offset - expected).abs() < 1e-12);
        assert!(model.seasonal_offset > 0.0);
    }

    #[test]
    fn test_empty_or_non_finite_history_rejected() {
        assert!(ForecastModel::fit(&[]).is_none());
        assert!(ForecastModel::fit(&[1.0, f64::NAN]).is_none());
    }

    #[test]
    fn test_predict_value_applies_hourly_trend() {
        let model = ForecastModel {
            mean: 50.0,
            spread: 5.0,
            trend: 2.0,
            seasonal_offset: 0.5,
            samples: 100,
            trained_at: Utc::now(),
        };
        assert!((model.predict_value(3600.0) - 52.5).abs() < 1e-9);
        assert!((model.predict_value(1800.0) - 51.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_mean_confidence_is_zero() {
        let model = ForecastModel::fit(&[-1.0, 1.0, -1.0, 1.0]).unwrap();
        assert_eq!(model.mean, 0.0);
        assert_eq!(model.confidence(), 0.0);
    }

    #[test]
    fn test_negative_mean_confidence_uses_magnitude() {
        let model = ForecastModel::fit(&[-48.0, -52.0, -48.0, -52.0]).unwrap();
        assert_eq!(model.mean, -50.0);
        assert_eq!(model.spread, 2.0);
        assert!((model.confidence() - 0.96).abs() < 1e-9);

        let positive = ForecastModel::fit(&[48.0, 52.0, 48.0, 52.0]).unwrap();
        assert!((positive.confidence() - model.confidence()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_spread_probability_is_zero() {
        let model = ForecastModel::fit(&[7.0; 30]).unwrap();
        assert_eq!(model.spread, 0.0);
        assert_eq!(model.anomaly_probability(100.0), 0.0);
        assert_eq!(model.confidence(), 1.0);
    }

    #[test]
    fn test_probability_is_clamped() {
        let model = ForecastModel::fit(&[9.0, 11.0]).unwrap();
        assert_eq!(model.anomaly_probability(1_000.0), 1.0);
        assert!((model.anomaly_probability(11.5) - 0.5).abs() < 1e-9);
    }
}
