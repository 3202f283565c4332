//! Per-metric forecasting
//!
//! Keeps a bounded sample history per metric, fits a [`ForecastModel`] from
//! the most recent window on demand and turns models into point forecasts.

use super::model::ForecastModel;
use crate::history::BoundedHistory;
use crate::models::Forecast;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Probability at or above which a forecast carries preventive advice
pub const ADVICE_PROBABILITY: f64 = 0.5;

/// Forecaster sizing
#[derive(Debug, Clone)]
pub struct ForecasterConfig {
    /// Samples retained per metric
    pub history_capacity: usize,
    /// Samples needed before `retrain` fits a model
    pub min_training_samples: usize,
    /// Most recent samples used by `retrain`
    pub training_window: usize,
    /// Capacity of the forecast ring buffer
    pub forecast_capacity: usize,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            history_capacity: 8640,
            min_training_samples: 10,
            training_window: 360,
            forecast_capacity: 1000,
        }
    }
}

/// Forecasts future metric values from recorded history
pub struct Forecaster {
    config: ForecasterConfig,
    models: DashMap<String, ForecastModel>,
    samples: DashMap<String, VecDeque<f64>>,
    forecasts: BoundedHistory<Forecast>,
}

impl Forecaster {
    pub fn new(config: ForecasterConfig) -> Self {
        let forecasts = BoundedHistory::new(config.forecast_capacity);
        Self {
            config,
            models: DashMap::new(),
            samples: DashMap::new(),
            forecasts,
        }
    }

    /// Fit a model for `metric` from an explicit history. Empty or
    /// non-finite histories leave the current model untouched.
    pub fn train(&self, metric: &str, history: &[f64]) -> bool {
        match ForecastModel::fit(history) {
            Some(model) => {
                debug!(
                    metric = %metric,
                    samples = model.samples,
                    mean = model.mean,
                    trend = model.trend,
                    "Forecast model trained"
                );
                self.models.insert(metric.to_string(), model);
                true
            }
            None => false,
        }
    }

    /// Append a sample to the metric's history
    pub fn record(&self, metric: &str, value: f64) {
        if !value.is_finite() {
            return;
        }
        let capacity = self.config.history_capacity.max(1);
        let mut history = self
            .samples
            .entry(metric.to_string())
            .or_insert_with(VecDeque::new);
        while history.len() >= capacity {
            history.pop_front();
        }
        history.push_back(value);
    }

    /// Retrain from the recorded history once enough samples exist
    pub fn retrain(&self, metric: &str) -> bool {
        let window: Vec<f64> = {
            let Some(history) = self.samples.get(metric) else {
                return false;
            };
            if history.len() < self.config.min_training_samples.max(1) {
                return false;
            }
            let skip = history.len().saturating_sub(self.config.training_window);
            history.iter().skip(skip).copied().collect()
        };
        self.train(metric, &window)
    }

    /// Forecast `metric` at `horizon` from now
    ///
    /// An untrained metric yields an all-zero forecast that is not cached.
    pub fn predict(&self, metric: &str, horizon: Duration) -> Forecast {
        let horizon_at = horizon_from_now(horizon);

        let Some(model) = self.models.get(metric).map(|m| m.clone()) else {
            return Forecast {
                metric: metric.to_string(),
                horizon: horizon_at,
                predicted_value: 0.0,
                confidence: 0.0,
                anomaly_probability: 0.0,
                suggested_action: None,
            };
        };

        let predicted_value = model.predict_value(horizon.as_secs_f64());
        let anomaly_probability = model.anomaly_probability(predicted_value);
        let suggested_action = (anomaly_probability >= ADVICE_PROBABILITY)
            .then(|| advice_for(metric).to_string());

        let forecast = Forecast {
            metric: metric.to_string(),
            horizon: horizon_at,
            predicted_value,
            confidence: model.confidence(),
            anomaly_probability,
            suggested_action,
        };
        self.forecasts.push(forecast.clone());
        forecast
    }

    /// Most recent `n` cached forecasts, oldest first
    pub fn recent_forecasts(&self, n: usize) -> Vec<Forecast> {
        self.forecasts.recent(n)
    }

    pub fn forecast_count(&self) -> usize {
        self.forecasts.len()
    }

    pub fn model(&self, metric: &str) -> Option<ForecastModel> {
        self.models.get(metric).map(|m| m.clone())
    }

    pub fn is_trained(&self, metric: &str) -> bool {
        self.models.contains_key(metric)
    }

    /// Number of recorded samples for a metric
    pub fn sample_count(&self, metric: &str) -> usize {
        self.samples.get(metric).map(|h| h.len()).unwrap_or(0)
    }

    pub fn trained_metrics(&self) -> Vec<String> {
        let mut metrics: Vec<_> = self.models.iter().map(|r| r.key().clone()).collect();
        metrics.sort();
        metrics
    }
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new(ForecasterConfig::default())
    }
}

/// Wall-clock instant `horizon` from now, saturating at the latest representable time
fn horizon_from_now(horizon: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(horizon)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Preventive advice for a metric that is forecast to misbehave
pub fn advice_for(metric: &str) -> &'static str {
    match metric {
        "cpu_usage" => "Consider scaling horizontally or optimizing compute-intensive operations",
        "memory_usage" => "Consider increasing memory allocation or identifying memory leaks",
        "disk_usage" => "Consider cleaning up old files or expanding storage capacity",
        "error_rate" => "Review recent deployments and check service dependencies",
        "latency" => "Consider caching, query optimization, or infrastructure scaling",
        _ => "Investigate anomaly and consider preventive measures",
    }
}
