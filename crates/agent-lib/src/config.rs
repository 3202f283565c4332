//! Monitoring configuration
//!
//! Every field has a default so partial config files and environment
//! overrides deserialize cleanly. `validate` catches structural problems
//! that must stop the process at startup.

use crate::anomaly::DetectorConfig;
use crate::remediation::{default_policies, RemediationPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Metrics the forecast cycle watches when none are configured
pub const DEFAULT_WATCH_LIST: [&str; 3] = ["cpu_usage", "memory_usage", "error_rate"];

/// Longest forecast horizon accepted: one year
pub const MAX_PREDICTION_HORIZON_SECS: u64 = 365 * 24 * 3600;

/// Configuration errors that are fatal at startup
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("smoothing alpha must be in (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("default spread must be a positive finite number, got {0}")]
    InvalidSpread(f64),

    #[error("{name} must be a positive finite number, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("anomaly probability threshold must be in [0, 1], got {0}")]
    InvalidProbabilityThreshold(f64),

    #[error("prediction horizon must be between 1 and {max} seconds, got {value}")]
    InvalidHorizon { value: u64, max: u64 },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("remediation policy #{index} has an empty metric name")]
    EmptyPolicyMetric { index: usize },

    #[error("remediation policy for '{metric}' has an empty action")]
    EmptyPolicyAction { metric: String },

    #[error("remediation policy for '{metric}' has a non-finite threshold")]
    NonFinitePolicyThreshold { metric: String },

    #[error("duplicate remediation policy for '{0}'")]
    DuplicatePolicy(String),
}

/// Operating mode of the monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringMode {
    #[default]
    Development,
    Production,
    Testing,
}

impl std::fmt::Display for MonitoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitoringMode::Development => write!(f, "development"),
            MonitoringMode::Production => write!(f, "production"),
            MonitoringMode::Testing => write!(f, "testing"),
        }
    }
}

/// Top-level monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub mode: MonitoringMode,
    pub enable_voice: bool,
    pub enable_predictions: bool,
    pub enable_auto_remediation: bool,
    /// Forecast horizon in seconds
    pub prediction_horizon_secs: u64,
    /// Forecast anomaly probability above which an alert is raised
    pub anomaly_probability_threshold: f64,
    pub detector: DetectorConfig,
    pub detection_interval_secs: u64,
    pub forecast_interval_secs: u64,
    pub voice_interval_secs: u64,
    /// Metrics predicted on every forecast cycle
    pub watch_list: Vec<String>,
    /// Capacity of the anomaly, action, outcome and conversation histories
    pub history_capacity: usize,
    /// Capacity of the forecast ring buffer
    pub forecast_cache_capacity: usize,
    /// Samples retained per metric for retraining
    pub sample_history_capacity: usize,
    /// Minimum samples before a metric is (re)trained
    pub min_training_samples: usize,
    /// Most recent samples used when retraining
    pub training_window: usize,
    /// Buffer size of the outbound event channel
    pub event_buffer: usize,
    pub policies: Vec<RemediationPolicy>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: MonitoringMode::Development,
            enable_voice: false,
            enable_predictions: true,
            enable_auto_remediation: false,
            prediction_horizon_secs: 3600,
            anomaly_probability_threshold: 0.95,
            detector: DetectorConfig::default(),
            detection_interval_secs: 10,
            forecast_interval_secs: 60,
            voice_interval_secs: 1,
            watch_list: DEFAULT_WATCH_LIST.iter().map(|m| m.to_string()).collect(),
            history_capacity: 100,
            forecast_cache_capacity: 1000,
            sample_history_capacity: 8640, // 24 hours at 10s
            min_training_samples: 10,
            training_window: 360, // 1 hour at 10s
            event_buffer: 256,
            policies: default_policies(),
        }
    }
}

impl MonitorConfig {
    pub fn detection_interval(&self) -> Duration {
        Duration::from_secs(self.detection_interval_secs)
    }

    pub fn forecast_interval(&self) -> Duration {
        Duration::from_secs(self.forecast_interval_secs)
    }

    pub fn voice_interval(&self) -> Duration {
        Duration::from_secs(self.voice_interval_secs)
    }

    /// Check the configuration for structural errors
    pub fn validate(&self) -> Result<(), ConfigError> {
        let detector = &self.detector;
        if !(detector.smoothing_alpha > 0.0 && detector.smoothing_alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(detector.smoothing_alpha));
        }
        if !(detector.default_spread.is_finite() && detector.default_spread > 0.0) {
            return Err(ConfigError::InvalidSpread(detector.default_spread));
        }
        for (name, value) in [
            ("detection_threshold", detector.detection_threshold),
            ("high_severity_threshold", detector.high_severity_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.anomaly_probability_threshold) {
            return Err(ConfigError::InvalidProbabilityThreshold(
                self.anomaly_probability_threshold,
            ));
        }

        if !(1..=MAX_PREDICTION_HORIZON_SECS).contains(&self.prediction_horizon_secs) {
            return Err(ConfigError::InvalidHorizon {
                value: self.prediction_horizon_secs,
                max: MAX_PREDICTION_HORIZON_SECS,
            });
        }

        for (name, value) in [
            ("detection_interval_secs", self.detection_interval_secs as usize),
            ("forecast_interval_secs", self.forecast_interval_secs as usize),
            ("voice_interval_secs", self.voice_interval_secs as usize),
            ("history_capacity", self.history_capacity),
            ("forecast_cache_capacity", self.forecast_cache_capacity),
            ("sample_history_capacity", self.sample_history_capacity),
            ("training_window", self.training_window),
            ("event_buffer", self.event_buffer),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue(name));
            }
        }

        let mut seen = HashSet::new();
        for (index, policy) in self.policies.iter().enumerate() {
            if policy.metric.trim().is_empty() {
                return Err(ConfigError::EmptyPolicyMetric { index });
            }
            if policy.action.trim().is_empty() {
                return Err(ConfigError::EmptyPolicyAction {
                    metric: policy.metric.clone(),
                });
            }
            if !policy.threshold.is_finite() {
                return Err(ConfigError::NonFinitePolicyThreshold {
                    metric: policy.metric.clone(),
                });
            }
            if !seen.insert(policy.metric.as_str()) {
                return Err(ConfigError::DuplicatePolicy(policy.metric.clone()));
            }
        }

        Ok(())
    }
}
