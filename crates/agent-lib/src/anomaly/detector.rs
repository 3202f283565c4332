//! Baseline deviation detection
//!
//! Scores each sample against its metric's baseline, emits an anomaly when
//! the score exceeds the detection threshold, and then folds the sample into
//! the baseline.

use super::baseline::{Baseline, BaselineStore, SpreadMode};
use crate::models::{AnomalyRecord, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Deviation score above which a sample is anomalous
    pub detection_threshold: f64,
    /// Deviation score above which an anomaly is high severity
    pub high_severity_threshold: f64,
    /// EMA smoothing factor, in (0, 1)
    pub smoothing_alpha: f64,
    /// Spread assigned to a baseline on first observation
    pub default_spread: f64,
    pub spread_mode: SpreadMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 2.0,
            high_severity_threshold: 3.0,
            smoothing_alpha: 0.1,
            default_spread: 10.0,
            spread_mode: SpreadMode::Fixed,
        }
    }
}

/// Anomaly detector over a shared baseline store
pub struct AnomalyDetector {
    config: DetectorConfig,
    baselines: Arc<BaselineStore>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let baselines = Arc::new(BaselineStore::new(
            config.smoothing_alpha,
            config.default_spread,
            config.spread_mode,
        ));
        Self { config, baselines }
    }

    /// Observe a sample now
    pub fn observe(&self, metric: &str, value: f64) -> Option<AnomalyRecord> {
        self.observe_at(metric, value, Utc::now())
    }

    /// Observe a sample taken at `timestamp`
    ///
    /// The first observation of a metric only seeds its baseline and never
    /// yields an anomaly. Non-finite values are ignored.
    pub fn observe_at(
        &self,
        metric: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<AnomalyRecord> {
        if !value.is_finite() {
            debug!(metric = %metric, value = value, "Ignoring non-finite sample");
            return None;
        }

        let baseline = self.baselines.observe(metric, value)?;
        self.score(metric, value, &baseline, timestamp)
    }

    /// Score a value against a baseline without touching state
    pub fn score(
        &self,
        metric: &str,
        value: f64,
        baseline: &Baseline,
        timestamp: DateTime<Utc>,
    ) -> Option<AnomalyRecord> {
        let deviation = baseline.deviation(value);
        if deviation <= self.config.detection_threshold {
            return None;
        }

        Some(AnomalyRecord {
            metric: metric.to_string(),
            value,
            expected: baseline.mean,
            deviation,
            severity: self.severity(deviation),
            detected_at: timestamp,
        })
    }

    fn severity(&self, deviation: f64) -> Severity {
        if deviation > self.config.high_severity_threshold {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Read-only handle to the baselines
    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    /// Current baseline for a metric
    pub fn baseline(&self, metric: &str) -> Option<Baseline> {
        self.baselines.get(metric)
    }

    /// Prime a metric with a known baseline
    pub fn prime(&self, metric: impl Into<String>, baseline: Baseline) {
        self.baselines.insert(metric, baseline);
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
