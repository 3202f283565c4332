//! Core data models for the monitoring pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single metric observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// One pull from the telemetry provider: every metric sampled at the same instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl SampleSet {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert, handy for sources and tests
    pub fn with(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.values.insert(metric.into(), value);
        self
    }

    /// Iterate the set as individual samples
    pub fn samples(&self) -> impl Iterator<Item = MetricSample> + '_ {
        self.values.iter().map(move |(metric, value)| MetricSample {
            metric: metric.clone(),
            value: *value,
            timestamp: self.timestamp,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Anomaly severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// A sample that deviated from its baseline by more than the detection threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub metric: String,
    /// Observed value
    pub value: f64,
    /// Baseline mean at the time of observation
    pub expected: f64,
    /// |value - mean| / spread
    pub deviation: f64,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
}

/// How a remediation action was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    AutoExecuted,
    Suggested,
}

/// Outcome status of a remediation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Executed,
    Suggested,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Executed => write!(f, "executed"),
            ActionStatus::Suggested => write!(f, "suggested"),
        }
    }
}

/// A remediation decision produced by the policy engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub metric: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub mode: ExecutionMode,
    pub status: ActionStatus,
}

impl ActionRecord {
    pub fn is_auto_executed(&self) -> bool {
        self.mode == ExecutionMode::AutoExecuted
    }
}

/// Point forecast for a metric at a future horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub metric: String,
    /// Wall-clock instant the forecast refers to
    pub horizon: DateTime<Utc>,
    pub predicted_value: f64,
    pub confidence: f64,
    pub anomaly_probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Result of analyzing one sample set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub timestamp: DateTime<Utc>,
    pub anomalies: Vec<AnomalyRecord>,
    pub health_score: u32,
}

impl Analysis {
    pub fn new(timestamp: DateTime<Utc>, anomalies: Vec<AnomalyRecord>) -> Self {
        let penalty = (anomalies.len() as u32).saturating_mul(10);
        Self {
            timestamp,
            health_score: 100u32.saturating_sub(penalty),
            anomalies,
        }
    }
}

/// What one detection iteration led to, kept for later inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub timestamp: DateTime<Utc>,
    pub anomaly_count: usize,
    pub actions: Vec<ActionRecord>,
}

/// Request for an external executor to carry out an auto-executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub metric: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ActionRecord> for ActionRequest {
    fn from(record: &ActionRecord) -> Self {
        Self {
            metric: record.metric.clone(),
            action: record.action.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Warning raised when a forecast's anomaly probability crosses the alert threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAlert {
    pub metric: String,
    pub probability: f64,
    pub timestamp: DateTime<Utc>,
}

/// Events the core emits for external consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    ActionRequested(ActionRequest),
    ForecastAlert(ForecastAlert),
}
