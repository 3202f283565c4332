//! Read-only query surface
//!
//! Every query reads snapshots of shared state and never blocks a cycle for
//! longer than one buffer copy.

use super::Orchestrator;
use crate::config::MonitoringMode;
use crate::models::{ActionRecord, AnomalyRecord, Forecast, Severity};
use crate::router::{entity_metric, Intent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Metrics predicted when a query names none
pub const DEFAULT_PREDICTION_METRICS: [&str; 2] = ["cpu_usage", "memory_usage"];

/// Records returned by `investigate`
pub const INVESTIGATION_DEPTH: usize = 5;

pub const NO_ANOMALIES_HYPOTHESIS: &str =
    "No recent anomalies detected. System appears to be operating normally.";
pub const MINOR_ANOMALIES_HYPOTHESIS: &str = "Minor anomalies detected. Monitoring for patterns.";
pub const CLARIFICATION_MESSAGE: &str =
    "I understand you're asking about monitoring. Could you be more specific?";

/// Current state of the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub running: bool,
    pub mode: MonitoringMode,
    pub health_score: u32,
    /// Timestamp of the latest observation, if any
    pub observed_at: Option<DateTime<Utc>>,
    pub metrics: BTreeMap<String, f64>,
    pub anomalies: Vec<AnomalyRecord>,
    pub active_cycles: usize,
    pub baselines: usize,
    pub anomaly_history: usize,
    pub action_history: usize,
}

/// Result of an investigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investigation {
    pub entities: Vec<String>,
    pub recent_anomalies: Vec<AnomalyRecord>,
    pub recent_actions: Vec<ActionRecord>,
    pub root_cause_hypothesis: String,
}

/// Payload of a routed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Status(StatusReport),
    Investigation(Investigation),
    // Before `Predictions` so an empty map decodes as metrics
    Metrics(BTreeMap<String, f64>),
    Predictions(BTreeMap<String, Forecast>),
    Message { message: String },
}

/// Response to a free-text query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub intent: Intent,
    pub entities: Vec<String>,
    pub result: QueryResult,
}

/// Conversation history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub text: String,
    pub intent: Intent,
    pub entities: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Hypothesis derived from the severity mix of the retained anomalies
pub fn root_cause_hypothesis(anomalies: &[AnomalyRecord]) -> String {
    if anomalies.is_empty() {
        return NO_ANOMALIES_HYPOTHESIS.to_string();
    }

    let high: BTreeSet<&str> = anomalies
        .iter()
        .filter(|a| a.severity == Severity::High)
        .map(|a| a.metric.as_str())
        .collect();

    if high.is_empty() {
        return MINOR_ANOMALIES_HYPOTHESIS.to_string();
    }

    format!(
        "High severity anomalies detected in: {}. Likely cause: Resource exhaustion or service degradation.",
        high.into_iter().collect::<Vec<_>>().join(", ")
    )
}

impl Orchestrator {
    /// Latest observation and analysis
    pub fn status(&self) -> StatusReport {
        let latest = self.state.latest();
        let (health_score, observed_at, metrics, anomalies) = match latest.as_deref() {
            Some(snapshot) => (
                snapshot.analysis.health_score,
                Some(snapshot.sample.timestamp),
                snapshot.sample.values.clone(),
                snapshot.analysis.anomalies.clone(),
            ),
            None => (100, None, BTreeMap::new(), Vec::new()),
        };

        StatusReport {
            running: self.is_running(),
            mode: self.state.config.mode,
            health_score,
            observed_at,
            metrics,
            anomalies,
            active_cycles: if self.is_running() { self.cycle_count() } else { 0 },
            baselines: self.state.detector.baselines().len(),
            anomaly_history: self.state.anomalies.len(),
            action_history: self.state.actions.len(),
        }
    }

    /// Latest sample values, keeping metrics whose name contains any of
    /// `entities` or that an entity group maps to
    pub fn metrics<S: AsRef<str>>(&self, entities: &[S]) -> BTreeMap<String, f64> {
        let Some(snapshot) = self.state.latest() else {
            return BTreeMap::new();
        };

        snapshot
            .sample
            .values
            .iter()
            .filter(|(metric, _)| {
                entities.is_empty()
                    || entities.iter().map(|e| e.as_ref()).any(|e| {
                        metric.contains(e) || entity_metric(e) == Some(metric.as_str())
                    })
            })
            .map(|(metric, value)| (metric.clone(), *value))
            .collect()
    }

    /// Forecasts for the named metrics or entity groups
    pub fn predictions<S: AsRef<str>>(&self, names: &[S]) -> BTreeMap<String, Forecast> {
        let horizon = Duration::from_secs(self.state.config.prediction_horizon_secs);
        let names: Vec<&str> = if names.is_empty() {
            DEFAULT_PREDICTION_METRICS.to_vec()
        } else {
            names.iter().map(|n| n.as_ref()).collect()
        };

        names
            .into_iter()
            .map(|name| {
                let metric = entity_metric(name).unwrap_or(name);
                (name.to_string(), self.state.forecaster.predict(metric, horizon))
            })
            .collect()
    }

    /// Recent anomalies and actions with a coarse root-cause hypothesis
    pub fn investigate<S: AsRef<str>>(&self, entities: &[S]) -> Investigation {
        let retained = self.state.anomalies.snapshot();
        let skip = retained.len().saturating_sub(INVESTIGATION_DEPTH);

        Investigation {
            entities: entities.iter().map(|e| e.as_ref().to_string()).collect(),
            root_cause_hypothesis: root_cause_hypothesis(&retained),
            recent_anomalies: retained[skip..].to_vec(),
            recent_actions: self.state.actions.recent(INVESTIGATION_DEPTH),
        }
    }

    /// Classify free text and dispatch to the matching query
    pub fn query(&self, text: &str) -> QueryResponse {
        let classification = self.router.classify(text);
        let timestamp = Utc::now();
        self.state.conversations.push(QueryRecord {
            text: text.to_string(),
            intent: classification.intent,
            entities: classification.entities.clone(),
            timestamp,
        });

        let entities = &classification.entities;
        let result = match classification.intent {
            Intent::Status => QueryResult::Status(self.status()),
            Intent::Metrics => QueryResult::Metrics(self.metrics(entities)),
            Intent::Predict => QueryResult::Predictions(self.predictions(entities)),
            Intent::Investigate => QueryResult::Investigation(self.investigate(entities)),
            _ => QueryResult::Message {
                message: CLARIFICATION_MESSAGE.to_string(),
            },
        };

        QueryResponse {
            query: text.to_string(),
            timestamp,
            intent: classification.intent,
            entities: classification.entities,
            result,
        }
    }

    /// Most recent `n` queries, oldest first
    pub fn conversation(&self, n: usize) -> Vec<QueryRecord> {
        self.state.conversations.recent(n)
    }
}
