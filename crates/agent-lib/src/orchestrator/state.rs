//! State shared between the cycles and the query surface

use super::query::QueryRecord;
use crate::anomaly::AnomalyDetector;
use crate::config::MonitorConfig;
use crate::health::HealthRegistry;
use crate::history::BoundedHistory;
use crate::models::{ActionRecord, Analysis, AnomalyRecord, MonitorEvent, Outcome, SampleSet};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::predictor::Forecaster;
use crate::remediation::RemediationPolicyEngine;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Latest observation together with its analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub sample: SampleSet,
    pub analysis: Analysis,
}

/// Everything the cycles mutate and the queries read
///
/// Each structure synchronizes itself; no lock is held across an await.
pub(crate) struct MonitorState {
    pub config: MonitorConfig,
    pub detector: AnomalyDetector,
    pub engine: RemediationPolicyEngine,
    pub forecaster: Forecaster,
    latest: RwLock<Option<Arc<Snapshot>>>,
    pub anomalies: BoundedHistory<AnomalyRecord>,
    pub actions: BoundedHistory<ActionRecord>,
    pub outcomes: BoundedHistory<Outcome>,
    pub conversations: BoundedHistory<QueryRecord>,
    events: mpsc::Sender<MonitorEvent>,
    pub health: HealthRegistry,
    pub metrics: MonitorMetrics,
    pub logger: StructuredLogger,
}

impl MonitorState {
    pub fn new(
        config: MonitorConfig,
        events: mpsc::Sender<MonitorEvent>,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let capacity = config.history_capacity;
        Self {
            detector: AnomalyDetector::new(config.detector.clone()),
            engine: RemediationPolicyEngine::new(
                config.policies.clone(),
                config.enable_auto_remediation,
            ),
            forecaster: Forecaster::new(crate::predictor::ForecasterConfig {
                history_capacity: config.sample_history_capacity,
                min_training_samples: config.min_training_samples,
                training_window: config.training_window,
                forecast_capacity: config.forecast_cache_capacity,
            }),
            latest: RwLock::new(None),
            anomalies: BoundedHistory::new(capacity),
            actions: BoundedHistory::new(capacity),
            outcomes: BoundedHistory::new(capacity),
            conversations: BoundedHistory::new(capacity),
            events,
            health,
            metrics: MonitorMetrics::new(),
            logger,
            config,
        }
    }

    /// Replace the latest snapshot as one unit
    pub fn set_latest(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        match self.latest.write() {
            Ok(mut latest) => *latest = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        match self.latest.read() {
            Ok(latest) => latest.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Hand an event to the outbound channel without waiting
    pub fn emit(&self, event: MonitorEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.metrics.inc_events_dropped();
                warn!(dropped = ?event, "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                self.metrics.inc_events_dropped();
                warn!(dropped = ?event, "Event channel closed, dropping event");
            }
        }
    }

    /// Record a failed iteration in logs, metrics and health
    pub async fn iteration_failed(&self, cycle: &str, error: &str) {
        self.logger.log_cycle_error(cycle, error);
        self.metrics.inc_cycle_errors(cycle);
        self.health.record_failure(cycle, error).await;
    }
}
