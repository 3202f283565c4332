//! Detection cycle iteration: sample, detect, remediate, record

use super::state::{MonitorState, Snapshot};
use crate::health::components;
use crate::models::{ActionRequest, Analysis, MonitorEvent, Outcome};
use crate::telemetry::SampleSource;
use anyhow::Result;
use tracing::debug;

/// Run one detection iteration against `source`
pub(crate) async fn run_iteration(state: &MonitorState, source: &dyn SampleSource) -> Result<Analysis> {
    let sample = match source.sample().await {
        Ok(sample) => {
            state.health.record_success(components::TELEMETRY).await;
            sample
        }
        Err(e) => {
            state
                .health
                .record_failure(components::TELEMETRY, format!("{:#}", e))
                .await;
            return Err(e.context(format!("sampling from {} failed", source.name())));
        }
    };

    let mut anomalies = Vec::new();
    for (metric, value) in &sample.values {
        state.forecaster.record(metric, *value);
        if let Some(anomaly) = state.detector.observe_at(metric, *value, sample.timestamp) {
            state.logger.log_anomaly(&anomaly);
            state.metrics.inc_anomalies_detected(anomaly.severity);
            anomalies.push(anomaly);
        }
    }
    state.metrics.add_samples_observed(sample.len() as u64);
    state
        .metrics
        .set_baselines_tracked(state.detector.baselines().len() as i64);

    let analysis = Analysis::new(sample.timestamp, anomalies);
    state.set_latest(Snapshot {
        sample,
        analysis: analysis.clone(),
    });

    if analysis.anomalies.is_empty() {
        debug!(health_score = analysis.health_score, "No anomalies in sample");
        return Ok(analysis);
    }

    let actions = state.engine.evaluate(&analysis.anomalies);
    state.anomalies.extend(analysis.anomalies.iter().cloned());
    state.actions.extend(actions.iter().cloned());

    for action in &actions {
        state.logger.log_remediation(action);
        state.metrics.inc_actions_requested(action.is_auto_executed());
        if action.is_auto_executed() {
            state.emit(MonitorEvent::ActionRequested(ActionRequest::from(action)));
        }
    }

    // Learning hook
    state.outcomes.push(Outcome {
        timestamp: analysis.timestamp,
        anomaly_count: analysis.anomalies.len(),
        actions,
    });

    Ok(analysis)
}
