//! Observability infrastructure for the monitor
//!
//! Provides:
//! - Prometheus metrics (cycle latency, samples, anomalies, actions, forecasts, errors)
//! - Structured JSON logging with tracing

use crate::models::{ActionRecord, AnomalyRecord, Severity};
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    cycle_latency_seconds: HistogramVec,
    cycle_errors: IntCounterVec,
    samples_observed: IntCounter,
    anomalies_detected: IntCounterVec,
    actions_requested: IntCounterVec,
    forecasts_generated: IntCounter,
    forecast_alerts: IntCounter,
    events_dropped: IntCounter,
    baselines_tracked: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram_vec!(
                "autopilot_cycle_latency_seconds",
                "Time spent in one iteration of a monitoring cycle",
                &["cycle"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycle_errors: register_int_counter_vec!(
                "autopilot_cycle_errors_total",
                "Cycle iterations that failed or panicked",
                &["cycle"]
            )
            .expect("Failed to register cycle_errors"),

            samples_observed: register_int_counter!(
                "autopilot_samples_observed_total",
                "Metric samples fed to the anomaly detector"
            )
            .expect("Failed to register samples_observed"),

            anomalies_detected: register_int_counter_vec!(
                "autopilot_anomalies_detected_total",
                "Anomalies detected, by severity",
                &["severity"]
            )
            .expect("Failed to register anomalies_detected"),

            actions_requested: register_int_counter_vec!(
                "autopilot_actions_requested_total",
                "Remediation actions produced by the policy engine",
                &["mode"]
            )
            .expect("Failed to register actions_requested"),

            forecasts_generated: register_int_counter!(
                "autopilot_forecasts_generated_total",
                "Forecasts generated by trained models"
            )
            .expect("Failed to register forecasts_generated"),

            forecast_alerts: register_int_counter!(
                "autopilot_forecast_alerts_total",
                "Forecasts whose anomaly probability crossed the alert threshold"
            )
            .expect("Failed to register forecast_alerts"),

            events_dropped: register_int_counter!(
                "autopilot_events_dropped_total",
                "Outbound events dropped because the channel was full or closed"
            )
            .expect("Failed to register events_dropped"),

            baselines_tracked: register_int_gauge!(
                "autopilot_baselines_tracked",
                "Number of metrics with a baseline"
            )
            .expect("Failed to register baselines_tracked"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a metrics handle (registers global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, cycle: &str, duration_secs: f64) {
        self.inner()
            .cycle_latency_seconds
            .with_label_values(&[cycle])
            .observe(duration_secs);
    }

    pub fn inc_cycle_errors(&self, cycle: &str) {
        self.inner().cycle_errors.with_label_values(&[cycle]).inc();
    }

    pub fn add_samples_observed(&self, count: u64) {
        self.inner().samples_observed.inc_by(count);
    }

    pub fn inc_anomalies_detected(&self, severity: Severity) {
        self.inner()
            .anomalies_detected
            .with_label_values(&[&severity.to_string()])
            .inc();
    }

    pub fn inc_actions_requested(&self, auto_executed: bool) {
        let mode = if auto_executed { "auto_executed" } else { "suggested" };
        self.inner().actions_requested.with_label_values(&[mode]).inc();
    }

    pub fn inc_forecasts_generated(&self) {
        self.inner().forecasts_generated.inc();
    }

    pub fn inc_forecast_alerts(&self) {
        self.inner().forecast_alerts.inc();
    }

    pub fn inc_events_dropped(&self) {
        self.inner().events_dropped.inc();
    }

    pub fn set_baselines_tracked(&self, count: i64) {
        self.inner().baselines_tracked.set(count);
    }

    /// Current value of the cycle error counter
    pub fn cycle_errors(&self, cycle: &str) -> u64 {
        self.inner().cycle_errors.with_label_values(&[cycle]).get()
    }
}

/// Structured logger for monitor events
///
/// Keeps the `event` field and message wording consistent so log queries
/// can key on them.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log an anomaly detection event
    pub fn log_anomaly(&self, anomaly: &AnomalyRecord) {
        match anomaly.severity {
            Severity::High => {
                warn!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    metric = %anomaly.metric,
                    value = anomaly.value,
                    expected = anomaly.expected,
                    deviation = anomaly.deviation,
                    severity = %anomaly.severity,
                    "High severity anomaly detected"
                );
            }
            _ => {
                info!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    metric = %anomaly.metric,
                    value = anomaly.value,
                    expected = anomaly.expected,
                    deviation = anomaly.deviation,
                    severity = %anomaly.severity,
                    "Anomaly detected"
                );
            }
        }
    }

    /// Log a remediation decision
    pub fn log_remediation(&self, action: &ActionRecord) {
        info!(
            event = "remediation_requested",
            instance = %self.instance,
            metric = %action.metric,
            action = %action.action,
            status = %action.status,
            auto_executed = action.is_auto_executed(),
            "Remediation action produced"
        );
    }

    /// Log a forecast whose anomaly probability crossed the alert threshold
    pub fn log_forecast_alert(&self, metric: &str, probability: f64, predicted_value: f64) {
        warn!(
            event = "forecast_alert",
            instance = %self.instance,
            metric = %metric,
            probability = probability,
            predicted_value = predicted_value,
            "High anomaly probability for {}: {:.2}",
            metric,
            probability
        );
    }

    /// Log a failed or panicked cycle iteration; the cycle keeps running
    pub fn log_cycle_error(&self, cycle: &str, error: &str) {
        error!(
            event = "cycle_error",
            instance = %self.instance,
            cycle = %cycle,
            error = %error,
            recoverable = true,
            "Cycle iteration failed"
        );
    }

    /// Log monitor startup
    pub fn log_startup(&self, version: &str, mode: &str) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            mode = %mode,
            "Autopilot monitor started"
        );
    }

    /// Log monitor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Autopilot monitor shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_monitor_metrics_creation() {
        let metrics = MonitorMetrics::new();
        let clone = metrics.clone();

        metrics.observe_cycle_latency("detection_cycle", 0.001);
        metrics.add_samples_observed(5);
        metrics.inc_anomalies_detected(Severity::High);
        metrics.inc_actions_requested(true);
        metrics.inc_forecasts_generated();
        metrics.set_baselines_tracked(5);

        let before = clone.cycle_errors("metrics_test_cycle");
        metrics.inc_cycle_errors("metrics_test_cycle");
        assert_eq!(clone.cycle_errors("metrics_test_cycle"), before + 1);
    }

    #[test]
    fn test_structured_logger_events() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance(), "test-instance");

        let anomaly = AnomalyRecord {
            metric: "cpu_usage".to_string(),
            value: 95.0,
            expected: 50.0,
            deviation: 4.5,
            severity: Severity::High,
            detected_at: Utc::now(),
        };
        logger.log_anomaly(&anomaly);
        logger.log_forecast_alert("cpu_usage", 0.97, 99.0);
        logger.log_cycle_error("detection_cycle", "telemetry unavailable");
    }
}
