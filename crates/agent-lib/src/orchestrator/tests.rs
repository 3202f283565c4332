//! Scenario tests for the orchestrator
//!
//! These drive whole detection and forecast iterations through mock
//! telemetry sources, and exercise the cycle lifecycle with millisecond
//! intervals.

#[cfg(test)]
mod scenario_tests {
    use crate::anomaly::Baseline;
    use crate::config::MonitorConfig;
    use crate::health::{components, ComponentStatus};
    use crate::models::{ExecutionMode, MonitorEvent, SampleSet, Severity};
    use crate::orchestrator::{
        Orchestrator, OrchestratorBuilder, QueryResult, CLARIFICATION_MESSAGE,
        MINOR_ANOMALIES_HYPOTHESIS, NO_ANOMALIES_HYPOTHESIS,
    };
    use crate::router::Intent;
    use crate::telemetry::SampleSource;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Source returning the same values on every call
    struct FixedSource {
        values: Vec<(&'static str, f64)>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(values: &[(&'static str, f64)]) -> Self {
            Self {
                values: values.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SampleSource for FixedSource {
        async fn sample(&self) -> Result<SampleSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .values
                .iter()
                .fold(SampleSet::new(Utc::now()), |set, (m, v)| set.with(*m, *v)))
        }
    }

    /// Source that always fails
    struct FailingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SampleSource for FailingSource {
        async fn sample(&self) -> Result<SampleSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("telemetry backend unreachable"))
        }
    }

    /// Source that panics on its first call only
    struct PanicOnceSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SampleSource for PanicOnceSource {
        async fn sample(&self) -> Result<SampleSet> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("telemetry decoder bug");
            }
            Ok(SampleSet::new(Utc::now()).with("cpu_usage", 40.0))
        }
    }

    fn auto_config() -> MonitorConfig {
        MonitorConfig {
            enable_auto_remediation: true,
            ..Default::default()
        }
    }

    fn build(
        config: MonitorConfig,
        source: Arc<dyn SampleSource>,
    ) -> (Orchestrator, mpsc::Receiver<MonitorEvent>) {
        OrchestratorBuilder::new()
            .config(config)
            .source(source)
            .detection_interval(Duration::from_millis(5))
            .forecast_interval(Duration::from_millis(5))
            .voice_interval(Duration::from_millis(5))
            .build()
            .unwrap()
    }

    fn prime_resources(orchestrator: &Orchestrator) {
        orchestrator
            .detector()
            .prime("cpu_usage", Baseline::new(50.0, 10.0));
        orchestrator
            .detector()
            .prime("memory_usage", Baseline::new(50.0, 10.0));
    }

    async fn wait_until_running(orchestrator: &Orchestrator) {
        for _ in 0..500 {
            if orchestrator.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("orchestrator never started");
    }

    #[tokio::test]
    async fn test_cpu_spike_triggers_single_auto_action() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 95.0), ("memory_usage", 50.0)]));
        let (orchestrator, mut events) = build(auto_config(), source);
        prime_resources(&orchestrator);

        let analysis = orchestrator.detect_once().await.unwrap();

        assert_eq!(analysis.anomalies.len(), 1);
        assert_eq!(analysis.anomalies[0].metric, "cpu_usage");
        assert_eq!(analysis.anomalies[0].severity, Severity::High);
        assert_eq!(analysis.health_score, 90);

        let actions = orchestrator.recent_actions(10);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, "scale_horizontal");
        assert_eq!(actions[0].mode, ExecutionMode::AutoExecuted);

        match events.try_recv().unwrap() {
            MonitorEvent::ActionRequested(request) => {
                assert_eq!(request.metric, "cpu_usage");
                assert_eq!(request.action, "scale_horizontal");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(events.try_recv().is_err());

        let outcomes = orchestrator.recent_outcomes(10);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].anomaly_count, 1);
    }

    #[tokio::test]
    async fn test_cooldown_holds_across_iterations() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 95.0)]));
        let (orchestrator, _events) = build(auto_config(), source);
        orchestrator
            .detector()
            .prime("cpu_usage", Baseline::new(50.0, 10.0));

        orchestrator.detect_once().await.unwrap();
        let second = orchestrator.detect_once().await.unwrap();

        // Still anomalous, but the 300s cooldown suppresses a second action
        assert_eq!(second.anomalies.len(), 1);
        assert_eq!(orchestrator.recent_anomalies(10).len(), 2);
        assert_eq!(orchestrator.recent_actions(10).len(), 1);
    }

    #[tokio::test]
    async fn test_suggested_actions_emit_no_events() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 95.0)]));
        let (orchestrator, mut events) = build(MonitorConfig::default(), source);
        orchestrator
            .detector()
            .prime("cpu_usage", Baseline::new(50.0, 10.0));

        orchestrator.detect_once().await.unwrap();

        let actions = orchestrator.recent_actions(10);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].mode, ExecutionMode::Suggested);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_first_observation_only_seeds_baselines() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 99.0), ("latency", 480.0)]));
        let (orchestrator, _events) = build(auto_config(), source);

        let analysis = orchestrator.detect_once().await.unwrap();

        assert!(analysis.anomalies.is_empty());
        assert_eq!(analysis.health_score, 100);
        assert_eq!(orchestrator.detector().baselines().len(), 2);
        assert!(orchestrator.recent_outcomes(10).is_empty());
        assert_eq!(orchestrator.status().health_score, 100);
    }

    #[tokio::test]
    async fn test_investigate_hypotheses() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 95.0), ("memory_usage", 50.0)]));
        let (orchestrator, _events) = build(auto_config(), source);

        let empty = orchestrator.investigate(&["cpu"]);
        assert_eq!(empty.root_cause_hypothesis, NO_ANOMALIES_HYPOTHESIS);
        assert!(empty.recent_anomalies.is_empty());

        prime_resources(&orchestrator);
        orchestrator.detect_once().await.unwrap();

        let investigation = orchestrator.investigate(&["cpu"]);
        assert_eq!(
            investigation.root_cause_hypothesis,
            "High severity anomalies detected in: cpu_usage. \
             Likely cause: Resource exhaustion or service degradation."
        );
        assert_eq!(investigation.recent_anomalies.len(), 1);
        assert_eq!(investigation.recent_actions.len(), 1);
        assert_eq!(investigation.entities, vec!["cpu"]);
    }

    #[tokio::test]
    async fn test_investigate_minor_anomalies() {
        let source = Arc::new(FixedSource::new(&[("disk_usage", 75.0)]));
        let (orchestrator, _events) = build(auto_config(), source);
        orchestrator
            .detector()
            .prime("disk_usage", Baseline::new(50.0, 10.0));

        orchestrator.detect_once().await.unwrap();

        let investigation = orchestrator.investigate::<&str>(&[]);
        assert_eq!(investigation.root_cause_hypothesis, MINOR_ANOMALIES_HYPOTHESIS);
        assert!(investigation.recent_actions.is_empty());
    }

    #[tokio::test]
    async fn test_investigate_returns_last_five() {
        let source = Arc::new(FixedSource::new(&[("error_rate", 60.0)]));
        let (orchestrator, _events) = build(auto_config(), source);

        for _ in 0..8 {
            // Re-prime so every iteration deviates strongly
            orchestrator
                .detector()
                .prime("error_rate", Baseline::new(1.0, 2.0));
            orchestrator.detect_once().await.unwrap();
        }

        let investigation = orchestrator.investigate::<&str>(&[]);
        assert_eq!(orchestrator.recent_anomalies(100).len(), 8);
        assert_eq!(investigation.recent_anomalies.len(), 5);
        assert_eq!(investigation.recent_actions.len(), 1);
    }

    #[tokio::test]
    async fn test_full_event_channel_drops_without_blocking() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 95.0), ("memory_usage", 95.0)]));
        let config = MonitorConfig {
            event_buffer: 1,
            ..auto_config()
        };
        let (orchestrator, mut events) = build(config, source);
        prime_resources(&orchestrator);

        orchestrator.detect_once().await.unwrap();

        assert_eq!(orchestrator.recent_actions(10).len(), 2);
        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_event_channel_is_tolerated() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 95.0)]));
        let (orchestrator, events) = build(auto_config(), source);
        drop(events);
        orchestrator
            .detector()
            .prime("cpu_usage", Baseline::new(50.0, 10.0));

        let analysis = orchestrator.detect_once().await.unwrap();
        assert_eq!(analysis.anomalies.len(), 1);
        assert_eq!(orchestrator.recent_actions(10).len(), 1);
    }

    #[tokio::test]
    async fn test_forecast_alert_emitted_above_threshold() {
        let source = Arc::new(FixedSource::new(&[]));
        let config = MonitorConfig {
            prediction_horizon_secs: 36_000,
            anomaly_probability_threshold: 0.5,
            ..Default::default()
        };
        let (orchestrator, mut events) = build(config, source);

        for i in 0..20 {
            orchestrator
                .forecaster()
                .record("cpu_usage", 10.0 + i as f64 * 5.0);
        }

        let forecasts = orchestrator.forecast_once();

        // memory_usage and error_rate have no history yet
        assert_eq!(forecasts.len(), 1);
        assert_eq!(forecasts[0].metric, "cpu_usage");
        assert!(forecasts[0].suggested_action.is_some());
        assert_eq!(orchestrator.recent_forecasts(10).len(), 1);

        match events.try_recv().unwrap() {
            MonitorEvent::ForecastAlert(alert) => {
                assert_eq!(alert.metric, "cpu_usage");
                assert!(alert.probability > 0.5);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_detection_feeds_forecaster_history() {
        let source = Arc::new(FixedSource::new(&[("memory_usage", 42.0)]));
        let (orchestrator, _events) = build(auto_config(), source);

        for _ in 0..12 {
            orchestrator.detect_once().await.unwrap();
        }
        assert_eq!(orchestrator.forecaster().sample_count("memory_usage"), 12);

        let forecasts = orchestrator.forecast_once();
        assert_eq!(forecasts.len(), 1);
        assert!((forecasts[0].predicted_value - 42.0).abs() < 1e-9);
        assert_eq!(forecasts[0].anomaly_probability, 0.0);
    }

    #[tokio::test]
    async fn test_predictions_default_pair_untrained() {
        let source = Arc::new(FixedSource::new(&[]));
        let (orchestrator, _events) = build(auto_config(), source);

        let predictions = orchestrator.predictions::<&str>(&[]);
        let keys: Vec<_> = predictions.keys().cloned().collect();
        assert_eq!(keys, vec!["cpu_usage", "memory_usage"]);
        assert!(predictions.values().all(|f| f.predicted_value == 0.0 && f.confidence == 0.0));
        assert!(orchestrator.recent_forecasts(10).is_empty());
    }

    #[tokio::test]
    async fn test_query_routing() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 40.0), ("memory_usage", 55.0)]));
        let (orchestrator, _events) = build(auto_config(), source);
        orchestrator.detect_once().await.unwrap();

        let response = orchestrator.query("Show me CPU metrics");
        assert_eq!(response.intent, Intent::Metrics);
        match response.result {
            QueryResult::Metrics(metrics) => {
                assert_eq!(metrics.len(), 1);
                assert_eq!(metrics["cpu_usage"], 40.0);
            }
            other => panic!("unexpected result {other:?}"),
        }

        let response = orchestrator.query("hello there");
        assert_eq!(response.intent, Intent::None);
        assert_eq!(
            response.result,
            QueryResult::Message {
                message: CLARIFICATION_MESSAGE.to_string()
            }
        );

        let response = orchestrator.query("What is the system health?");
        assert!(matches!(response.result, QueryResult::Status(_)));

        let response = orchestrator.query("Predict network load");
        match response.result {
            QueryResult::Predictions(predictions) => {
                assert!(predictions.contains_key("network"));
                assert_eq!(predictions["network"].metric, "latency");
            }
            other => panic!("unexpected result {other:?}"),
        }

        assert_eq!(orchestrator.conversation(10).len(), 4);
    }

    #[tokio::test]
    async fn test_metrics_filter_by_entity() {
        let source = Arc::new(FixedSource::new(&[
            ("cpu_usage", 40.0),
            ("disk_usage", 50.0),
            ("latency", 120.0),
        ]));
        let (orchestrator, _events) = build(auto_config(), source);
        assert!(orchestrator.metrics::<&str>(&[]).is_empty());

        orchestrator.detect_once().await.unwrap();

        assert_eq!(orchestrator.metrics::<&str>(&[]).len(), 3);
        let filtered = orchestrator.metrics(&["disk", "latency"]);
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["disk_usage", "latency"]);
    }

    #[tokio::test]
    async fn test_metrics_filter_by_entity_group() {
        let source = Arc::new(FixedSource::new(&[
            ("cpu_usage", 40.0),
            ("error_rate", 3.0),
            ("latency", 120.0),
        ]));
        let (orchestrator, _events) = build(auto_config(), source);
        orchestrator.detect_once().await.unwrap();

        let errors = orchestrator.metrics(&["errors"]);
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["error_rate"]);

        let response = orchestrator.query("show me network metrics");
        assert_eq!(response.entities, vec!["network"]);
        match response.result {
            QueryResult::Metrics(metrics) => {
                assert_eq!(metrics.len(), 1);
                assert_eq!(metrics["latency"], 120.0);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 40.0)]));
        let (orchestrator, _events) = build(auto_config(), source.clone());

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_until_running(&orchestrator).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(orchestrator.status().running);
        assert_eq!(orchestrator.status().active_cycles, 2);

        orchestrator.stop().await;
        assert!(!orchestrator.is_running());
        handle.await.unwrap().unwrap();

        let calls = source.calls();
        assert!(calls >= 2, "detection ran {calls} times");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(source.calls(), calls);
        assert!(!orchestrator.health().readiness().await.ready);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 40.0)]));
        let (orchestrator, _events) = build(auto_config(), source.clone());

        for _ in 0..2 {
            let runner = orchestrator.clone();
            let handle = tokio::spawn(async move { runner.start().await });
            wait_until_running(&orchestrator).await;
            orchestrator.stop().await;
            handle.await.unwrap().unwrap();
        }
        assert!(source.calls() >= 2);
    }

    #[tokio::test]
    async fn test_double_start_is_error() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 40.0)]));
        let (orchestrator, _events) = build(auto_config(), source);

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_until_running(&orchestrator).await;

        assert!(orchestrator.start().await.is_err());

        orchestrator.stop().await;
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_not_running_returns() {
        let source = Arc::new(FixedSource::new(&[]));
        let (orchestrator, _events) = build(auto_config(), source);
        orchestrator.stop().await;
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_failing_source_keeps_cycle_alive() {
        let source = Arc::new(FailingSource {
            calls: AtomicUsize::new(0),
        });
        let config = MonitorConfig {
            enable_predictions: false,
            ..auto_config()
        };
        let (orchestrator, _events) = build(config, source.clone());

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_until_running(&orchestrator).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        orchestrator.stop().await;
        handle.await.unwrap().unwrap();

        assert!(source.calls.load(Ordering::SeqCst) >= 3);
        let health = orchestrator.health();
        let telemetry = health.component(components::TELEMETRY).await.unwrap();
        assert_ne!(telemetry.status, ComponentStatus::Healthy);
        let cycle = health.component(components::DETECTION_CYCLE).await.unwrap();
        assert!(cycle.consecutive_failures >= 3);
        assert!(orchestrator.latest().is_none());
    }

    #[tokio::test]
    async fn test_panicking_iteration_is_isolated() {
        let source = Arc::new(PanicOnceSource {
            calls: AtomicUsize::new(0),
        });
        let config = MonitorConfig {
            enable_predictions: false,
            ..auto_config()
        };
        let (orchestrator, _events) = build(config, source.clone());

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_until_running(&orchestrator).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        orchestrator.stop().await;
        handle.await.unwrap().unwrap();

        assert!(source.calls.load(Ordering::SeqCst) >= 2);
        assert!(orchestrator.latest().is_some());
        let cycle = orchestrator
            .health()
            .component(components::DETECTION_CYCLE)
            .await
            .unwrap();
        assert_eq!(cycle.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_voice_cycle_counts_as_active() {
        let source = Arc::new(FixedSource::new(&[]));
        let config = MonitorConfig {
            enable_voice: true,
            ..auto_config()
        };
        let (orchestrator, mut events) = build(config, source);

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_until_running(&orchestrator).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(orchestrator.status().active_cycles, 3);

        orchestrator.stop().await;
        handle.await.unwrap().unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_during_cycles_never_tear() {
        let source = Arc::new(FixedSource::new(&[("cpu_usage", 95.0), ("memory_usage", 50.0)]));
        let (orchestrator, _events) = OrchestratorBuilder::new()
            .config(auto_config())
            .source(source)
            .detection_interval(Duration::from_millis(1))
            .forecast_interval(Duration::from_millis(1))
            .build()
            .unwrap();
        prime_resources(&orchestrator);

        let runner = orchestrator.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_until_running(&orchestrator).await;

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let status = orchestrator.status();
                        assert_eq!(
                            status.health_score as usize,
                            100 - 10 * status.anomalies.len()
                        );
                        let investigation = orchestrator.investigate(&["cpu"]);
                        assert!(investigation.recent_anomalies.len() <= 5);
                        let baseline = orchestrator.detector().baseline("cpu_usage").unwrap();
                        assert!((50.0..=95.0).contains(&baseline.mean));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.await.unwrap();
        }

        orchestrator.stop().await;
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_builder_requires_source() {
        let result = OrchestratorBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = MonitorConfig::default();
        config.detector.smoothing_alpha = 0.0;
        let result = OrchestratorBuilder::new()
            .config(config)
            .source(Arc::new(FixedSource::new(&[])))
            .build();
        assert!(result.is_err());
    }
}
