//! Monitoring orchestration
//!
//! Runs the detection and forecast cycles on independent intervals over
//! shared state, and answers queries against that state at any time.
//!
//! Each iteration runs in its own task: an error or panic is logged, counted
//! and reflected in component health, and the cycle carries on with the next
//! tick. `stop` lets in-flight iterations finish and returns once every cycle
//! has exited.

mod detection;
mod forecast;
mod query;
mod state;

#[cfg(test)]
mod tests;

pub use query::{
    root_cause_hypothesis, Investigation, QueryRecord, QueryResponse, QueryResult, StatusReport,
    CLARIFICATION_MESSAGE, DEFAULT_PREDICTION_METRICS, INVESTIGATION_DEPTH,
    MINOR_ANOMALIES_HYPOTHESIS, NO_ANOMALIES_HYPOTHESIS,
};
pub use state::Snapshot;

use crate::anomaly::AnomalyDetector;
use crate::config::MonitorConfig;
use crate::health::{components, HealthRegistry};
use crate::models::{ActionRecord, Analysis, AnomalyRecord, Forecast, MonitorEvent, Outcome};
use crate::observability::StructuredLogger;
use crate::predictor::Forecaster;
use crate::remediation::RemediationPolicyEngine;
use crate::router::{KeywordRouter, QueryRouter};
use crate::telemetry::SampleSource;
use anyhow::{bail, Result};
use state::MonitorState;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Cycle periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleIntervals {
    pub detection: Duration,
    pub forecast: Duration,
    pub voice: Duration,
}

impl CycleIntervals {
    fn from_config(config: &MonitorConfig) -> Self {
        Self {
            detection: config.detection_interval(),
            forecast: config.forecast_interval(),
            voice: config.voice_interval(),
        }
    }
}

/// Signals shared between one `start` call and any `stop` callers
struct RunHandle {
    shutdown: watch::Sender<bool>,
    finished: watch::Receiver<bool>,
}

/// Autonomous monitor: owns the cycles and the query surface
#[derive(Clone)]
pub struct Orchestrator {
    state: Arc<MonitorState>,
    source: Arc<dyn SampleSource>,
    router: Arc<dyn QueryRouter>,
    intervals: CycleIntervals,
    run: Arc<Mutex<Option<RunHandle>>>,
}

impl Orchestrator {
    /// Create an orchestrator with the keyword router
    ///
    /// Returns the receiving end of the outbound event channel. The
    /// configuration is expected to be validated; `OrchestratorBuilder`
    /// does this.
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn SampleSource>,
    ) -> (Self, mpsc::Receiver<MonitorEvent>) {
        let intervals = CycleIntervals::from_config(&config);
        Self::assemble(
            config,
            source,
            Arc::new(KeywordRouter::new()),
            intervals,
            HealthRegistry::new(),
            StructuredLogger::new("autopilot"),
        )
    }

    fn assemble(
        config: MonitorConfig,
        source: Arc<dyn SampleSource>,
        router: Arc<dyn QueryRouter>,
        intervals: CycleIntervals,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> (Self, mpsc::Receiver<MonitorEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let state = Arc::new(MonitorState::new(config, events_tx, health, logger));

        let orchestrator = Self {
            state,
            source,
            router,
            intervals,
            run: Arc::new(Mutex::new(None)),
        };
        (orchestrator, events_rx)
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<RunHandle>> {
        self.run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run all enabled cycles until `stop` is called
    ///
    /// Fails immediately if the orchestrator is already running.
    pub async fn start(&self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);
        {
            let mut run = self.lock_run();
            if run.is_some() {
                bail!("orchestrator is already running");
            }
            *run = Some(RunHandle {
                shutdown: shutdown_tx,
                finished: finished_rx,
            });
        }

        let config = &self.state.config;
        info!(
            mode = %config.mode,
            detection_interval_ms = self.intervals.detection.as_millis() as u64,
            forecast_interval_ms = self.intervals.forecast.as_millis() as u64,
            predictions = config.enable_predictions,
            auto_remediation = config.enable_auto_remediation,
            voice = config.enable_voice,
            "Starting monitoring cycles"
        );

        let mut cycles = Vec::new();

        let state = self.state.clone();
        let source = self.source.clone();
        cycles.push(tokio::spawn(run_cycle(
            components::DETECTION_CYCLE,
            self.intervals.detection,
            shutdown_rx.clone(),
            self.state.clone(),
            move || {
                let state = state.clone();
                let source = source.clone();
                async move {
                    detection::run_iteration(&state, source.as_ref())
                        .await
                        .map(|_| ())
                }
            },
        )));

        if config.enable_predictions {
            let state = self.state.clone();
            cycles.push(tokio::spawn(run_cycle(
                components::FORECAST_CYCLE,
                self.intervals.forecast,
                shutdown_rx.clone(),
                self.state.clone(),
                move || {
                    let state = state.clone();
                    async move {
                        forecast::run_iteration(&state);
                        Ok(())
                    }
                },
            )));
        }

        if config.enable_voice {
            cycles.push(tokio::spawn(run_cycle(
                components::VOICE_CYCLE,
                self.intervals.voice,
                shutdown_rx.clone(),
                self.state.clone(),
                || async { Ok(()) },
            )));
        }

        self.state.health.set_ready(true).await;

        for cycle in cycles {
            if let Err(e) = cycle.await {
                warn!(error = %e, "Cycle task ended abnormally");
            }
        }

        self.state.health.set_ready(false).await;
        self.lock_run().take();
        let _ = finished_tx.send(true);
        info!("All monitoring cycles stopped");
        Ok(())
    }

    /// Ask the cycles to stop and wait until they have
    ///
    /// Returns immediately when not running.
    pub async fn stop(&self) {
        let (shutdown, mut finished) = {
            let run = self.lock_run();
            match run.as_ref() {
                Some(handle) => (handle.shutdown.clone(), handle.finished.clone()),
                None => return,
            }
        };

        info!("Stopping monitoring cycles");
        let _ = shutdown.send(true);

        loop {
            let done = *finished.borrow_and_update();
            if done || finished.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_run().is_some()
    }

    /// Number of cycles `start` runs with the current configuration
    pub fn cycle_count(&self) -> usize {
        let config = &self.state.config;
        1 + usize::from(config.enable_predictions) + usize::from(config.enable_voice)
    }

    /// Run a single detection iteration outside the cycle
    pub async fn detect_once(&self) -> Result<Analysis> {
        detection::run_iteration(&self.state, self.source.as_ref()).await
    }

    /// Run a single forecast iteration outside the cycle
    pub fn forecast_once(&self) -> Vec<Forecast> {
        forecast::run_iteration(&self.state)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.state.config
    }

    pub fn intervals(&self) -> CycleIntervals {
        self.intervals
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.state.detector
    }

    pub fn remediation(&self) -> &RemediationPolicyEngine {
        &self.state.engine
    }

    pub fn forecaster(&self) -> &Forecaster {
        &self.state.forecaster
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.state.health
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.state.latest()
    }

    pub fn recent_anomalies(&self, n: usize) -> Vec<AnomalyRecord> {
        self.state.anomalies.recent(n)
    }

    pub fn recent_actions(&self, n: usize) -> Vec<ActionRecord> {
        self.state.actions.recent(n)
    }

    pub fn recent_outcomes(&self, n: usize) -> Vec<Outcome> {
        self.state.outcomes.recent(n)
    }

    pub fn recent_forecasts(&self, n: usize) -> Vec<Forecast> {
        self.state.forecaster.recent_forecasts(n)
    }
}

/// Tick `iteration` every `period` until shutdown is signalled
async fn run_cycle<F, Fut>(
    cycle: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    state: Arc<MonitorState>,
    iteration: F,
) where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    info!(cycle, interval_ms = period.as_millis() as u64, "Starting cycle");
    state.health.register(cycle).await;

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut iterations = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let started = Instant::now();
                let outcome = tokio::spawn(iteration()).await;
                state
                    .metrics
                    .observe_cycle_latency(cycle, started.elapsed().as_secs_f64());
                iterations += 1;

                match outcome {
                    Ok(Ok(())) => state.health.record_success(cycle).await,
                    Ok(Err(e)) => state.iteration_failed(cycle, &format!("{:#}", e)).await,
                    Err(e) if e.is_panic() => {
                        state.iteration_failed(cycle, "iteration panicked").await
                    }
                    Err(e) => state.iteration_failed(cycle, &e.to_string()).await,
                }
            }
        }
    }

    debug!(cycle, iterations, "Cycle iterations complete");
    info!(cycle, "Shutting down cycle");
}

/// Builder for an [`Orchestrator`]
pub struct OrchestratorBuilder {
    config: MonitorConfig,
    source: Option<Arc<dyn SampleSource>>,
    router: Option<Arc<dyn QueryRouter>>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    detection_interval: Option<Duration>,
    forecast_interval: Option<Duration>,
    voice_interval: Option<Duration>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            source: None,
            router: None,
            health: None,
            logger: None,
            detection_interval: None,
            forecast_interval: None,
            voice_interval: None,
        }
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the telemetry source
    pub fn source(mut self, source: Arc<dyn SampleSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the default keyword router
    pub fn router(mut self, router: Arc<dyn QueryRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Share an existing health registry (e.g. with the HTTP server)
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Override the detection period (finer than whole seconds)
    pub fn detection_interval(mut self, interval: Duration) -> Self {
        self.detection_interval = Some(interval);
        self
    }

    /// Override the forecast period
    pub fn forecast_interval(mut self, interval: Duration) -> Self {
        self.forecast_interval = Some(interval);
        self
    }

    /// Override the voice stub period
    pub fn voice_interval(mut self, interval: Duration) -> Self {
        self.voice_interval = Some(interval);
        self
    }

    /// Validate the configuration and build the orchestrator
    pub fn build(self) -> Result<(Orchestrator, mpsc::Receiver<MonitorEvent>)> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Sample source is required"))?;
        self.config.validate()?;

        let defaults = CycleIntervals::from_config(&self.config);
        let intervals = CycleIntervals {
            detection: self.detection_interval.unwrap_or(defaults.detection),
            forecast: self.forecast_interval.unwrap_or(defaults.forecast),
            voice: self.voice_interval.unwrap_or(defaults.voice),
        };
        if intervals.detection.is_zero() || intervals.forecast.is_zero() || intervals.voice.is_zero()
        {
            bail!("cycle intervals must be greater than zero");
        }

        Ok(Orchestrator::assemble(
            self.config,
            source,
            self.router.unwrap_or_else(|| Arc::new(KeywordRouter::new())),
            intervals,
            self.health.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("autopilot")),
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
