//! Autopilot agent - autonomous monitoring daemon
//!
//! Runs the detection and forecast cycles against the configured telemetry
//! source and serves health, metrics and queries over HTTP.

use anyhow::Result;
use autopilot_lib::{
    health::{components, HealthRegistry},
    telemetry::SimulatedSource,
    MonitorEvent, MonitorMetrics, OrchestratorBuilder, StructuredLogger,
};
use autopilot_agent::{api, config::AgentConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log outbound events until the channel closes
async fn drain_events(mut events: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::ActionRequested(request) => info!(
                event = "action_requested",
                metric = %request.metric,
                action = %request.action,
                "Remediation action requested"
            ),
            MonitorEvent::ForecastAlert(alert) => info!(
                event = "forecast_alert_emitted",
                metric = %alert.metric,
                probability = alert.probability,
                "Forecast alert emitted"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting autopilot-agent");

    let config = AgentConfig::load()?;
    info!(instance = %config.instance, mode = %config.monitor.mode, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::TELEMETRY).await;

    // Register global metrics before the first scrape
    let _metrics = MonitorMetrics::new();

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(AGENT_VERSION, &config.monitor.mode.to_string());

    let (orchestrator, events) = OrchestratorBuilder::new()
        .config(config.monitor.clone())
        .source(Arc::new(SimulatedSource::default()))
        .health(health_registry)
        .logger(logger.clone())
        .build()?;

    let app_state = Arc::new(api::AppState::new(orchestrator.clone()));

    let events_handle = tokio::spawn(drain_events(events));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let cycles = orchestrator.clone();
    let cycles_handle = tokio::spawn(async move {
        if let Err(e) = cycles.start().await {
            error!(error = %e, "Monitoring cycles failed to start");
        }
    });

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    orchestrator.stop().await;
    if let Err(e) = cycles_handle.await {
        error!(error = %e, "Cycle supervisor ended abnormally");
    }
    api_handle.abort();
    events_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
