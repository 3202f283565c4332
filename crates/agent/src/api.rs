//! HTTP API for health checks, Prometheus metrics and monitor queries

use autopilot_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::MonitorMetrics,
    Orchestrator,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub health_registry: HealthRegistry,
    pub metrics: MonitorMetrics,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            health_registry: orchestrator.health().clone(),
            orchestrator,
            metrics: MonitorMetrics::new(),
        }
    }
}

/// `?entities=a,b`
#[derive(Debug, Default, Deserialize)]
pub struct EntityParams {
    pub entities: Option<String>,
}

/// `?metrics=a,b`
#[derive(Debug, Default, Deserialize)]
pub struct MetricParams {
    pub metrics: Option<String>,
}

/// Body of `POST /api/v1/query`
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

/// Split a comma-separated query parameter, dropping blanks
fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect()
    })
    .unwrap_or_default()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 while the cycles run
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.status())
}

async fn current_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EntityParams>,
) -> impl IntoResponse {
    let entities = split_list(params.entities.as_deref());
    Json(state.orchestrator.metrics(&entities))
}

async fn predictions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricParams>,
) -> impl IntoResponse {
    let metrics = split_list(params.metrics.as_deref());
    Json(state.orchestrator.predictions(&metrics))
}

async fn investigate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EntityParams>,
) -> impl IntoResponse {
    let entities = split_list(params.entities.as_deref());
    Json(state.orchestrator.investigate(&entities))
}

async fn query(State(state): State<Arc<AppState>>, Json(request): Json<QueryRequest>) -> Response {
    if request.text.trim().is_empty() {
        return bad_request("query text must not be empty");
    }
    Json(state.orchestrator.query(&request.text)).into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/metrics", get(current_metrics))
        .route("/api/v1/predictions", get(predictions))
        .route("/api/v1/investigate", get(investigate))
        .route("/api/v1/query", post(query))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
