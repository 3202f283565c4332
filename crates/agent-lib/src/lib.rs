//! Autonomous monitoring library
//!
//! This crate provides the core functionality for:
//! - Adaptive baselines and anomaly detection per metric
//! - Statistical forecasting with preventive advice
//! - Policy-driven remediation with per-metric cooldown
//! - The orchestrator running detection and forecast cycles
//! - Query routing, health checks and observability

pub mod anomaly;
pub mod config;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod predictor;
pub mod remediation;
pub mod router;
pub mod telemetry;

pub use config::{ConfigError, MonitorConfig, MonitoringMode};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
