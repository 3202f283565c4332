//! Autopilot agent: HTTP surface and configuration loading for the monitor

pub mod api;
pub mod config;
