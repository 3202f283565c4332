//! Agent configuration
//!
//! Layered as: built-in defaults, then an optional config file, then
//! environment variables. Invalid configuration stops the agent.

use anyhow::{Context, Result};
use autopilot_lib::MonitorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "AUTOPILOT_CONFIG";

/// Config file read when `AUTOPILOT_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "autopilot.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name attached to every structured log line
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics/queries
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "autopilot".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load configuration with `path` as the (optional) config file
    ///
    /// Environment variables override the file, e.g.
    /// `AUTOPILOT_API_PORT=9000` or
    /// `AUTOPILOT_MONITOR__DETECTOR__DETECTION_THRESHOLD=2.5`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("AUTOPILOT")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("monitor.watch_list")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        let config: AgentConfig = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.monitor.validate()?;
        Ok(config)
    }
}
