//! Remediation policy table

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Action to take when a metric exceeds its threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationPolicy {
    pub metric: String,
    /// Observed value must be strictly greater than this
    pub threshold: f64,
    pub action: String,
    /// Minimum time between two actions for the same metric
    pub cooldown_secs: u64,
}

impl RemediationPolicy {
    pub fn new(
        metric: impl Into<String>,
        threshold: f64,
        action: impl Into<String>,
        cooldown: Duration,
    ) -> Self {
        Self {
            metric: metric.into(),
            threshold,
            action: action.into(),
            cooldown_secs: cooldown.as_secs(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Built-in policies for the standard resource metrics
pub fn default_policies() -> Vec<RemediationPolicy> {
    vec![
        RemediationPolicy::new("cpu_usage", 80.0, "scale_horizontal", Duration::from_secs(300)),
        RemediationPolicy::new("memory_usage", 85.0, "restart_service", Duration::from_secs(600)),
        RemediationPolicy::new("error_rate", 10.0, "rollback_deployment", Duration::from_secs(900)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_table() {
        let policies = default_policies();
        let cpu = policies.iter().find(|p| p.metric == "cpu_usage").unwrap();
        assert_eq!(cpu.threshold, 80.0);
        assert_eq!(cpu.action, "scale_horizontal");
        assert_eq!(cpu.cooldown(), Duration::from_secs(300));

        let errors = policies.iter().find(|p| p.metric == "error_rate").unwrap();
        assert_eq!(errors.cooldown(), Duration::from_secs(900));
    }

    #[test]
    fn test_policy_deserializes_from_config() {
        let policy: RemediationPolicy = serde_json::from_str(
            r#"{"metric": "latency", "threshold": 400.0, "action": "enable_cache", "cooldown_secs": 120}"#,
        )
        .unwrap();
        assert_eq!(policy.cooldown(), Duration::from_secs(120));
    }
}
