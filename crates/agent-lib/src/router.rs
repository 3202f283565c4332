//! Natural-language query classification
//!
//! Maps free text to an [`Intent`] and a set of entity groups. Intent
//! patterns are tried in a fixed order and the first match wins; entities are
//! collected by keyword containment.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a query is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Status,
    Metrics,
    Errors,
    Predict,
    Alert,
    Investigate,
    Optimize,
    None,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::Status => "status",
            Intent::Metrics => "metrics",
            Intent::Errors => "errors",
            Intent::Predict => "predict",
            Intent::Alert => "alert",
            Intent::Investigate => "investigate",
            Intent::Optimize => "optimize",
            Intent::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// Result of classifying a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Entity groups in declaration order (cpu, memory, disk, network, errors)
    pub entities: Vec<String>,
}

/// Classifies free-text queries
pub trait QueryRouter: Send + Sync {
    fn classify(&self, text: &str) -> Classification;
}

const INTENT_PATTERNS: [(Intent, &str); 7] = [
    (Intent::Status, r"(status|health|state|condition)"),
    (Intent::Metrics, r"(show|display|get|what).*(metric|cpu|memory|disk|latency)"),
    (Intent::Errors, r"(error|failure|issue|problem|wrong)"),
    (Intent::Predict, r"(predict|forecast|will|future|expect)"),
    (Intent::Alert, r"(alert|notify|tell|warn).*(if|when)"),
    (Intent::Investigate, r"(why|cause|reason|investigate|debug)"),
    (Intent::Optimize, r"(optimize|improve|better|enhance|tune)"),
];

const ENTITY_KEYWORDS: [(&str, &[&str]); 5] = [
    ("cpu", &["cpu", "cpu_usage", "processor", "compute"]),
    ("memory", &["memory", "memory_usage", "ram", "heap"]),
    ("disk", &["disk", "disk_usage", "storage", "filesystem"]),
    ("network", &["network", "network_throughput", "bandwidth", "latency"]),
    ("errors", &["errors", "error_rate", "failures", "exceptions"]),
];

/// Metric predicted for an entity group
pub fn entity_metric(entity: &str) -> Option<&'static str> {
    match entity {
        "cpu" => Some("cpu_usage"),
        "memory" => Some("memory_usage"),
        "disk" => Some("disk_usage"),
        "network" => Some("latency"),
        "errors" => Some("error_rate"),
        _ => None,
    }
}

/// Keyword and regex based router
pub struct KeywordRouter {
    patterns: Vec<(Intent, Regex)>,
}

impl KeywordRouter {
    pub fn new() -> Self {
        let patterns = INTENT_PATTERNS
            .iter()
            .filter_map(|(intent, pattern)| Regex::new(pattern).ok().map(|re| (*intent, re)))
            .collect();
        Self { patterns }
    }

    fn intent(&self, text: &str) -> Intent {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::None)
    }

    fn entities(text: &str) -> Vec<String> {
        ENTITY_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(group, _)| group.to_string())
            .collect()
    }
}

impl Default for KeywordRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRouter for KeywordRouter {
    fn classify(&self, text: &str) -> Classification {
        let text = text.to_lowercase();
        Classification {
            intent: self.intent(&text),
            entities: Self::entities(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(KeywordRouter::new().patterns.len(), INTENT_PATTERNS.len());
    }

    #[test]
    fn test_status_query() {
        let c = KeywordRouter::new().classify("What is the system status?");
        assert_eq!(c.intent, Intent::Status);
        assert!(c.entities.is_empty());
    }

    #[test]
    fn test_metrics_query_with_entities() {
        let c = KeywordRouter::new().classify("Show me CPU and memory metrics");
        assert_eq!(c.intent, Intent::Metrics);
        assert_eq!(c.entities, vec!["cpu", "memory"]);
    }

    #[test]
    fn test_first_matching_intent_wins() {
        // Matches both "errors" and "investigate"; errors is tried first
        let c = KeywordRouter::new().classify("Why is there an error spike?");
        assert_eq!(c.intent, Intent::Errors);

        let c = KeywordRouter::new().classify("Why did latency jump?");
        assert_eq!(c.intent, Intent::Investigate);
        assert_eq!(c.entities, vec!["network"]);
    }

    #[test]
    fn test_predict_and_alert() {
        let router = KeywordRouter::new();
        assert_eq!(router.classify("Forecast disk usage").intent, Intent::Predict);
        assert_eq!(
            router.classify("Notify me when RAM is high").intent,
            Intent::Alert
        );
        assert_eq!(
            router.classify("Notify me when RAM is high").entities,
            vec!["memory"]
        );
    }

    #[test]
    fn test_unrecognized_query() {
        let c = KeywordRouter::new().classify("hello there");
        assert_eq!(c.intent, Intent::None);
        assert!(c.entities.is_empty());
    }

    #[test]
    fn test_entity_metric_mapping() {
        assert_eq!(entity_metric("network"), Some("latency"));
        assert_eq!(entity_metric("errors"), Some("error_rate"));
        assert_eq!(entity_metric("gpu"), None);
    }
}
