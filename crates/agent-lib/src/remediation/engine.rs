//! Policy engine with per-metric cooldown

use super::policy::RemediationPolicy;
use crate::models::{ActionRecord, ActionStatus, AnomalyRecord, ExecutionMode};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Turns anomalies into remediation actions
///
/// The policy table is fixed at construction. Cooldown state is keyed by
/// metric and the check-then-record step for one metric happens under a
/// single shard lock.
pub struct RemediationPolicyEngine {
    policies: HashMap<String, RemediationPolicy>,
    /// Metric -> instant of the last produced action
    last_action: DashMap<String, Instant>,
    auto_remediate: bool,
}

impl RemediationPolicyEngine {
    pub fn new(policies: Vec<RemediationPolicy>, auto_remediate: bool) -> Self {
        let policies = policies
            .into_iter()
            .map(|p| (p.metric.clone(), p))
            .collect();
        Self {
            policies,
            last_action: DashMap::new(),
            auto_remediate,
        }
    }

    /// Evaluate anomalies against the policy table now
    pub fn evaluate(&self, anomalies: &[AnomalyRecord]) -> Vec<ActionRecord> {
        self.evaluate_at(anomalies, Instant::now())
    }

    /// Evaluate anomalies as if the monotonic clock read `now`
    pub fn evaluate_at(&self, anomalies: &[AnomalyRecord], now: Instant) -> Vec<ActionRecord> {
        let mut actions = Vec::new();

        for anomaly in anomalies {
            let Some(policy) = self.policies.get(&anomaly.metric) else {
                continue;
            };
            if !(anomaly.value > policy.threshold) {
                continue;
            }
            if !self.try_acquire(policy, now) {
                debug!(
                    metric = %policy.metric,
                    action = %policy.action,
                    "Remediation suppressed by cooldown"
                );
                continue;
            }

            let (mode, status) = if self.auto_remediate {
                (ExecutionMode::AutoExecuted, ActionStatus::Executed)
            } else {
                (ExecutionMode::Suggested, ActionStatus::Suggested)
            };
            actions.push(ActionRecord {
                metric: policy.metric.clone(),
                action: policy.action.clone(),
                timestamp: Utc::now(),
                mode,
                status,
            });
        }

        actions
    }

    /// Record `now` as the last action time unless the metric is still cooling down
    fn try_acquire(&self, policy: &RemediationPolicy, now: Instant) -> bool {
        match self.last_action.entry(policy.metric.clone()) {
            Entry::Occupied(mut last) => {
                if now.saturating_duration_since(*last.get()) >= policy.cooldown() {
                    last.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    pub fn policy(&self, metric: &str) -> Option<&RemediationPolicy> {
        self.policies.get(metric)
    }

    pub fn auto_remediate(&self) -> bool {
        self.auto_remediate
    }

    /// Instant of the last action produced for `metric`
    pub fn last_action(&self, metric: &str) -> Option<Instant> {
        self.last_action.get(metric).map(|t| *t)
    }
}
