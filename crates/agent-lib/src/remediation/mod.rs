//! Remediation policy evaluation
//!
//! Maps anomalous metrics to actions through a static policy table, with a
//! per-metric cooldown so the same action is not requested on every cycle.

mod engine;
mod policy;

pub use engine::RemediationPolicyEngine;
pub use policy::{default_policies, RemediationPolicy};
