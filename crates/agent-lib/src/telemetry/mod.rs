//! Telemetry sources
//!
//! The detection cycle pulls one [`SampleSet`] per iteration from a
//! [`SampleSource`]. A failed pull fails only that iteration.

mod simulated;

pub use simulated::{MetricRange, SimulatedSource};

use crate::models::SampleSet;
use anyhow::Result;

pub use async_trait::async_trait;

/// Provider of metric samples
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Sample every metric the source knows about
    async fn sample(&self) -> Result<SampleSet>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "unnamed"
    }
}
