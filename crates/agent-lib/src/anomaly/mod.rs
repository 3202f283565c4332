//! Anomaly detection against adaptive per-metric baselines
//!
//! This module provides:
//! - Baselines (smoothed mean and strictly positive spread) per metric
//! - Deviation scoring with medium/high severity classification

mod baseline;
mod detector;

pub use baseline::{Baseline, BaselineStore, SpreadMode};
pub use detector::{AnomalyDetector, DetectorConfig};
