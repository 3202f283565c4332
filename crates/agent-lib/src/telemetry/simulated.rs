//! Simulated telemetry for development and demos

use super::SampleSource;
use crate::models::SampleSet;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Uniform range a simulated metric is drawn from
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRange {
    pub metric: String,
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    pub fn new(metric: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            metric: metric.into(),
            min,
            max,
        }
    }
}

/// Source producing uniformly distributed values within fixed ranges
pub struct SimulatedSource {
    ranges: Vec<MetricRange>,
    state: AtomicU64,
}

impl SimulatedSource {
    pub fn new(ranges: Vec<MetricRange>) -> Self {
        Self {
            ranges,
            state: AtomicU64::new(seed()),
        }
    }

    /// Fix the generator seed for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        // xorshift never leaves the zero state
        self.state = AtomicU64::new(seed.max(1));
        self
    }

    pub fn ranges(&self) -> &[MetricRange] {
        &self.ranges
    }

    /// Next value in [0, 1)
    fn next_unit(&self) -> f64 {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            let next = xorshift(current);
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return (next >> 11) as f64 / (1u64 << 53) as f64,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(vec![
            MetricRange::new("cpu_usage", 20.0, 80.0),
            MetricRange::new("memory_usage", 30.0, 70.0),
            MetricRange::new("disk_usage", 40.0, 60.0),
            MetricRange::new("error_rate", 0.0, 5.0),
            MetricRange::new("latency", 50.0, 500.0),
        ])
    }
}

#[async_trait]
impl SampleSource for SimulatedSource {
    async fn sample(&self) -> Result<SampleSet> {
        let mut set = SampleSet::new(Utc::now());
        for range in &self.ranges {
            let value = range.min + self.next_unit() * (range.max - range.min);
            set.values.insert(range.metric.clone(), value);
        }
        Ok(set)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

fn xorshift(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

/// Time-based seed
fn seed() -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    now | 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_ranges_are_respected() {
        let source = SimulatedSource::default().with_seed(42);
        for _ in 0..200 {
            let set = source.sample().await.unwrap();
            assert_eq!(set.len(), 5);
            let cpu = set.values["cpu_usage"];
            assert!((20.0..80.0).contains(&cpu), "cpu out of range: {cpu}");
            let errors = set.values["error_rate"];
            assert!((0.0..5.0).contains(&errors));
            let latency = set.values["latency"];
            assert!((50.0..500.0).contains(&latency));
        }
    }

    #[tokio::test]
    async fn test_same_seed_is_reproducible() {
        let a = SimulatedSource::default().with_seed(7);
        let b = SimulatedSource::default().with_seed(7);
        assert_eq!(a.sample().await.unwrap().values, b.sample().await.unwrap().values);
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let source = SimulatedSource::new(vec![MetricRange::new("x", 0.0, 1.0)]).with_seed(0);
        let first = source.next_unit();
        let second = source.next_unit();
        assert_ne!(first, second);
    }
}
