//! Per-metric baselines
//!
//! Each metric keeps an exponentially smoothed mean and a strictly positive
//! spread. Entries are created on first observation and never removed.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// How the spread of a baseline evolves over time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadMode {
    /// Spread stays at its initial value; only the mean adapts
    #[default]
    Fixed,
    /// Spread follows an exponentially weighted variance with the same alpha as the mean
    Ewma,
}

/// Smoothed running estimate of a metric's normal level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    /// Always > 0
    pub spread: f64,
}

impl Baseline {
    pub fn new(mean: f64, spread: f64) -> Self {
        Self { mean, spread }
    }

    /// Number of spreads `value` lies away from the mean
    pub fn deviation(&self, value: f64) -> f64 {
        (value - self.mean).abs() / self.spread
    }

    /// Fold a new value into the baseline
    fn update(&mut self, value: f64, alpha: f64, mode: SpreadMode) {
        let previous_mean = self.mean;
        let mean = alpha * value + (1.0 - alpha) * previous_mean;
        if mean.is_finite() {
            self.mean = mean;
        }

        if mode == SpreadMode::Ewma {
            let diff = value - previous_mean;
            let variance = (1.0 - alpha) * (self.spread.powi(2) + alpha * diff * diff);
            let spread = variance.sqrt();
            // Never let the spread collapse; keep the previous value instead
            if spread.is_finite() && spread > 0.0 {
                self.spread = spread;
            }
        }
    }
}

/// Concurrent map of metric name to baseline
///
/// Reads and read-modify-write updates for one metric are serialized by the
/// map's shard lock, so a reader never observes a half-applied update.
pub struct BaselineStore {
    baselines: DashMap<String, Baseline>,
    alpha: f64,
    default_spread: f64,
    mode: SpreadMode,
}

impl BaselineStore {
    /// Create a store. `alpha` must be in (0, 1) and `default_spread` > 0;
    /// `MonitorConfig::validate` enforces both.
    pub fn new(alpha: f64, default_spread: f64, mode: SpreadMode) -> Self {
        Self {
            baselines: DashMap::new(),
            alpha,
            default_spread,
            mode,
        }
    }

    /// Atomically read the current baseline for `metric` (if any) and fold `value` into it.
    ///
    /// Returns the baseline as it was *before* the update, or `None` when this
    /// was the first observation and a new baseline was seeded.
    pub fn observe(&self, metric: &str, value: f64) -> Option<Baseline> {
        if let Some(mut entry) = self.baselines.get_mut(metric) {
            let before = *entry;
            entry.update(value, self.alpha, self.mode);
            return Some(before);
        }

        // Another observer may have seeded the entry between the two lookups;
        // the entry API resolves that under the shard lock.
        let mut seeded = true;
        let mut before = None;
        self.baselines
            .entry(metric.to_string())
            .and_modify(|existing| {
                seeded = false;
                before = Some(*existing);
                existing.update(value, self.alpha, self.mode);
            })
            .or_insert_with(|| Baseline::new(value, self.default_spread));

        if seeded {
            None
        } else {
            before
        }
    }

    /// Snapshot of one metric's baseline
    pub fn get(&self, metric: &str) -> Option<Baseline> {
        self.baselines.get(metric).map(|b| *b)
    }

    /// Install a baseline directly (used to prime a store with known behavior)
    pub fn insert(&self, metric: impl Into<String>, baseline: Baseline) {
        if baseline.spread > 0.0 && baseline.spread.is_finite() {
            self.baselines.insert(metric.into(), baseline);
        }
    }

    /// Snapshot of every baseline
    pub fn snapshot(&self) -> Vec<(String, Baseline)> {
        let mut all: Vec<_> = self
            .baselines
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn mode(&self) -> SpreadMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_observation_seeds_baseline() {
        let store = BaselineStore::new(0.1, 10.0, SpreadMode::Fixed);

        assert!(store.observe("cpu_usage", 42.0).is_none());
        assert_eq!(store.get("cpu_usage"), Some(Baseline::new(42.0, 10.0)));
    }

    #[test]
    fn test_mean_is_exponentially_smoothed() {
        let store = BaselineStore::new(0.1, 10.0, SpreadMode::Fixed);
        store.observe("cpu_usage", 50.0);

        let before = store.observe("cpu_usage", 60.0).unwrap();
        assert_eq!(before.mean, 50.0);

        let after = store.get("cpu_usage").unwrap();
        assert!((after.mean - 51.0).abs() < 1e-9);
        assert_eq!(after.spread, 10.0);
    }

    #[test]
    fn test_ewma_spread_stays_positive_for_constant_input() {
        let store = BaselineStore::new(0.1, 10.0, SpreadMode::Ewma);
        for _ in 0..100_000 {
            store.observe("latency", 5.0);
        }

        let baseline = store.get("latency").unwrap();
        assert!(baseline.spread > 0.0, "spread collapsed to {}", baseline.spread);
        assert!((baseline.mean - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_ewma_spread_grows_with_volatility() {
        let store = BaselineStore::new(0.1, 1.0, SpreadMode::Ewma);
        store.observe("latency", 100.0);
        for i in 0..200 {
            let value = if i % 2 == 0 { 50.0 } else { 150.0 };
            store.observe("latency", value);
        }
        assert!(store.get("latency").unwrap().spread > 10.0);
    }

    #[test]
    fn test_insert_rejects_non_positive_spread() {
        let store = BaselineStore::new(0.1, 10.0, SpreadMode::Fixed);
        store.insert("disk_usage", Baseline::new(10.0, 0.0));
        assert!(store.get("disk_usage").is_none());

        store.insert("disk_usage", Baseline::new(10.0, 2.0));
        assert_eq!(store.get("disk_usage").unwrap().spread, 2.0);
    }

    #[test]
    fn test_concurrent_first_observations_seed_once() {
        let store = Arc::new(BaselineStore::new(0.1, 10.0, SpreadMode::Fixed));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.observe("error_rate", i as f64).is_none())
            })
            .collect();

        let seeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|seeded| *seeded)
            .count();

        assert_eq!(seeded, 1);
        assert_eq!(store.len(), 1);
    }
}
