//! Fixed-capacity history buffers
//!
//! Anomalies, actions, outcomes, forecasts and queries are retained for
//! inspection in bounded FIFO buffers: once full, the oldest entry is evicted.
//! The whole buffer sits behind one lock, so a reader always sees a
//! consistent snapshot.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Thread-safe ring buffer with oldest-first eviction
#[derive(Debug)]
pub struct BoundedHistory<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    /// Create a buffer holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(10_000))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panic while holding the lock cannot leave a VecDeque half-modified
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry, evicting the oldest one when at capacity
    pub fn push(&self, entry: T) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Append several entries in order under a single lock
    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) {
        let mut entries = self.lock();
        for entry in items {
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// The most recent `n` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<T> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<T> {
        self.lock().back().cloned()
    }

    /// Copy of every retained entry, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }

    /// Count entries matching a predicate without cloning them
    pub fn count_where<F: Fn(&T) -> bool>(&self, predicate: F) -> usize {
        self.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
