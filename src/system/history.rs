use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::snapshot::Snapshot;

/// Window used for anomaly baselines and statistics.
pub const ANALYSIS_CAPACITY: usize = 1000;
/// Window used for report accumulation.
pub const REPORT_CAPACITY: usize = 5000;
/// Entries reserved up front; larger histories grow on demand.
const PREALLOCATED_ENTRIES: usize = 1024;

/// Thread-safe FIFO with a fixed capacity. The oldest entry is evicted once
/// the capacity is reached; insertion order is preserved.
#[derive(Debug)]
pub struct BoundedHistory<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

pub type SnapshotHistory = BoundedHistory<Arc<Snapshot>>;

impl<T: Clone> BoundedHistory<T> {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be greater than zero");
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(PREALLOCATED_ENTRIES))),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, entry: T) {
        let mut entries = self.entries();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Copy of every entry, oldest first. The lock is released before the
    /// caller sees the result.
    pub fn copy_all(&self) -> Vec<T> {
        self.entries().iter().cloned().collect()
    }

    /// Copy of the newest `n` entries, oldest first.
    pub fn copy_recent(&self, n: usize) -> Vec<T> {
        let entries = self.entries();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<T> {
        self.entries().back().cloned()
    }

    pub fn count(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
