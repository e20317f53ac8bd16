use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::percent::{clamp_percent, round_to_1};

/// Wall time below which a delta is treated as noise.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug)]
struct CpuBaseline {
    cpu_time: Duration,
    measured_at: Instant,
}

/// Turns cumulative per-process CPU time into a usage percentage by
/// comparing against the previous observation of the same pid.
#[derive(Debug, Default)]
pub struct ProcessCpuTracker {
    baselines: Mutex<HashMap<u32, CpuBaseline>>,
}

impl ProcessCpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn baselines(&self) -> MutexGuard<'_, HashMap<u32, CpuBaseline>> {
        self.baselines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First observation of a pid records a baseline and yields 0.0. Later
    /// observations less than `MIN_SAMPLE_INTERVAL` apart also yield 0.0 and
    /// leave the baseline untouched.
    pub fn compute(&self, pid: u32, cpu_time: Duration, now: Instant) -> f64 {
        let mut baselines = self.baselines();
        let Some(baseline) = baselines.get_mut(&pid) else {
            baselines.insert(
                pid,
                CpuBaseline {
                    cpu_time,
                    measured_at: now,
                },
            );
            return 0.0;
        };

        let wall = now.saturating_duration_since(baseline.measured_at);
        if wall < MIN_SAMPLE_INTERVAL {
            return 0.0;
        }

        let cpu_delta = cpu_time.saturating_sub(baseline.cpu_time);
        let percent = round_to_1(clamp_percent(
            cpu_delta.as_secs_f64() / wall.as_secs_f64() * 100.0,
        ));
        *baseline = CpuBaseline {
            cpu_time,
            measured_at: now,
        };
        percent
    }

    /// Drop the baseline for a pid whose CPU time could not be read.
    pub fn forget(&self, pid: u32) {
        self.baselines().remove(&pid);
    }

    /// Keep only baselines for pids present in the latest enumeration.
    pub fn retain(&self, alive: &HashSet<u32>) {
        self.baselines().retain(|pid, _| alive.contains(pid));
    }

    pub fn tracked(&self) -> usize {
        self.baselines().len()
    }

    pub fn is_tracking(&self, pid: u32) -> bool {
        self.baselines().contains_key(&pid)
    }
}
