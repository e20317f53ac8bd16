use std::borrow::Borrow;
use std::time::Duration;

use serde::Serialize;

use crate::system::snapshot::Snapshot;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub snapshot_count: usize,
    pub analysis_duration: Duration,
    pub average_cpu: f64,
    pub max_cpu: f64,
    pub min_cpu: f64,
    pub average_memory: f64,
    pub max_memory: f64,
    pub min_memory: f64,
    /// Process count of the newest snapshot.
    pub total_processes: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StatisticsAggregator;

impl StatisticsAggregator {
    /// Min/avg/max of CPU and memory over `history` (oldest first). Empty
    /// history gives an all-zero record.
    pub fn compute<S: Borrow<Snapshot>>(&self, history: &[S]) -> Statistics {
        let (Some(first), Some(last)) = (history.first(), history.last()) else {
            return Statistics::default();
        };
        let first = first.borrow();
        let last = last.borrow();

        let cpu = Series::from_values(
            history
                .iter()
                .map(|s| s.borrow().system_info().cpu_usage_percent),
        );
        let memory = Series::from_values(
            history
                .iter()
                .map(|s| s.borrow().system_info().memory_usage_percent),
        );

        Statistics {
            snapshot_count: history.len(),
            // Clock steps backwards collapse to zero.
            analysis_duration: (last.timestamp() - first.timestamp())
                .to_std()
                .unwrap_or_default(),
            average_cpu: cpu.average(),
            max_cpu: cpu.max,
            min_cpu: cpu.min,
            average_memory: memory.average(),
            max_memory: memory.max,
            min_memory: memory.min,
            total_processes: last.system_info().process_count,
        }
    }
}

struct Series {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl Series {
    fn from_values(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Series {
                sum: 0.0,
                count: 0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |acc, v| Series {
                sum: acc.sum + v,
                count: acc.count + 1,
                min: acc.min.min(v),
                max: acc.max.max(v),
            },
        )
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}
