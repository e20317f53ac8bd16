use std::sync::Arc;

use tracing::debug;

use super::anomaly::{AnomalyDetector, AnomalyResult};
use super::statistics::{Statistics, StatisticsAggregator};
use crate::system::collector::SnapshotCollector;
use crate::system::error::CollectionError;
use crate::system::history::{ANALYSIS_CAPACITY, SnapshotHistory};
use crate::system::snapshot::Snapshot;

/// Entry point for the tick loop: collect, remember, analyse.
pub struct AnalysisEngine {
    collector: SnapshotCollector,
    history: SnapshotHistory,
    detector: AnomalyDetector,
    aggregator: StatisticsAggregator,
}

impl AnalysisEngine {
    pub fn new(collector: SnapshotCollector) -> Self {
        Self::with_capacity(collector, ANALYSIS_CAPACITY)
    }

    pub fn with_capacity(collector: SnapshotCollector, capacity: usize) -> Self {
        AnalysisEngine {
            collector,
            history: SnapshotHistory::new(capacity),
            detector: AnomalyDetector::new(),
            aggregator: StatisticsAggregator,
        }
    }

    /// Collect a snapshot and append it to the history. Nothing is appended
    /// when collection fails.
    #[tracing::instrument(name = "engine.take_snapshot", skip_all)]
    pub async fn take_snapshot(&self) -> Result<Arc<Snapshot>, CollectionError> {
        let snapshot = Arc::new(self.collector.collect().await?);
        self.history.append(Arc::clone(&snapshot));
        debug!(
            processes = snapshot.processes().len(),
            history = self.history.count(),
            "snapshot recorded"
        );
        Ok(snapshot)
    }

    /// Evaluate `snapshot` against the snapshots recorded before it. The
    /// history is copied under its lock; rules run on the copy.
    pub fn detect_anomalies(&self, snapshot: &Arc<Snapshot>) -> AnomalyResult {
        let prior: Vec<Arc<Snapshot>> = self
            .history
            .copy_all()
            .into_iter()
            .take_while(|s| !Arc::ptr_eq(s, snapshot))
            .collect();
        self.detector.detect(snapshot, &prior)
    }

    pub fn statistics(&self) -> Statistics {
        self.aggregator.compute(&self.history.copy_all())
    }

    pub fn snapshot_count(&self) -> usize {
        self.history.count()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.history.latest()
    }
}
