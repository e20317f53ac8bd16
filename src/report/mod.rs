//! Accumulates snapshots and anomaly results across a run and renders the
//! final report.

mod json;
mod text;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use json::render_json;
pub use text::render_text;

use crate::analysis::{AnomalyResult, RiskLevel, Statistics, StatisticsAggregator};
use crate::config::ConfigError;
use crate::system::history::{BoundedHistory, REPORT_CAPACITY, SnapshotHistory};
use crate::system::snapshot::{NetworkInfo, ProcessSample, Snapshot, SystemInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(ConfigError::ReportFormat(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub anomalies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub statistics: Statistics,
    pub peak_risk: RiskLevel,
    pub latest_system: Option<SystemInfo>,
    pub latest_network: Option<NetworkInfo>,
    pub top_processes: Vec<ProcessSample>,
    pub anomalies: Vec<AnomalyRecord>,
}

/// Report-side history, independent of the engine's analysis window.
pub struct ReportAccumulator {
    snapshots: SnapshotHistory,
    anomalies: BoundedHistory<AnomalyRecord>,
}

impl Default for ReportAccumulator {
    fn default() -> Self {
        Self::new(REPORT_CAPACITY)
    }
}

impl ReportAccumulator {
    pub fn new(capacity: usize) -> Self {
        ReportAccumulator {
            snapshots: SnapshotHistory::new(capacity),
            anomalies: BoundedHistory::new(capacity),
        }
    }

    /// Keep the snapshot; keep the anomaly result only when something fired.
    pub fn record(&self, snapshot: &Arc<Snapshot>, result: &AnomalyResult) {
        self.snapshots.append(Arc::clone(snapshot));
        if result.has_anomalies() {
            self.anomalies.append(AnomalyRecord {
                timestamp: snapshot.timestamp(),
                risk_level: result.risk_level,
                anomalies: result
                    .anomalies
                    .iter()
                    .map(|a| a.description.clone())
                    .collect(),
            });
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.count()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.count()
    }

    pub fn build(&self, top: usize) -> Report {
        let snapshots = self.snapshots.copy_all();
        let anomalies = self.anomalies.copy_all();
        let latest = snapshots.last();

        Report {
            generated_at: Utc::now(),
            statistics: StatisticsAggregator.compute(&snapshots),
            peak_risk: anomalies
                .iter()
                .map(|record| record.risk_level)
                .max()
                .unwrap_or_default(),
            latest_system: latest.map(|s| s.system_info().clone()),
            latest_network: latest.map(|s| s.network_info().clone()),
            top_processes: latest
                .map(|s| s.top_processes(top).to_vec())
                .unwrap_or_default(),
            anomalies,
        }
    }
}

pub fn render(report: &Report, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => render_json(report),
    }
}
