pub mod anomaly;
pub mod engine;
pub mod statistics;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalyResult, RiskLevel};
pub use engine::AnalysisEngine;
pub use statistics::{Statistics, StatisticsAggregator};
