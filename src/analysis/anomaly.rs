use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;

use crate::system::snapshot::{ProcessSample, Snapshot};

pub const CRITICAL_USAGE_PERCENT: f64 = 95.0;
pub const HIGH_USAGE_PERCENT: f64 = 80.0;
pub const SUSPICIOUS_CPU_PERCENT: f64 = 50.0;
pub const MAX_PROCESS_COUNT: usize = 300;
pub const MAX_NETWORK_CONNECTIONS: usize = 1000;
/// Spike rules need strictly more prior snapshots than this.
pub const MIN_SPIKE_HISTORY: usize = 5;
pub const SPIKE_WINDOW: usize = 10;
pub const CPU_SPIKE_FACTOR: f64 = 2.0;
pub const CPU_SPIKE_FLOOR: f64 = 50.0;
pub const MEMORY_SPIKE_FACTOR: f64 = 1.5;
pub const MEMORY_SPIKE_FLOOR: f64 = 70.0;

const SUSPICIOUS_PATH_MARKERS: [&str; 2] = ["temp", "appdata"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// How an anomaly weighs in the risk cascade. Critical usage tiers and
/// suspicious processes are `Critical`, high usage tiers are `Warning`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    Critical,
    Warning,
    Notice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AnomalyKind {
    CpuUsage,
    MemoryUsage,
    SuspiciousProcess,
    ProcessCount,
    NetworkConnections,
    CpuSpike,
    MemorySpike,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
}

impl Anomaly {
    fn new(kind: AnomalyKind, severity: Severity, description: String) -> Self {
        Anomaly {
            kind,
            severity,
            description,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnomalyResult {
    pub anomalies: Vec<Anomaly>,
    pub risk_level: RiskLevel,
}

impl AnomalyResult {
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.anomalies
            .iter()
            .map(|a| a.description.as_str())
            .collect()
    }
}

/// Fixed-threshold rule evaluator. Holds no state: the same inputs always
/// give the same result.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnomalyDetector;

impl AnomalyDetector {
    pub fn new() -> Self {
        AnomalyDetector
    }

    /// `recent_history` must hold only snapshots taken before `current`,
    /// oldest first.
    pub fn detect<S: Borrow<Snapshot>>(
        &self,
        current: &Snapshot,
        recent_history: &[S],
    ) -> AnomalyResult {
        let info = current.system_info();
        let mut anomalies = Vec::new();

        anomalies.extend(usage_tier(
            AnomalyKind::CpuUsage,
            "CPU",
            info.cpu_usage_percent,
        ));
        anomalies.extend(usage_tier(
            AnomalyKind::MemoryUsage,
            "memory",
            info.memory_usage_percent,
        ));

        anomalies.extend(
            current
                .processes()
                .iter()
                .filter(|p| is_suspicious(p))
                .map(|p| {
                    Anomaly::new(
                        AnomalyKind::SuspiciousProcess,
                        Severity::Critical,
                        format!(
                            "Suspicious process: {} (PID {}) using {:.1}% CPU from {}",
                            p.name,
                            p.pid,
                            p.cpu_usage_percent,
                            if p.executable_path.is_empty() {
                                "an unknown location"
                            } else {
                                p.executable_path.as_str()
                            }
                        ),
                    )
                }),
        );

        if info.process_count > MAX_PROCESS_COUNT {
            anomalies.push(Anomaly::new(
                AnomalyKind::ProcessCount,
                Severity::Notice,
                format!("Excessive process count: {}", info.process_count),
            ));
        }

        let connections = current.network_info().active_connections;
        if connections > MAX_NETWORK_CONNECTIONS {
            anomalies.push(Anomaly::new(
                AnomalyKind::NetworkConnections,
                Severity::Notice,
                format!("Excessive network connections: {connections}"),
            ));
        }

        if recent_history.len() > MIN_SPIKE_HISTORY {
            anomalies.extend(spikes(current, recent_history));
        }

        let risk_level = risk_level(
            &anomalies,
            info.cpu_usage_percent,
            info.memory_usage_percent,
        );
        AnomalyResult {
            anomalies,
            risk_level,
        }
    }
}

fn usage_tier(kind: AnomalyKind, label: &str, percent: f64) -> Option<Anomaly> {
    if percent > CRITICAL_USAGE_PERCENT {
        Some(Anomaly::new(
            kind,
            Severity::Critical,
            format!("Critical {label} usage: {percent:.1}%"),
        ))
    } else if percent > HIGH_USAGE_PERCENT {
        Some(Anomaly::new(
            kind,
            Severity::Warning,
            format!("High {label} usage: {percent:.1}%"),
        ))
    } else {
        None
    }
}

fn is_suspicious(process: &ProcessSample) -> bool {
    if process.is_system_process || process.cpu_usage_percent <= SUSPICIOUS_CPU_PERCENT {
        return false;
    }
    let path = process.executable_path.to_lowercase();
    path.is_empty()
        || SUSPICIOUS_PATH_MARKERS
            .iter()
            .any(|marker| path.contains(marker))
}

fn spikes<S: Borrow<Snapshot>>(current: &Snapshot, history: &[S]) -> Vec<Anomaly> {
    let window = &history[history.len().saturating_sub(SPIKE_WINDOW)..];
    let n = window.len() as f64;
    let avg_cpu = window
        .iter()
        .map(|s| s.borrow().system_info().cpu_usage_percent)
        .sum::<f64>()
        / n;
    let avg_memory = window
        .iter()
        .map(|s| s.borrow().system_info().memory_usage_percent)
        .sum::<f64>()
        / n;

    let info = current.system_info();
    let mut found = Vec::new();
    let cpu = info.cpu_usage_percent;
    if cpu > CPU_SPIKE_FACTOR * avg_cpu && cpu > CPU_SPIKE_FLOOR {
        found.push(Anomaly::new(
            AnomalyKind::CpuSpike,
            Severity::Notice,
            format!("CPU spike detected: {cpu:.1}% vs {avg_cpu:.1}% recent average"),
        ));
    }
    let memory = info.memory_usage_percent;
    if memory > MEMORY_SPIKE_FACTOR * avg_memory && memory > MEMORY_SPIKE_FLOOR {
        found.push(Anomaly::new(
            AnomalyKind::MemorySpike,
            Severity::Notice,
            format!("Memory spike detected: {memory:.1}% vs {avg_memory:.1}% recent average"),
        ));
    }
    found
}

/// Priority cascade; the first matching level wins.
fn risk_level(anomalies: &[Anomaly], cpu: f64, memory: f64) -> RiskLevel {
    let critical = anomalies
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .count();
    let warnings = anomalies
        .iter()
        .filter(|a| a.severity == Severity::Warning)
        .count();

    if critical > 2 || (cpu > CRITICAL_USAGE_PERCENT && memory > CRITICAL_USAGE_PERCENT) {
        RiskLevel::Critical
    } else if critical > 0 || warnings > 3 {
        RiskLevel::High
    } else if warnings > 0 || anomalies.len() > 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
