use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisEngine, AnomalyResult};
use crate::report::ReportAccumulator;
use crate::system::snapshot::Snapshot;

#[derive(Clone, Debug)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// Stop once this much time has passed.
    pub duration: Option<Duration>,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Processes listed at debug level each tick.
    pub show_top: usize,
}

impl MonitorSettings {
    pub fn new(interval: Duration) -> Self {
        MonitorSettings {
            interval,
            duration: None,
            max_ticks: None,
            show_top: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub anomalous_ticks: u64,
}

/// Drive the engine once per interval until `shutdown` flips to `true` (or
/// its sender is dropped), the duration elapses, or `max_ticks` is reached.
///
/// Shutdown is only observed between ticks; a snapshot in flight finishes
/// first. A tick whose collection fails is logged and skipped.
pub async fn run(
    engine: &AnalysisEngine,
    report: &ReportAccumulator,
    settings: &MonitorSettings,
    mut shutdown: watch::Receiver<bool>,
) -> RunSummary {
    let started = Instant::now();
    let mut interval = tokio::time::interval(settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut summary = RunSummary::default();

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow_and_update() {
                    break;
                }
                continue;
            }
        }

        if settings
            .duration
            .is_some_and(|limit| started.elapsed() >= limit)
        {
            break;
        }
        if settings.max_ticks.is_some_and(|max| summary.ticks >= max) {
            break;
        }

        summary.ticks += 1;
        match engine.take_snapshot().await {
            Ok(snapshot) => {
                let result = engine.detect_anomalies(&snapshot);
                report.record(&snapshot, &result);
                log_tick(summary.ticks, &snapshot, &result, settings.show_top);
                if result.has_anomalies() {
                    summary.anomalous_ticks += 1;
                }
            }
            Err(err) => {
                summary.failed_ticks += 1;
                warn!(tick = summary.ticks, error = %err, "snapshot failed, skipping tick");
            }
        }
    }

    info!(
        ticks = summary.ticks,
        failed = summary.failed_ticks,
        anomalous = summary.anomalous_ticks,
        "monitoring stopped"
    );
    summary
}

fn log_tick(tick: u64, snapshot: &Snapshot, result: &AnomalyResult, show_top: usize) {
    let system = snapshot.system_info();
    info!(
        tick,
        cpu = system.cpu_usage_percent,
        memory = system.memory_usage_percent,
        disk = system.disk_usage_percent,
        processes = system.process_count,
        connections = snapshot.network_info().active_connections,
        risk = %result.risk_level,
        "snapshot"
    );
    for anomaly in &result.anomalies {
        warn!(tick, risk = %result.risk_level, "{anomaly}");
    }
    for p in snapshot.top_processes(show_top) {
        debug!(
            pid = p.pid,
            name = %p.name,
            cpu = p.cpu_usage_percent,
            memory = p.memory_usage_bytes,
            "top process"
        );
    }
}
