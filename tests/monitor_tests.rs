mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeHost, collector_for};
use hostwatch::analysis::{AnalysisEngine, RiskLevel};
use hostwatch::monitor::{self, MonitorSettings, RunSummary};
use hostwatch::report::ReportAccumulator;
use tokio::sync::watch;

fn fast_settings(max_ticks: u64) -> MonitorSettings {
    MonitorSettings {
        max_ticks: Some(max_ticks),
        ..MonitorSettings::new(Duration::from_millis(10))
    }
}

#[tokio::test]
async fn runs_until_tick_limit() {
    let host = Arc::new(FakeHost::default());
    host.push_cpu(Ok(20.0));
    host.push_cpu(Ok(97.0));
    let engine = AnalysisEngine::new(collector_for(&host));
    let report = ReportAccumulator::new(16);
    let (_tx, rx) = watch::channel(false);

    let summary = monitor::run(&engine, &report, &fast_settings(4), rx).await;

    assert_eq!(
        summary,
        RunSummary {
            ticks: 4,
            failed_ticks: 0,
            anomalous_ticks: 1,
        }
    );
    assert_eq!(engine.snapshot_count(), 4);
    assert_eq!(report.snapshot_count(), 4);
    assert_eq!(report.anomaly_count(), 1);
    assert_eq!(report.build(3).peak_risk, RiskLevel::High);
}

#[tokio::test]
async fn failed_ticks_are_counted_and_skipped() {
    let host = Arc::new(FakeHost::default());
    host.fail_enumeration("access denied");
    let engine = AnalysisEngine::new(collector_for(&host));
    let report = ReportAccumulator::new(16);
    let (_tx, rx) = watch::channel(false);

    let summary = monitor::run(&engine, &report, &fast_settings(3), rx).await;

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.failed_ticks, 3);
    assert_eq!(engine.snapshot_count(), 0);
    assert_eq!(report.snapshot_count(), 0);
}

#[tokio::test]
async fn shutdown_signal_stops_the_loop() {
    let host = Arc::new(FakeHost::default());
    let engine = AnalysisEngine::new(collector_for(&host));
    let report = ReportAccumulator::new(16);
    let (tx, rx) = watch::channel(false);
    let settings = MonitorSettings::new(Duration::from_millis(20));

    let stopper = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
    };
    let (summary, ()) = tokio::join!(monitor::run(&engine, &report, &settings, rx), stopper);

    assert!(summary.ticks >= 1);
    assert_eq!(summary.failed_ticks, 0);
    assert_eq!(engine.snapshot_count() as u64, summary.ticks);
}

#[tokio::test]
async fn already_signalled_shutdown_runs_no_ticks() {
    let host = Arc::new(FakeHost::default());
    let engine = AnalysisEngine::new(collector_for(&host));
    let report = ReportAccumulator::new(16);
    let (_tx, rx) = watch::channel(true);

    let summary = monitor::run(&engine, &report, &fast_settings(5), rx).await;
    assert_eq!(summary, RunSummary::default());
}

#[tokio::test]
async fn dropped_sender_stops_the_loop() {
    let host = Arc::new(FakeHost::default());
    let engine = AnalysisEngine::new(collector_for(&host));
    let report = ReportAccumulator::new(16);
    let (tx, rx) = watch::channel(false);
    drop(tx);

    let settings = MonitorSettings::new(Duration::from_secs(60));
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        monitor::run(&engine, &report, &settings, rx),
    )
    .await
    .expect("loop should stop once the sender is gone");

    // The first interval tick completes immediately, so at most one tick runs.
    assert!(summary.ticks <= 1);
}

#[tokio::test]
async fn duration_limit_ends_the_run() {
    let host = Arc::new(FakeHost::default());
    let engine = AnalysisEngine::new(collector_for(&host));
    let report = ReportAccumulator::new(64);
    let (_tx, rx) = watch::channel(false);
    let settings = MonitorSettings {
        duration: Some(Duration::from_millis(100)),
        ..MonitorSettings::new(Duration::from_millis(10))
    };

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        monitor::run(&engine, &report, &settings, rx),
    )
    .await
    .expect("duration limit should end the run");

    assert!(summary.ticks >= 1);
}
