use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use hostwatch::analysis::AnalysisEngine;
use hostwatch::config::{Config, load_config, load_config_from_path};
use hostwatch::logging;
use hostwatch::monitor::{self, MonitorSettings};
use hostwatch::report::{self, ReportAccumulator};
use hostwatch::system::collector::SnapshotCollector;
use hostwatch::system::probe::SysinfoProbe;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "hostwatch",
    about = "Periodic host telemetry with anomaly detection"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling interval in seconds (1-3600)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Stop after this many seconds (0 runs until Ctrl-C)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Write the final report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format: text, json
    #[arg(long)]
    format: Option<String>,

    /// Number of top processes to include in logs and the report
    #[arg(long)]
    top: Option<usize>,

    /// Log filter, e.g. info, debug, hostwatch=trace
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (config, parse_error) = load_config_for_cli(&cli);
    logging::init(&config.logging.level, config.logging.json)?;
    if let Some(err) = parse_error {
        warn!(error = %err, "invalid config, using defaults");
    }
    config.validate().map_err(|e| eyre!("invalid configuration: {e}"))?;
    let format = config.report_format()?;

    let probe = Arc::new(SysinfoProbe::new());
    let engine = AnalysisEngine::with_capacity(
        SnapshotCollector::from_source(probe),
        config.history.analysis_capacity,
    );
    let accumulator = ReportAccumulator::new(config.history.report_capacity);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current tick");
            let _ = shutdown_tx.send(true);
        }
    });

    let settings = MonitorSettings {
        interval: config.interval(),
        duration: config.duration(),
        max_ticks: None,
        show_top: config.general.show_top,
    };
    info!(
        interval_secs = config.general.interval_secs,
        duration_secs = config.general.duration_secs,
        "monitoring started"
    );
    let summary = monitor::run(&engine, &accumulator, &settings, shutdown_rx).await;
    if summary.ticks > 0 && summary.failed_ticks == summary.ticks {
        warn!("every tick failed; report will be empty");
    }

    let rendered = report::render(&accumulator.build(config.general.show_top), format)?;
    match config.output_path() {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> (Config, Option<toml::de::Error>) {
    let (mut config, parse_error) = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(interval) = cli.interval {
        config.general.interval_secs = interval;
    }
    if let Some(duration) = cli.duration {
        config.general.duration_secs = duration;
    }
    if let Some(top) = cli.top {
        config.general.show_top = top;
    }
    if let Some(ref output) = cli.output {
        config.report.output = output.to_string_lossy().to_string();
    }
    if let Some(ref format) = cli.format {
        config.report.format = format.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    (config, parse_error)
}
