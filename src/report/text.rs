use std::fmt::Write;

use super::Report;
use crate::format::{format_bytes, format_duration};

pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let stats = &report.statistics;

    let _ = writeln!(out, "Host telemetry report");
    let _ = writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Snapshots:   {}", stats.snapshot_count);
    let _ = writeln!(
        out,
        "Duration:    {}",
        format_duration(stats.analysis_duration)
    );
    let _ = writeln!(
        out,
        "CPU:         avg {:.1}%  min {:.1}%  max {:.1}%",
        stats.average_cpu, stats.min_cpu, stats.max_cpu
    );
    let _ = writeln!(
        out,
        "Memory:      avg {:.1}%  min {:.1}%  max {:.1}%",
        stats.average_memory, stats.min_memory, stats.max_memory
    );
    let _ = writeln!(out, "Processes:   {}", stats.total_processes);
    let _ = writeln!(out, "Peak risk:   {}", report.peak_risk);

    if let Some(system) = &report.latest_system {
        let _ = writeln!(out);
        let _ = writeln!(out, "Latest sample");
        let _ = writeln!(
            out,
            "  Memory {} free of {}, disk {:.1}% used, up {}",
            format_bytes(system.available_memory_bytes),
            format_bytes(system.total_memory_bytes),
            system.disk_usage_percent,
            format_duration(system.system_uptime)
        );
    }
    if let Some(network) = &report.latest_network {
        let _ = writeln!(
            out,
            "  Network {} sent, {} received, {} connections",
            format_bytes(network.total_bytes_sent),
            format_bytes(network.total_bytes_received),
            network.active_connections
        );
    }

    if !report.top_processes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Top processes");
        for p in &report.top_processes {
            let _ = writeln!(
                out,
                "  {:>7}  {:<24} {:>5.1}%  {:>9}  {}",
                p.pid,
                p.name,
                p.cpu_usage_percent,
                format_bytes(p.memory_usage_bytes),
                p.user_name
            );
        }
    }

    let _ = writeln!(out);
    if report.anomalies.is_empty() {
        let _ = writeln!(out, "No anomalies detected.");
    } else {
        let _ = writeln!(out, "Anomalies ({})", report.anomalies.len());
        for record in &report.anomalies {
            let _ = writeln!(
                out,
                "  [{}] {}",
                record.timestamp.format("%H:%M:%S"),
                record.risk_level
            );
            for anomaly in &record.anomalies {
                let _ = writeln!(out, "    - {anomaly}");
            }
        }
    }
    out
}
