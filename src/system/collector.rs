use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::spawn_blocking;
use tracing::{debug, trace, warn};

use super::cpu_tracker::ProcessCpuTracker;
use super::error::{CollectionError, ReadError, Reading};
use super::snapshot::{NetworkInfo, ProcessSample, Snapshot, SystemInfo};
use super::source::{MemoryTotals, MetricsSource, NetworkProbe, ProcessEnumerator};
use crate::percent::clamp_percent;

pub const UNKNOWN: &str = "Unknown";
pub const PATH_UNKNOWN: &str = "unknown";
pub const PATH_ACCESS_DENIED: &str = "access-denied";

const SYSTEM_ACCOUNTS: [&str; 3] = ["SYSTEM", "LOCAL SERVICE", "NETWORK SERVICE"];
const SYSTEM_PATH_PREFIXES: [&str; 6] = [
    "c:\\windows\\",
    "/sbin/",
    "/usr/sbin/",
    "/usr/lib/systemd/",
    "/lib/systemd/",
    "/system/library/",
];

/// Last good host readings, substituted when a counter read fails so a
/// transient glitch does not look like a drop to zero.
#[derive(Debug, Default)]
struct LastKnown {
    cpu: f64,
    memory: f64,
    disk: f64,
    totals: MemoryTotals,
    uptime: Duration,
}

/// Collects one `Snapshot` per call by running system, process and network
/// collection concurrently.
pub struct SnapshotCollector {
    metrics: Arc<dyn MetricsSource>,
    processes: Arc<dyn ProcessEnumerator>,
    network: Arc<dyn NetworkProbe>,
    tracker: Arc<ProcessCpuTracker>,
    last_known: Arc<Mutex<LastKnown>>,
    connections_warned: Arc<AtomicBool>,
}

impl SnapshotCollector {
    pub fn new(
        metrics: Arc<dyn MetricsSource>,
        processes: Arc<dyn ProcessEnumerator>,
        network: Arc<dyn NetworkProbe>,
    ) -> Self {
        SnapshotCollector {
            metrics,
            processes,
            network,
            tracker: Arc::new(ProcessCpuTracker::new()),
            last_known: Arc::new(Mutex::new(LastKnown::default())),
            connections_warned: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use one value for all three capabilities.
    pub fn from_source<S>(source: Arc<S>) -> Self
    where
        S: MetricsSource + ProcessEnumerator + NetworkProbe + 'static,
    {
        Self::new(source.clone(), source.clone(), source)
    }

    /// Number of pids with a CPU baseline.
    pub fn tracked_processes(&self) -> usize {
        self.tracker.tracked()
    }

    /// Fails only when process enumeration fails. Failed traffic counters
    /// degrade to an empty `NetworkInfo`; a failed connection listing only
    /// empties the connection list.
    #[tracing::instrument(name = "collector.collect", skip_all)]
    pub async fn collect(&self) -> Result<Snapshot, CollectionError> {
        let timestamp = Utc::now();

        let system_task = {
            let metrics = Arc::clone(&self.metrics);
            let last_known = Arc::clone(&self.last_known);
            spawn_blocking(move || read_system_info(metrics.as_ref(), &last_known))
        };
        let process_task = {
            let processes = Arc::clone(&self.processes);
            let tracker = Arc::clone(&self.tracker);
            spawn_blocking(move || sample_processes(processes.as_ref(), &tracker))
        };
        let network_task = {
            let network = Arc::clone(&self.network);
            let warned = Arc::clone(&self.connections_warned);
            spawn_blocking(move || read_network(network.as_ref(), &warned))
        };

        let (system, processes, network) = tokio::join!(system_task, process_task, network_task);

        let mut system_info = system?;
        let processes = processes??;
        let network_info = match network {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                warn!(error = %err, "network collection failed, recording empty network info");
                NetworkInfo::default()
            }
            Err(err) => {
                warn!(error = %err, "network collection task aborted, recording empty network info");
                NetworkInfo::default()
            }
        };

        system_info.process_count = processes.len();
        Ok(Snapshot::new(
            timestamp,
            system_info,
            processes,
            network_info,
        ))
    }
}

fn read_system_info(metrics: &dyn MetricsSource, last_known: &Mutex<LastKnown>) -> SystemInfo {
    let mut last = last_known.lock().unwrap_or_else(PoisonError::into_inner);

    last.cpu = fallback("cpu", metrics.cpu_percent().map(clamp_percent), last.cpu);
    last.memory = fallback(
        "memory",
        metrics.memory_percent().map(clamp_percent),
        last.memory,
    );
    last.disk = fallback("disk", metrics.disk_percent().map(clamp_percent), last.disk);
    last.totals = fallback("memory_totals", metrics.memory_totals(), last.totals);
    last.uptime = fallback("uptime", metrics.uptime(), last.uptime);

    SystemInfo {
        cpu_usage_percent: last.cpu,
        memory_usage_percent: last.memory,
        total_memory_bytes: last.totals.total_bytes,
        available_memory_bytes: last.totals.available_bytes,
        disk_usage_percent: last.disk,
        process_count: 0,
        system_uptime: last.uptime,
    }
}

fn fallback<T: Copy>(counter: &'static str, result: Result<T, ReadError>, last: T) -> T {
    let reading = Reading::from_result(result, |_| last);
    if let Some(reason) = reading.reason() {
        warn!(counter, %reason, "counter read failed, keeping last known value");
    }
    reading.into_value()
}

fn read_network(
    network: &dyn NetworkProbe,
    warned: &AtomicBool,
) -> Result<NetworkInfo, CollectionError> {
    let traffic = network.traffic()?;
    let connections = network.connections().unwrap_or_else(|err| {
        if warned.swap(true, Ordering::Relaxed) {
            debug!(error = %err, "connection listing unavailable");
        } else {
            warn!(error = %err, "connection listing unavailable, recording traffic totals only");
        }
        Vec::new()
    });
    Ok(NetworkInfo::new(
        traffic.bytes_sent,
        traffic.bytes_received,
        connections,
    ))
}

/// Enumerate and sample every process, then prune CPU baselines of pids
/// that are gone.
fn sample_processes(
    enumerator: &dyn ProcessEnumerator,
    tracker: &ProcessCpuTracker,
) -> Result<Vec<ProcessSample>, CollectionError> {
    let pids = enumerator.list_processes()?;
    let now = Instant::now();

    let samples: Vec<ProcessSample> = pids
        .iter()
        .filter_map(|&pid| sample_process(enumerator, tracker, pid, now))
        .collect();

    let alive: HashSet<u32> = pids.into_iter().collect();
    tracker.retain(&alive);
    Ok(samples)
}

/// `None` when the process exited after enumeration.
fn sample_process(
    enumerator: &dyn ProcessEnumerator,
    tracker: &ProcessCpuTracker,
    pid: u32,
    now: Instant,
) -> Option<ProcessSample> {
    let name = match enumerator.name(pid) {
        Err(ReadError::Exited) => {
            tracker.forget(pid);
            return None;
        }
        result => settle(pid, "name", Reading::from_result(result, |_| UNKNOWN.to_string())),
    };

    let cpu_usage_percent = match enumerator.cpu_time(pid) {
        Ok(cpu_time) => tracker.compute(pid, cpu_time, now),
        Err(ReadError::Exited) => {
            tracker.forget(pid);
            return None;
        }
        Err(reason) => {
            trace!(pid, %reason, "cpu time unreadable");
            tracker.forget(pid);
            0.0
        }
    };

    let executable_path = settle(
        pid,
        "executable_path",
        Reading::from_result(enumerator.executable_path(pid), |reason| match reason {
            ReadError::AccessDenied => PATH_ACCESS_DENIED.to_string(),
            _ => PATH_UNKNOWN.to_string(),
        }),
    );
    let memory_usage_bytes = settle(
        pid,
        "working_set",
        Reading::from_result(enumerator.working_set_bytes(pid), |_| 0),
    );
    let thread_count = settle(
        pid,
        "thread_count",
        Reading::from_result(enumerator.thread_count(pid), |_| 0),
    );
    let priority = settle(
        pid,
        "priority",
        Reading::from_result(enumerator.priority(pid), |_| 0),
    );
    let user_name = settle(
        pid,
        "owner",
        Reading::from_result(enumerator.owner(pid), |_| UNKNOWN.to_string()),
    );
    let start_time = enumerator.start_time(pid).ok();

    let is_system_process = is_system_process(pid, &executable_path, &user_name);
    Some(ProcessSample {
        pid,
        name,
        executable_path,
        cpu_usage_percent,
        memory_usage_bytes,
        thread_count,
        start_time,
        priority,
        user_name,
        is_system_process,
    })
}

fn settle<T>(pid: u32, field: &'static str, reading: Reading<T>) -> T {
    if let Some(reason) = reading.reason() {
        trace!(pid, field, %reason, "substituted default");
    }
    reading.into_value()
}

/// Kernel and service-manager processes: the lowest pids, built-in service
/// accounts, or binaries under the OS's own directories.
pub fn is_system_process(pid: u32, executable_path: &str, user_name: &str) -> bool {
    if pid <= 4 {
        return true;
    }
    if SYSTEM_ACCOUNTS
        .iter()
        .any(|account| user_name.eq_ignore_ascii_case(account))
    {
        return true;
    }
    let path = executable_path.to_ascii_lowercase();
    SYSTEM_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::snapshot::NetworkConnection;
    use crate::system::source::NetworkTraffic;

    #[test]
    fn system_process_detection() {
        assert!(is_system_process(1, "/usr/bin/whatever", "alice"));
        assert!(is_system_process(900, "", "NETWORK SERVICE"));
        assert!(is_system_process(
            900,
            "C:\\Windows\\System32\\svchost.exe",
            "alice"
        ));
        assert!(is_system_process(900, "/usr/lib/systemd/systemd-journald", "root"));
        assert!(!is_system_process(900, "/home/alice/bin/tool", "alice"));
        assert!(!is_system_process(900, PATH_ACCESS_DENIED, UNKNOWN));
    }

    struct CountersOnly;

    impl NetworkProbe for CountersOnly {
        fn traffic(&self) -> Result<NetworkTraffic, CollectionError> {
            Ok(NetworkTraffic {
                bytes_sent: 7,
                bytes_received: 9,
            })
        }

        fn connections(&self) -> Result<Vec<NetworkConnection>, CollectionError> {
            Err(CollectionError::Network("no listing".to_string()))
        }
    }

    #[test]
    fn missing_connection_listing_keeps_traffic() {
        let warned = AtomicBool::new(false);
        for _ in 0..2 {
            let info = read_network(&CountersOnly, &warned).unwrap();
            assert_eq!(info.total_bytes_sent, 7);
            assert_eq!(info.total_bytes_received, 9);
            assert_eq!(info.active_connections, 0);
        }
        assert!(warned.load(Ordering::Relaxed));
    }

    #[test]
    fn fallback_keeps_last_value_on_error() {
        let value = fallback("cpu", Err(ReadError::AccessDenied), 42.0);
        assert_eq!(value, 42.0);
        let value = fallback("cpu", Ok(13.0), 42.0);
        assert_eq!(value, 13.0);
    }
}
