use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Connections kept per snapshot. `NetworkInfo::active_connections` still
/// counts all of them.
pub const MAX_RECORDED_CONNECTIONS: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SystemInfo {
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub disk_usage_percent: f64,
    pub process_count: usize,
    pub system_uptime: Duration,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub executable_path: String,
    pub cpu_usage_percent: f64,
    pub memory_usage_bytes: u64,
    pub thread_count: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub priority: i32,
    pub user_name: String,
    pub is_system_process: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkConnection {
    pub local_endpoint: String,
    pub remote_endpoint: String,
    pub protocol: Protocol,
    pub state: String,
    pub pid: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NetworkInfo {
    pub total_bytes_sent: u64,
    pub total_bytes_received: u64,
    pub active_connections: usize,
    pub connections: Vec<NetworkConnection>,
}

impl NetworkInfo {
    /// Build from a full connection listing, keeping only the first
    /// `MAX_RECORDED_CONNECTIONS` entries.
    pub fn new(
        total_bytes_sent: u64,
        total_bytes_received: u64,
        mut connections: Vec<NetworkConnection>,
    ) -> Self {
        let active_connections = connections.len();
        connections.truncate(MAX_RECORDED_CONNECTIONS);
        NetworkInfo {
            total_bytes_sent,
            total_bytes_received,
            active_connections,
            connections,
        }
    }
}

/// One atomic capture of system, process and network state.
///
/// Never mutated after construction; share it behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    timestamp: DateTime<Utc>,
    system_info: SystemInfo,
    processes: Vec<ProcessSample>,
    network_info: NetworkInfo,
}

impl Snapshot {
    /// Processes are reordered by CPU descending, then memory descending.
    pub fn new(
        timestamp: DateTime<Utc>,
        system_info: SystemInfo,
        mut processes: Vec<ProcessSample>,
        network_info: NetworkInfo,
    ) -> Self {
        sort_processes(&mut processes);
        Snapshot {
            timestamp,
            system_info,
            processes,
            network_info,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn system_info(&self) -> &SystemInfo {
        &self.system_info
    }

    pub fn processes(&self) -> &[ProcessSample] {
        &self.processes
    }

    pub fn network_info(&self) -> &NetworkInfo {
        &self.network_info
    }

    pub fn top_processes(&self, n: usize) -> &[ProcessSample] {
        &self.processes[..n.min(self.processes.len())]
    }
}

pub fn sort_processes(processes: &mut [ProcessSample]) {
    processes.sort_by(|a, b| {
        b.cpu_usage_percent
            .total_cmp(&a.cpu_usage_percent)
            .then_with(|| b.memory_usage_bytes.cmp(&a.memory_usage_bytes))
    });
}
