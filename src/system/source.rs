//! Capabilities the sampling pipeline consumes. The sysinfo-backed
//! implementation lives in `probe`; tests plug in their own.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::{CollectionError, ReadError};
use super::snapshot::NetworkConnection;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryTotals {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Host-wide counters. Every reading is independently fallible.
pub trait MetricsSource: Send + Sync {
    fn cpu_percent(&self) -> Result<f64, ReadError>;
    fn memory_percent(&self) -> Result<f64, ReadError>;
    fn disk_percent(&self) -> Result<f64, ReadError>;
    fn memory_totals(&self) -> Result<MemoryTotals, ReadError>;
    fn uptime(&self) -> Result<Duration, ReadError>;
}

/// Process table access. Only `list_processes` is structural; each
/// per-process accessor may fail on its own.
pub trait ProcessEnumerator: Send + Sync {
    /// Refresh the process table and return the live pids.
    fn list_processes(&self) -> Result<Vec<u32>, CollectionError>;
    fn name(&self, pid: u32) -> Result<String, ReadError>;
    fn executable_path(&self, pid: u32) -> Result<String, ReadError>;
    /// Cumulative CPU time consumed since the process started.
    fn cpu_time(&self, pid: u32) -> Result<Duration, ReadError>;
    fn working_set_bytes(&self, pid: u32) -> Result<u64, ReadError>;
    fn thread_count(&self, pid: u32) -> Result<u32, ReadError>;
    fn start_time(&self, pid: u32) -> Result<DateTime<Utc>, ReadError>;
    fn priority(&self, pid: u32) -> Result<i32, ReadError>;
    fn owner(&self, pid: u32) -> Result<String, ReadError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkTraffic {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

pub trait NetworkProbe: Send + Sync {
    fn traffic(&self) -> Result<NetworkTraffic, CollectionError>;
    fn connections(&self) -> Result<Vec<NetworkConnection>, CollectionError>;
}
