#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hostwatch::system::collector::SnapshotCollector;
use hostwatch::system::error::{CollectionError, ReadError};
use hostwatch::system::snapshot::{NetworkConnection, Protocol};
use hostwatch::system::source::{
    MemoryTotals, MetricsSource, NetworkProbe, NetworkTraffic, ProcessEnumerator,
};

#[derive(Clone, Debug)]
pub struct FakeProcess {
    pub pid: u32,
    pub name: String,
    pub path: Result<String, ReadError>,
    pub cpu_time: Result<Duration, ReadError>,
    pub memory: u64,
    /// Listed by the enumeration but gone by the time details are read.
    pub vanished: bool,
}

pub fn proc(pid: u32, name: &str, cpu_ms: u64, memory: u64) -> FakeProcess {
    FakeProcess {
        pid,
        name: name.to_string(),
        path: Ok(format!("/opt/{name}/bin/{name}")),
        cpu_time: Ok(Duration::from_millis(cpu_ms)),
        memory,
        vanished: false,
    }
}

/// Scriptable stand-in for the host: metrics readings are consumed from
/// queues (falling back to `default_*` when empty), the process table and
/// network behaviour can be swapped between ticks.
pub struct FakeHost {
    cpu: Mutex<VecDeque<Result<f64, ReadError>>>,
    memory: Mutex<VecDeque<Result<f64, ReadError>>>,
    disk: Mutex<VecDeque<Result<f64, ReadError>>>,
    default_cpu: f64,
    default_memory: f64,
    processes: Mutex<Result<Vec<FakeProcess>, String>>,
    network_fails: Mutex<bool>,
    listing_fails: Mutex<bool>,
    connections: Mutex<usize>,
}

impl Default for FakeHost {
    fn default() -> Self {
        FakeHost {
            cpu: Mutex::new(VecDeque::new()),
            memory: Mutex::new(VecDeque::new()),
            disk: Mutex::new(VecDeque::new()),
            default_cpu: 10.0,
            default_memory: 30.0,
            processes: Mutex::new(Ok(vec![proc(100, "init", 0, 4096)])),
            network_fails: Mutex::new(false),
            listing_fails: Mutex::new(false),
            connections: Mutex::new(3),
        }
    }
}

impl FakeHost {
    pub fn push_cpu(&self, reading: Result<f64, ReadError>) {
        self.cpu.lock().unwrap().push_back(reading);
    }

    pub fn push_memory(&self, reading: Result<f64, ReadError>) {
        self.memory.lock().unwrap().push_back(reading);
    }

    pub fn push_disk(&self, reading: Result<f64, ReadError>) {
        self.disk.lock().unwrap().push_back(reading);
    }

    pub fn set_processes(&self, processes: Vec<FakeProcess>) {
        *self.processes.lock().unwrap() = Ok(processes);
    }

    pub fn fail_enumeration(&self, message: &str) {
        *self.processes.lock().unwrap() = Err(message.to_string());
    }

    pub fn fail_network(&self, fails: bool) {
        *self.network_fails.lock().unwrap() = fails;
    }

    /// Traffic counters keep working; only the connection listing fails.
    pub fn fail_connection_listing(&self, fails: bool) {
        *self.listing_fails.lock().unwrap() = fails;
    }

    pub fn set_connections(&self, count: usize) {
        *self.connections.lock().unwrap() = count;
    }

    fn lookup<T>(
        &self,
        pid: u32,
        read: impl FnOnce(&FakeProcess) -> Result<T, ReadError>,
    ) -> Result<T, ReadError> {
        let table = self.processes.lock().unwrap();
        let table = table.as_ref().map_err(|_| ReadError::Exited)?;
        match table.iter().find(|p| p.pid == pid) {
            Some(p) if !p.vanished => read(p),
            _ => Err(ReadError::Exited),
        }
    }
}

fn next(queue: &Mutex<VecDeque<Result<f64, ReadError>>>, default: f64) -> Result<f64, ReadError> {
    queue.lock().unwrap().pop_front().unwrap_or(Ok(default))
}

impl MetricsSource for FakeHost {
    fn cpu_percent(&self) -> Result<f64, ReadError> {
        next(&self.cpu, self.default_cpu)
    }

    fn memory_percent(&self) -> Result<f64, ReadError> {
        next(&self.memory, self.default_memory)
    }

    fn disk_percent(&self) -> Result<f64, ReadError> {
        next(&self.disk, 50.0)
    }

    fn memory_totals(&self) -> Result<MemoryTotals, ReadError> {
        Ok(MemoryTotals {
            total_bytes: 16 << 30,
            available_bytes: 8 << 30,
        })
    }

    fn uptime(&self) -> Result<Duration, ReadError> {
        Ok(Duration::from_secs(3600))
    }
}

impl ProcessEnumerator for FakeHost {
    fn list_processes(&self) -> Result<Vec<u32>, CollectionError> {
        match &*self.processes.lock().unwrap() {
            Ok(table) => Ok(table.iter().map(|p| p.pid).collect()),
            Err(message) => Err(CollectionError::ProcessEnumeration(message.clone())),
        }
    }

    fn name(&self, pid: u32) -> Result<String, ReadError> {
        self.lookup(pid, |p| Ok(p.name.clone()))
    }

    fn executable_path(&self, pid: u32) -> Result<String, ReadError> {
        self.lookup(pid, |p| p.path.clone())
    }

    fn cpu_time(&self, pid: u32) -> Result<Duration, ReadError> {
        self.lookup(pid, |p| p.cpu_time.clone())
    }

    fn working_set_bytes(&self, pid: u32) -> Result<u64, ReadError> {
        self.lookup(pid, |p| Ok(p.memory))
    }

    fn thread_count(&self, pid: u32) -> Result<u32, ReadError> {
        self.lookup(pid, |_| Ok(4))
    }

    fn start_time(&self, pid: u32) -> Result<DateTime<Utc>, ReadError> {
        self.lookup(pid, |_| {
            DateTime::from_timestamp(1_700_000_000, 0)
                .ok_or(ReadError::Unavailable("start".to_string()))
        })
    }

    fn priority(&self, pid: u32) -> Result<i32, ReadError> {
        self.lookup(pid, |_| Err(ReadError::AccessDenied))
    }

    fn owner(&self, pid: u32) -> Result<String, ReadError> {
        self.lookup(pid, |_| Ok("alice".to_string()))
    }
}

impl NetworkProbe for FakeHost {
    fn traffic(&self) -> Result<NetworkTraffic, CollectionError> {
        if *self.network_fails.lock().unwrap() {
            return Err(CollectionError::Network("probe offline".to_string()));
        }
        Ok(NetworkTraffic {
            bytes_sent: 1_000,
            bytes_received: 2_000,
        })
    }

    fn connections(&self) -> Result<Vec<NetworkConnection>, CollectionError> {
        if *self.listing_fails.lock().unwrap() {
            return Err(CollectionError::Network("listing unsupported".to_string()));
        }
        let count = *self.connections.lock().unwrap();
        Ok((0..count)
            .map(|i| NetworkConnection {
                local_endpoint: format!("10.0.0.1:{}", 40000 + i),
                remote_endpoint: "10.0.0.2:443".to_string(),
                protocol: Protocol::Tcp,
                state: "ESTABLISHED".to_string(),
                pid: None,
            })
            .collect())
    }
}

pub fn collector_for(host: &Arc<FakeHost>) -> SnapshotCollector {
    SnapshotCollector::from_source(Arc::clone(host))
}
