use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sysinfo::{
    Disks, Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, System, ThreadKind, UpdateKind,
    Users,
};

use super::error::{CollectionError, ReadError};
use super::platform;
use super::snapshot::NetworkConnection;
use super::source::{
    MemoryTotals, MetricsSource, NetworkProbe, NetworkTraffic, ProcessEnumerator,
};
use crate::percent::ratio_percent;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `MetricsSource`, `ProcessEnumerator` and `NetworkProbe` backed by
/// sysinfo. Each sysinfo table sits behind its own mutex so the three
/// collection tasks of a tick never contend with one another.
pub struct SysinfoProbe {
    metrics: Mutex<System>,
    processes: Mutex<System>,
    users: Mutex<Users>,
    networks: Mutex<Networks>,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut metrics = System::new();
        metrics.refresh_memory();
        metrics.refresh_cpu_usage();

        let mut processes = System::new();
        processes.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            process_refresh_kind(),
        );

        SysinfoProbe {
            metrics: Mutex::new(metrics),
            processes: Mutex::new(processes),
            users: Mutex::new(Users::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
        }
    }

    fn with_process<T>(
        &self,
        pid: u32,
        read: impl FnOnce(&sysinfo::Process) -> Result<T, ReadError>,
    ) -> Result<T, ReadError> {
        let sys = lock(&self.processes);
        let process = sys.process(Pid::from_u32(pid)).ok_or(ReadError::Exited)?;
        read(process)
    }
}

fn process_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_memory()
        .with_cpu()
        .with_exe(UpdateKind::OnlyIfNotSet)
        .with_user(UpdateKind::OnlyIfNotSet)
}

impl MetricsSource for SysinfoProbe {
    fn cpu_percent(&self) -> Result<f64, ReadError> {
        let mut sys = lock(&self.metrics);
        sys.refresh_cpu_usage();
        let usage = sys.global_cpu_usage();
        if usage.is_finite() {
            Ok(f64::from(usage))
        } else {
            Err(ReadError::Unavailable("cpu counter not finite".to_string()))
        }
    }

    fn memory_percent(&self) -> Result<f64, ReadError> {
        let mut sys = lock(&self.metrics);
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(ReadError::Unavailable(
                "total memory reported as zero".to_string(),
            ));
        }
        Ok(ratio_percent(sys.used_memory(), total))
    }

    fn disk_percent(&self) -> Result<f64, ReadError> {
        let disks = Disks::new_with_refreshed_list();
        let (used, total) = disks
            .list()
            .iter()
            .fold((0u64, 0u64), |(used, total), disk| {
                let size = disk.total_space();
                (
                    used + size.saturating_sub(disk.available_space()),
                    total + size,
                )
            });
        if total == 0 {
            return Err(ReadError::Unavailable("no mounted disks".to_string()));
        }
        Ok(ratio_percent(used, total))
    }

    fn memory_totals(&self) -> Result<MemoryTotals, ReadError> {
        let sys = lock(&self.metrics);
        Ok(MemoryTotals {
            total_bytes: sys.total_memory(),
            available_bytes: sys.available_memory(),
        })
    }

    fn uptime(&self) -> Result<Duration, ReadError> {
        Ok(Duration::from_secs(System::uptime()))
    }
}

impl ProcessEnumerator for SysinfoProbe {
    fn list_processes(&self) -> Result<Vec<u32>, CollectionError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(CollectionError::Unsupported);
        }

        let mut sys = lock(&self.processes);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            process_refresh_kind(),
        );
        lock(&self.users).refresh();

        // Userland threads show up as tasks on Linux; only whole processes count.
        let pids: Vec<u32> = sys
            .processes()
            .iter()
            .filter(|(_, p)| !matches!(p.thread_kind(), Some(ThreadKind::Userland)))
            .map(|(pid, _)| pid.as_u32())
            .collect();
        if pids.is_empty() {
            return Err(CollectionError::ProcessEnumeration(
                "process table is empty".to_string(),
            ));
        }
        Ok(pids)
    }

    fn name(&self, pid: u32) -> Result<String, ReadError> {
        self.with_process(pid, |p| Ok(p.name().to_string_lossy().to_string()))
    }

    fn executable_path(&self, pid: u32) -> Result<String, ReadError> {
        self.with_process(pid, |p| {
            p.exe()
                .map(|path| path.to_string_lossy().to_string())
                .ok_or(ReadError::AccessDenied)
        })
    }

    fn cpu_time(&self, pid: u32) -> Result<Duration, ReadError> {
        self.with_process(pid, |p| {
            Ok(Duration::from_millis(p.accumulated_cpu_time()))
        })
    }

    fn working_set_bytes(&self, pid: u32) -> Result<u64, ReadError> {
        self.with_process(pid, |p| Ok(p.memory()))
    }

    fn thread_count(&self, pid: u32) -> Result<u32, ReadError> {
        platform::process_thread_count(pid)
            .ok_or_else(|| ReadError::Unavailable("thread count".to_string()))
    }

    fn start_time(&self, pid: u32) -> Result<DateTime<Utc>, ReadError> {
        self.with_process(pid, |p| {
            let secs = i64::try_from(p.start_time())
                .map_err(|_| ReadError::Unavailable("start time out of range".to_string()))?;
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| ReadError::Unavailable("start time out of range".to_string()))
        })
    }

    fn priority(&self, pid: u32) -> Result<i32, ReadError> {
        platform::process_priority(pid).ok_or(ReadError::AccessDenied)
    }

    fn owner(&self, pid: u32) -> Result<String, ReadError> {
        let uid = self.with_process(pid, |p| {
            p.user_id().cloned().ok_or(ReadError::AccessDenied)
        })?;
        let users = lock(&self.users);
        users
            .get_user_by_id(&uid)
            .map(|user| user.name().to_string())
            .ok_or_else(|| ReadError::Unavailable(format!("no user for {uid:?}")))
    }
}

impl NetworkProbe for SysinfoProbe {
    fn traffic(&self) -> Result<NetworkTraffic, CollectionError> {
        let mut networks = lock(&self.networks);
        networks.refresh(true);
        Ok(networks
            .list()
            .values()
            .fold(NetworkTraffic::default(), |acc, data| NetworkTraffic {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_received: acc.bytes_received + data.total_received(),
            }))
    }

    fn connections(&self) -> Result<Vec<NetworkConnection>, CollectionError> {
        platform::active_connections().ok_or_else(|| {
            CollectionError::Network("connection listing unavailable".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_current_process() {
        let probe = SysinfoProbe::new();
        let pids = probe.list_processes().unwrap();
        let me = std::process::id();
        assert!(pids.contains(&me));
        assert!(probe.name(me).is_ok());
        assert!(probe.working_set_bytes(me).unwrap() > 0);
    }

    #[test]
    fn unknown_pid_reports_exited() {
        let probe = SysinfoProbe::new();
        probe.list_processes().unwrap();
        assert_eq!(probe.name(u32::MAX), Err(ReadError::Exited));
        assert_eq!(probe.cpu_time(u32::MAX), Err(ReadError::Exited));
    }

    #[test]
    fn host_percentages_are_bounded() {
        let probe = SysinfoProbe::new();
        for reading in [probe.cpu_percent(), probe.memory_percent()]
            .into_iter()
            .flatten()
        {
            assert!((0.0..=100.0).contains(&reading));
        }
    }
}
