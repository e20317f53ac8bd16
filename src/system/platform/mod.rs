use super::snapshot::NetworkConnection;

pub trait PlatformExtensions {
    fn process_priority(pid: u32) -> Option<i32>;
    fn process_thread_count(pid: u32) -> Option<u32>;
    fn active_connections() -> Option<Vec<NetworkConnection>>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn process_priority(pid: u32) -> Option<i32> {
    platform_impl::Platform::process_priority(pid)
}

pub fn process_thread_count(pid: u32) -> Option<u32> {
    platform_impl::Platform::process_thread_count(pid)
}

/// Every open TCP/UDP socket on the host, or `None` when the platform
/// offers no listing.
pub fn active_connections() -> Option<Vec<NetworkConnection>> {
    platform_impl::Platform::active_connections()
}
