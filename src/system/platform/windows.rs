use std::net::{Ipv4Addr, SocketAddrV4};

use super::PlatformExtensions;
use crate::system::snapshot::{NetworkConnection, Protocol};

pub struct Platform;

#[cfg(target_os = "windows")]
use windows_sys::Win32::{
    Foundation::{CloseHandle, ERROR_INSUFFICIENT_BUFFER, INVALID_HANDLE_VALUE, NO_ERROR},
    NetworkManagement::IpHelper::{
        GetExtendedTcpTable, GetExtendedUdpTable, MIB_TCPROW_OWNER_PID, MIB_TCPTABLE_OWNER_PID,
        MIB_UDPROW_OWNER_PID, MIB_UDPTABLE_OWNER_PID, TCP_TABLE_OWNER_PID_ALL,
        UDP_TABLE_OWNER_PID,
    },
    System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS,
    },
    System::Threading::{GetPriorityClass, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION},
};

#[cfg(target_os = "windows")]
const AF_INET: u32 = 2;

impl PlatformExtensions for Platform {
    #[cfg(target_os = "windows")]
    fn process_priority(pid: u32) -> Option<i32> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return None;
            }
            let prio = GetPriorityClass(handle);
            CloseHandle(handle);
            if prio == 0 { None } else { Some(prio as i32) }
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn process_priority(_pid: u32) -> Option<i32> {
        None
    }

    #[cfg(target_os = "windows")]
    fn process_thread_count(pid: u32) -> Option<u32> {
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
            if snapshot == INVALID_HANDLE_VALUE {
                return None;
            }
            let mut entry: PROCESSENTRY32W = std::mem::zeroed();
            entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;

            let mut threads = None;
            let mut more = Process32FirstW(snapshot, &mut entry) != 0;
            while more {
                if entry.th32ProcessID == pid {
                    threads = Some(entry.cntThreads);
                    break;
                }
                more = Process32NextW(snapshot, &mut entry) != 0;
            }
            CloseHandle(snapshot);
            threads
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn process_thread_count(_pid: u32) -> Option<u32> {
        None
    }

    /// IPv4 TCP and UDP endpoints with their owning pids.
    #[cfg(target_os = "windows")]
    fn active_connections() -> Option<Vec<NetworkConnection>> {
        let tcp = tcp_table()?;
        let udp = udp_table()?;
        let mut connections: Vec<NetworkConnection> = tcp
            .iter()
            .map(|row| NetworkConnection {
                local_endpoint: endpoint(row.dwLocalAddr, row.dwLocalPort),
                remote_endpoint: endpoint(row.dwRemoteAddr, row.dwRemotePort),
                protocol: Protocol::Tcp,
                state: tcp_state(row.dwState).to_string(),
                pid: Some(row.dwOwningPid),
            })
            .collect();
        connections.extend(udp.iter().map(|row| NetworkConnection {
            local_endpoint: endpoint(row.dwLocalAddr, row.dwLocalPort),
            remote_endpoint: "0.0.0.0:0".to_string(),
            protocol: Protocol::Udp,
            state: "UNCONN".to_string(),
            pid: Some(row.dwOwningPid),
        }));
        Some(connections)
    }

    #[cfg(not(target_os = "windows"))]
    fn active_connections() -> Option<Vec<NetworkConnection>> {
        None
    }
}

/// Fetch an IP Helper table, growing the buffer until it fits. The buffer
/// is `u32`-backed so the table rows are suitably aligned.
#[cfg(target_os = "windows")]
fn fetch_table(fetch: impl Fn(*mut core::ffi::c_void, *mut u32) -> u32) -> Option<Vec<u32>> {
    let mut size = 0u32;
    let mut buffer: Vec<u32> = Vec::new();
    for _ in 0..4 {
        let status = fetch(buffer.as_mut_ptr().cast(), &mut size);
        if status == NO_ERROR && !buffer.is_empty() {
            return Some(buffer);
        }
        if status != ERROR_INSUFFICIENT_BUFFER && status != NO_ERROR {
            return None;
        }
        buffer = vec![0u32; (size as usize).div_ceil(4)];
    }
    None
}

#[cfg(target_os = "windows")]
fn tcp_table() -> Option<Vec<MIB_TCPROW_OWNER_PID>> {
    let buffer = fetch_table(|ptr, size| unsafe {
        GetExtendedTcpTable(ptr, size, 0, AF_INET, TCP_TABLE_OWNER_PID_ALL, 0)
    })?;
    unsafe {
        let table = buffer.as_ptr().cast::<MIB_TCPTABLE_OWNER_PID>();
        let rows = std::slice::from_raw_parts(
            (*table).table.as_ptr(),
            (*table).dwNumEntries as usize,
        );
        Some(rows.to_vec())
    }
}

#[cfg(target_os = "windows")]
fn udp_table() -> Option<Vec<MIB_UDPROW_OWNER_PID>> {
    let buffer = fetch_table(|ptr, size| unsafe {
        GetExtendedUdpTable(ptr, size, 0, AF_INET, UDP_TABLE_OWNER_PID, 0)
    })?;
    unsafe {
        let table = buffer.as_ptr().cast::<MIB_UDPTABLE_OWNER_PID>();
        let rows = std::slice::from_raw_parts(
            (*table).table.as_ptr(),
            (*table).dwNumEntries as usize,
        );
        Some(rows.to_vec())
    }
}

/// Address and port arrive in network byte order; the port sits in the low
/// 16 bits.
fn endpoint(addr: u32, port: u32) -> String {
    let ip = Ipv4Addr::from(addr.to_ne_bytes());
    let port = u16::from_be(port as u16);
    SocketAddrV4::new(ip, port).to_string()
}

fn tcp_state(code: u32) -> &'static str {
    match code {
        1 => "CLOSE",
        2 => "LISTEN",
        3 => "SYN_SENT",
        4 => "SYN_RECV",
        5 => "ESTABLISHED",
        6 => "FIN_WAIT1",
        7 => "FIN_WAIT2",
        8 => "CLOSE_WAIT",
        9 => "CLOSING",
        10 => "LAST_ACK",
        11 => "TIME_WAIT",
        12 => "DELETE_TCB",
        _ => "UNKNOWN",
    }
}
