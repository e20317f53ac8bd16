use std::net::{Ipv4Addr, Ipv6Addr};

use super::PlatformExtensions;
use crate::system::snapshot::{NetworkConnection, Protocol};

pub struct Platform;

const SOCKET_TABLES: [(&str, Protocol); 4] = [
    ("/proc/net/tcp", Protocol::Tcp),
    ("/proc/net/tcp6", Protocol::Tcp),
    ("/proc/net/udp", Protocol::Udp),
    ("/proc/net/udp6", Protocol::Udp),
];

impl PlatformExtensions for Platform {
    fn process_priority(pid: u32) -> Option<i32> {
        // Read /proc/{pid}/stat and parse priority (field 18, 0-indexed from stat)
        let path = format!("/proc/{pid}/stat");
        let contents = std::fs::read_to_string(path).ok()?;
        // comm field may contain spaces and parens, so find the closing )
        let after_comm = contents.rfind(')')? + 1;
        let fields: Vec<&str> = contents[after_comm..].split_whitespace().collect();
        // Fields after comm: state(0) ppid(1) ... utime(11) stime(12)
        // cutime(13) cstime(14) priority(15) nice(16)
        fields.get(15)?.parse().ok()
    }

    fn process_thread_count(pid: u32) -> Option<u32> {
        let path = format!("/proc/{pid}/status");
        let contents = std::fs::read_to_string(path).ok()?;
        contents
            .lines()
            .find_map(|line| line.strip_prefix("Threads:"))
            .and_then(|val| val.trim().parse().ok())
    }

    fn active_connections() -> Option<Vec<NetworkConnection>> {
        let mut connections = Vec::new();
        let mut any_table = false;
        for (path, protocol) in SOCKET_TABLES {
            let Ok(contents) = std::fs::read_to_string(path) else {
                continue;
            };
            any_table = true;
            connections.extend(parse_socket_table(&contents, protocol));
        }
        any_table.then_some(connections)
    }
}

/// Parse one of the `/proc/net/{tcp,udp}[6]` tables. The header line and
/// malformed rows are skipped.
fn parse_socket_table(contents: &str, protocol: Protocol) -> Vec<NetworkConnection> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // sl(0) local_address(1) rem_address(2) st(3)
            let local = parse_endpoint(fields.get(1)?)?;
            let remote = parse_endpoint(fields.get(2)?)?;
            let state = socket_state(fields.get(3)?, protocol);
            Some(NetworkConnection {
                local_endpoint: local,
                remote_endpoint: remote,
                protocol,
                state: state.to_string(),
                pid: None,
            })
        })
        .collect()
}

fn parse_endpoint(field: &str) -> Option<String> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    match addr.len() {
        8 => {
            // Stored as a host-order u32.
            let raw = u32::from_str_radix(addr, 16).ok()?;
            let ip = Ipv4Addr::from(raw.to_le_bytes());
            Some(format!("{ip}:{port}"))
        }
        32 => {
            // Four host-order u32 words.
            let mut bytes = [0u8; 16];
            for (i, chunk) in bytes.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(addr.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            let ip = Ipv6Addr::from(bytes);
            Some(format!("[{ip}]:{port}"))
        }
        _ => None,
    }
}

fn socket_state(code: &str, protocol: Protocol) -> &'static str {
    match (protocol, code) {
        (Protocol::Udp, "07") => "UNCONN",
        (_, "01") => "ESTABLISHED",
        (_, "02") => "SYN_SENT",
        (_, "03") => "SYN_RECV",
        (_, "04") => "FIN_WAIT1",
        (_, "05") => "FIN_WAIT2",
        (_, "06") => "TIME_WAIT",
        (_, "07") => "CLOSE",
        (_, "08") => "CLOSE_WAIT",
        (_, "09") => "LAST_ACK",
        (_, "0A") => "LISTEN",
        (_, "0B") => "CLOSING",
        _ => "UNKNOWN",
    }
}
