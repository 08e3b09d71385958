//! OS neighbor table sources and parsing
//!
//! Two text formats are understood:
//! - Linux `/proc/net/arp`: a header line, then whitespace separated
//!   columns with the IP first and the hardware address fourth
//! - BSD/macOS `arp -an`: `? (192.168.1.1) at aa:bb:cc:dd:ee:ff on en0 ...`

use crate::{
    error::{AppError, ErrorContext, Result},
    models::NeighborEntry,
};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;

pub const PROC_NET_ARP: &str = "/proc/net/arp";

const ZERO_MAC: &str = "00:00:00:00:00:00";

/// Somewhere the IP to hardware address table can be read from
#[async_trait]
pub trait NeighborSource: Send + Sync {
    async fn read_entries(&self) -> Result<Vec<NeighborEntry>>;
}

/// Linux procfs table
#[derive(Debug, Clone)]
pub struct ProcNetArp {
    path: PathBuf,
}

impl ProcNetArp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcNetArp {
    fn default() -> Self {
        Self::new(PROC_NET_ARP)
    }
}

#[async_trait]
impl NeighborSource for ProcNetArp {
    async fn read_entries(&self) -> Result<Vec<NeighborEntry>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(parse_proc_net_arp(&text)),
            // No table at all reads as an empty table
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }
}

/// `arp -an` on platforms without procfs
#[derive(Debug, Clone, Default)]
pub struct ArpCommand;

#[async_trait]
impl NeighborSource for ArpCommand {
    async fn read_entries(&self) -> Result<Vec<NeighborEntry>> {
        let output = tokio::process::Command::new("arp")
            .arg("-an")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::discovery(format!("Failed to run arp: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::discovery(format!("arp exited with {}", output.status)));
        }

        parse_arp_command(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Neighbor source for the platform this binary was built for
pub fn system_source() -> Box<dyn NeighborSource> {
    if cfg!(target_os = "linux") || cfg!(target_os = "android") {
        Box::new(ProcNetArp::default())
    } else {
        Box::new(ArpCommand)
    }
}

/// Parse the Linux `/proc/net/arp` format
pub fn parse_proc_net_arp(text: &str) -> Vec<NeighborEntry> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            let ip = parts[0].parse::<Ipv4Addr>().ok()?;
            let mac_address = normalize_mac(parts[3])?;
            Some(NeighborEntry { ip, mac_address })
        })
        .collect()
}

/// Parse BSD/macOS `arp -an` output
pub fn parse_arp_command(text: &str) -> Result<Vec<NeighborEntry>> {
    let pattern = Regex::new(r"\((\d{1,3}(?:\.\d{1,3}){3})\)\s+at\s+([0-9A-Fa-f:]+)")
        .map_err(|e| AppError::internal(format!("Invalid neighbor pattern: {}", e)))?;

    Ok(text
        .lines()
        .filter_map(|line| {
            let captures = pattern.captures(line)?;
            let ip = captures[1].parse::<Ipv4Addr>().ok()?;
            let mac_address = normalize_mac(&captures[2])?;
            Some(NeighborEntry { ip, mac_address })
        })
        .collect())
}

/// Lowercase, two digits per octet; `None` for incomplete or zero addresses
pub fn normalize_mac(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if !raw.contains(':') {
        return None;
    }

    let octets: Vec<String> = raw
        .split(':')
        .map(|octet| format!("{:0>2}", octet.to_lowercase()))
        .collect();
    if octets.len() != 6 || octets.iter().any(|o| o.len() != 2 || !o.chars().all(|c| c.is_ascii_hexdigit())) {
        return None;
    }

    let mac = octets.join(":");
    (mac != ZERO_MAC).then_some(mac)
}

/// Drop the catch-all zero address and keep the first row per IP
pub fn dedupe_entries(entries: Vec<NeighborEntry>) -> Vec<NeighborEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| !entry.ip.is_unspecified())
        .filter(|entry| seen.insert(entry.ip))
        .collect()
}
