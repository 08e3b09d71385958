//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Direction of a bulk transfer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// GET a large payload and count received bytes
    Download,
    /// POST a generated body and count produced bytes
    Upload,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Download => "download",
            TransferDirection::Upload => "upload",
        }
    }
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of a test session a snapshot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    /// Public IP / ISP lookup
    Identity,
    /// Round-trip probes
    Latency,
    /// Download throughput
    Download,
    /// Upload throughput
    Upload,
    /// Terminal snapshot
    Complete,
}

impl TestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestPhase::Identity => "identity",
            TestPhase::Latency => "latency",
            TestPhase::Download => "download",
            TestPhase::Upload => "upload",
            TestPhase::Complete => "complete",
        }
    }

    /// Whether this is the last snapshot of a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, TestPhase::Complete)
    }
}

impl From<TransferDirection> for TestPhase {
    fn from(direction: TransferDirection) -> Self {
        match direction {
            TransferDirection::Download => TestPhase::Download,
            TransferDirection::Upload => TestPhase::Upload,
        }
    }
}

/// How the device is attached to its current network, as reported by the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Wifi,
    Ethernet,
    Cellular,
    None,
}

impl LinkKind {
    /// LAN discovery only runs on a local (non-cellular) network
    pub fn is_local_network(&self) -> bool {
        matches!(self, LinkKind::Wifi | LinkKind::Ethernet)
    }
}

impl FromStr for LinkKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wifi" | "wi-fi" | "wlan" => Ok(LinkKind::Wifi),
            "ethernet" | "eth" | "wired" => Ok(LinkKind::Ethernet),
            "cellular" | "mobile" => Ok(LinkKind::Cellular),
            "none" | "offline" => Ok(LinkKind::None),
            _ => Err(AppError::parse(format!("Invalid link kind: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_kind_parsing() {
        assert_eq!("wifi".parse::<LinkKind>().unwrap(), LinkKind::Wifi);
        assert_eq!("Wi-Fi".parse::<LinkKind>().unwrap(), LinkKind::Wifi);
        assert_eq!("ethernet".parse::<LinkKind>().unwrap(), LinkKind::Ethernet);
        assert_eq!("mobile".parse::<LinkKind>().unwrap(), LinkKind::Cellular);
        assert!("carrier-pigeon".parse::<LinkKind>().is_err());
    }

    #[test]
    fn test_local_network_links() {
        assert!(LinkKind::Wifi.is_local_network());
        assert!(LinkKind::Ethernet.is_local_network());
        assert!(!LinkKind::Cellular.is_local_network());
        assert!(!LinkKind::None.is_local_network());
    }

    #[test]
    fn test_phase_from_direction() {
        assert_eq!(TestPhase::from(TransferDirection::Download), TestPhase::Download);
        assert_eq!(TestPhase::from(TransferDirection::Upload), TestPhase::Upload);
        assert!(TestPhase::Complete.is_terminal());
        assert!(!TestPhase::Upload.is_terminal());
    }
}
