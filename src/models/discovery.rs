//! LAN discovery data models

use crate::error::{AppError, Result};
use crate::types::LinkKind;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Raw row of the OS neighbor table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
    /// Lowercase, colon separated
    pub mac_address: String,
}

/// A host found on the local subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub ip_address: String,
    pub display_name: String,
    pub is_gateway: bool,
}

impl DiscoveredHost {
    /// Last octet of the address, used for stable ordering
    pub fn last_octet(&self) -> u32 {
        self.ip_address
            .rsplit('.')
            .next()
            .and_then(|octet| octet.parse::<u32>().ok())
            .unwrap_or(u32::MAX)
    }
}

/// Ambient network information supplied by the hosting platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNetworkInfo {
    pub local_ip: Ipv4Addr,
    /// `0.0.0.0` when the platform does not know the gateway
    pub gateway_ip: Ipv4Addr,
    /// Prefix length; 0 means unknown and is treated as /24
    pub netmask_bits: u8,
    pub link: LinkKind,
}

impl LocalNetworkInfo {
    pub fn new(local_ip: Ipv4Addr, gateway_ip: Ipv4Addr, netmask_bits: u8, link: LinkKind) -> Self {
        Self { local_ip, gateway_ip, netmask_bits, link }
    }

    /// Reject inputs that can only come from a caller bug
    pub fn validate(&self) -> Result<()> {
        if self.netmask_bits > 32 {
            return Err(AppError::validation(format!(
                "Netmask prefix must be between 0 and 32, got /{}",
                self.netmask_bits
            )));
        }
        if self.local_ip.is_unspecified() {
            return Err(AppError::validation("Local address must not be 0.0.0.0"));
        }
        if self.local_ip.is_broadcast() || self.local_ip.is_multicast() {
            return Err(AppError::validation(format!(
                "Local address {} is not a unicast address",
                self.local_ip
            )));
        }
        Ok(())
    }

    /// Gateway address when the platform reported one
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        if self.gateway_ip.is_unspecified() {
            None
        } else {
            Some(self.gateway_ip)
        }
    }
}

/// Result of one discovery scan
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub hosts: Vec<DiscoveredHost>,
    /// Advisory for the user; never an error
    pub note: Option<String>,
}

impl ScanReport {
    pub fn gateway(&self) -> Option<&DiscoveredHost> {
        self.hosts.iter().find(|host| host.is_gateway)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(local: [u8; 4], prefix: u8) -> LocalNetworkInfo {
        LocalNetworkInfo::new(Ipv4Addr::from(local), Ipv4Addr::new(192, 168, 1, 1), prefix, LinkKind::Wifi)
    }

    #[test]
    fn test_validate_prefix() {
        assert!(info([192, 168, 1, 10], 24).validate().is_ok());
        assert!(info([192, 168, 1, 10], 0).validate().is_ok());
        assert!(info([192, 168, 1, 10], 33).validate().is_err());
    }

    #[test]
    fn test_validate_local_address() {
        assert!(info([0, 0, 0, 0], 24).validate().is_err());
        assert!(info([255, 255, 255, 255], 24).validate().is_err());
        assert!(info([224, 0, 0, 1], 24).validate().is_err());
    }

    #[test]
    fn test_unknown_gateway() {
        let mut network = info([10, 0, 0, 5], 24);
        assert_eq!(network.gateway(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        network.gateway_ip = Ipv4Addr::UNSPECIFIED;
        assert_eq!(network.gateway(), None);
    }

    #[test]
    fn test_last_octet() {
        let host = DiscoveredHost {
            ip_address: "192.168.1.42".to_string(),
            display_name: "x".to_string(),
            is_gateway: false,
        };
        assert_eq!(host.last_octet(), 42);

        let odd = DiscoveredHost { ip_address: "nonsense".to_string(), ..host };
        assert_eq!(odd.last_octet(), u32::MAX);
    }
}
