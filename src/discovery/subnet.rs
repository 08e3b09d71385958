//! IPv4 subnet range arithmetic

use crate::error::{AppError, Result};
use std::net::Ipv4Addr;

/// Prefix assumed when the platform reports none
pub const FALLBACK_PREFIX: u8 = 24;

/// The subnet a local address lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetRange {
    network: u32,
    broadcast: u32,
    prefix: u8,
}

impl SubnetRange {
    /// Subnet of `local` for prefix length `prefix` (0 means unknown, /24 is used)
    pub fn new(local: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(AppError::validation(format!(
                "Netmask prefix must be between 0 and 32, got /{}",
                prefix
            )));
        }
        let prefix = if prefix == 0 { FALLBACK_PREFIX } else { prefix };

        let mask = prefix_to_mask(prefix);
        let network = u32::from(local) & mask;
        let broadcast = network | !mask;

        Ok(Self { network, broadcast, prefix })
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.broadcast)
    }

    /// Number of usable host addresses (network and broadcast excluded)
    pub fn host_count(&self) -> u32 {
        (self.broadcast - self.network).saturating_sub(1)
    }

    pub fn first_host(&self) -> Option<Ipv4Addr> {
        (self.host_count() > 0).then(|| Ipv4Addr::from(self.network + 1))
    }

    pub fn last_host(&self) -> Option<Ipv4Addr> {
        (self.host_count() > 0).then(|| Ipv4Addr::from(self.broadcast - 1))
    }

    /// True for usable host addresses of this subnet
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let ip = u32::from(ip);
        ip > self.network && ip < self.broadcast
    }

    /// Distance between probed hosts so no more than `max_hosts` are probed
    pub fn stride(&self, max_hosts: u32) -> u32 {
        let hosts = self.host_count();
        let max_hosts = max_hosts.max(1);
        if hosts <= max_hosts {
            1
        } else {
            hosts.div_ceil(max_hosts)
        }
    }

    /// Host addresses to probe, strided when the range exceeds `max_hosts`
    pub fn probe_targets(&self, max_hosts: u32) -> impl Iterator<Item = Ipv4Addr> {
        let hosts = self.host_count();
        let stride = self.stride(max_hosts);
        let first = self.network + 1;
        let count = if hosts == 0 { 0 } else { (hosts - 1) / stride + 1 };

        (0..count).map(move |i| Ipv4Addr::from(first + i * stride))
    }
}

fn prefix_to_mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p => u32::MAX << (32 - u32::from(p)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_slash_24() {
        let subnet = SubnetRange::new(Ipv4Addr::new(192, 168, 1, 10), 24).unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(subnet.broadcast(), Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(subnet.host_count(), 254);
        assert_eq!(subnet.first_host(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(subnet.last_host(), Some(Ipv4Addr::new(192, 168, 1, 254)));
        assert_eq!(subnet.stride(512), 1);
        assert_eq!(subnet.probe_targets(512).count(), 254);
    }

    #[test]
    fn test_unknown_prefix_falls_back_to_24() {
        let subnet = SubnetRange::new(Ipv4Addr::new(10, 0, 7, 42), 0).unwrap();
        assert_eq!(subnet.prefix(), 24);
        assert_eq!(subnet.network(), Ipv4Addr::new(10, 0, 7, 0));
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(matches!(
            SubnetRange::new(Ipv4Addr::new(10, 0, 0, 1), 33),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_large_subnet_is_strided() {
        let subnet = SubnetRange::new(Ipv4Addr::new(10, 20, 30, 40), 16).unwrap();
        assert_eq!(subnet.host_count(), 65_534);
        assert_eq!(subnet.stride(512), 128);

        let targets: Vec<_> = subnet.probe_targets(512).collect();
        assert_eq!(targets.len(), 512);
        assert_eq!(targets[0], Ipv4Addr::new(10, 20, 0, 1));
        assert_eq!(targets[1], Ipv4Addr::new(10, 20, 0, 129));
    }

    #[test]
    fn test_point_to_point_and_host_routes() {
        let p2p = SubnetRange::new(Ipv4Addr::new(10, 0, 0, 1), 31).unwrap();
        assert_eq!(p2p.host_count(), 0);
        assert_eq!(p2p.first_host(), None);
        assert_eq!(p2p.probe_targets(512).count(), 0);

        let host = SubnetRange::new(Ipv4Addr::new(10, 0, 0, 1), 32).unwrap();
        assert_eq!(host.host_count(), 0);
        assert_eq!(host.probe_targets(512).count(), 0);
    }

    #[test]
    fn test_contains() {
        let subnet = SubnetRange::new(Ipv4Addr::new(192, 168, 1, 10), 24).unwrap();
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 1, 0)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 1, 255)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 2, 1)));
    }

    proptest! {
        #[test]
        fn prop_targets_bounded_unique_and_in_range(
            raw in any::<u32>(),
            prefix in 1u8..=32,
            max_hosts in 1u32..2048,
        ) {
            let subnet = SubnetRange::new(Ipv4Addr::from(raw), prefix).unwrap();
            let targets: Vec<_> = subnet.probe_targets(max_hosts).collect();

            prop_assert!(targets.len() as u32 <= max_hosts);
            prop_assert!(targets.iter().all(|ip| subnet.contains(*ip)));

            let unique: HashSet<_> = targets.iter().collect();
            prop_assert_eq!(unique.len(), targets.len());

            if subnet.host_count() > 0 {
                prop_assert_eq!(targets.first().copied(), subnet.first_host());
            }
        }

        #[test]
        fn prop_local_address_is_inside_its_subnet(raw in any::<u32>(), prefix in 1u8..=30) {
            let local = Ipv4Addr::from(raw);
            let subnet = SubnetRange::new(local, prefix).unwrap();
            prop_assert!(u32::from(subnet.network()) <= raw);
            prop_assert!(u32::from(subnet.broadcast()) >= raw);
        }
    }
}
