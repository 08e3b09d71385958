//! LAN host discovery
//!
//! A scan probes the local subnet to populate the OS neighbor table,
//! then reads that table back into a deduplicated, sorted host list.
//! The scanner keeps no state between scans.

pub mod neighbor;
pub mod probe;
pub mod subnet;

pub use neighbor::{NeighborSource, ProcNetArp};
pub use probe::{HostProbe, ProbePool, ReachabilityProbe};
pub use subnet::SubnetRange;

use crate::{
    dns::{DnsManager, HostNameResolver},
    error::Result,
    logging::{Logger, NetworkLogger},
    models::{Config, DiscoveredHost, LocalNetworkInfo, NeighborEntry, ScanReport},
};
use futures::future::join_all;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

pub const NOT_ON_LOCAL_NETWORK_NOTE: &str =
    "Connect to a Wi-Fi or Ethernet network to see devices on the local network.";

pub const CLIENT_ISOLATION_NOTE: &str =
    "No other devices found. Client isolation may be enabled on the router or access point.";

/// Enumerates reachable hosts on the local subnet
pub struct LanDiscoveryScanner {
    neighbors: Arc<dyn NeighborSource>,
    names: Arc<dyn HostNameResolver>,
    probe: Arc<dyn HostProbe>,
    pool: ProbePool,
    max_hosts: u32,
    logger: Logger,
}

impl LanDiscoveryScanner {
    pub fn new(
        neighbors: Arc<dyn NeighborSource>,
        names: Arc<dyn HostNameResolver>,
        probe: Arc<dyn HostProbe>,
        pool: ProbePool,
        max_hosts: u32,
        logger: Logger,
    ) -> Self {
        Self {
            neighbors,
            names,
            probe,
            pool,
            max_hosts,
            logger,
        }
    }

    /// Scanner using the platform neighbor table, system DNS and real probes
    pub fn from_config(config: &Config) -> Self {
        let network = NetworkLogger::new(config);
        // Reverse lookups get a little longer than a connect probe
        let lookup_timeout = config.probe_timeout().max(Duration::from_millis(500));

        Self::new(
            Arc::from(neighbor::system_source()),
            Arc::new(DnsManager::new(lookup_timeout).with_logger(network.clone())),
            Arc::new(ReachabilityProbe::new(config.probe_timeout(), network)),
            ProbePool::new(config.probe_concurrency),
            config.max_scan_hosts,
            Logger::with_config("DISCOVERY".to_string(), config),
        )
    }

    /// Scan the subnet described by `network`.
    ///
    /// Only malformed input is an error. Not being on a local network, an
    /// unreadable neighbor table, or an empty subnet all produce a report.
    pub async fn scan(&self, network: &LocalNetworkInfo) -> Result<ScanReport> {
        network.validate()?;

        if !network.link.is_local_network() {
            self.logger
                .info("Skipping discovery: not attached to a local network")
                .field("link", network.link)
                .log()
                .await;
            return Ok(ScanReport {
                hosts: Vec::new(),
                note: Some(NOT_ON_LOCAL_NETWORK_NOTE.to_string()),
            });
        }

        let subnet = SubnetRange::new(network.local_ip, network.netmask_bits)?;
        let correlation_id = self.logger.start_operation("lan_scan").await;

        let local_ip = network.local_ip;
        let targets = subnet.probe_targets(self.max_hosts).filter(move |ip| *ip != local_ip);
        let probed = self.pool.run(Arc::clone(&self.probe), targets).await;

        let entries = match self.neighbors.read_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                self.logger
                    .warn(&format!("Neighbor table unavailable: {}", e))
                    .error_info(&e)
                    .log()
                    .await;
                Vec::new()
            }
        };

        let hosts = self.build_hosts(network, &subnet, entries).await;
        // Nothing but the router answered
        let note = hosts
            .iter()
            .all(|host| host.is_gateway)
            .then(|| CLIENT_ISOLATION_NOTE.to_string());

        self.logger
            .info(&format!("Discovery found {} host(s)", hosts.len()))
            .correlation_id(&correlation_id)
            .field("subnet", format!("{}/{}", subnet.network(), subnet.prefix()))
            .field("probed", probed)
            .field("hosts", hosts.len())
            .log()
            .await;
        self.logger.end_operation(&correlation_id, "lan_scan", true).await;

        Ok(ScanReport { hosts, note })
    }

    async fn build_hosts(
        &self,
        network: &LocalNetworkInfo,
        subnet: &SubnetRange,
        entries: Vec<NeighborEntry>,
    ) -> Vec<DiscoveredHost> {
        let gateway = network.gateway();

        let mut candidates: Vec<(Ipv4Addr, Option<String>)> = neighbor::dedupe_entries(entries)
            .into_iter()
            .filter(|entry| Some(entry.ip) == gateway || (entry.ip != network.local_ip && subnet.contains(entry.ip)))
            .map(|entry| (entry.ip, Some(entry.mac_address)))
            .collect();

        // The gateway is known out of band even when the table missed it
        if let Some(gateway) = gateway {
            if !candidates.iter().any(|(ip, _)| *ip == gateway) {
                candidates.push((gateway, None));
            }
        }

        let names = join_all(candidates.iter().map(|(ip, _)| self.names.reverse_lookup(*ip))).await;

        let mut hosts: Vec<DiscoveredHost> = candidates
            .into_iter()
            .zip(names)
            .map(|((ip, mac), name)| {
                let is_gateway = Some(ip) == gateway;
                DiscoveredHost {
                    ip_address: ip.to_string(),
                    display_name: display_name(ip, mac.as_deref(), name.as_deref(), is_gateway),
                    is_gateway,
                }
            })
            .collect();

        hosts.sort_by_key(|host| (host.last_octet(), host.ip_address.clone()));
        hosts
    }
}

/// Friendly name for a host: `Router`, its reverse name, or a MAC-derived label
pub fn display_name(ip: Ipv4Addr, mac: Option<&str>, resolved: Option<&str>, is_gateway: bool) -> String {
    if is_gateway {
        return match resolved {
            Some(name) => format!("Router • {}", name),
            None => "Router".to_string(),
        };
    }
    if let Some(name) = resolved {
        return name.to_string();
    }
    fallback_name(ip, mac.unwrap_or_default())
}

/// `Device • EE17 (#23)` from the last two MAC octets and the last IP octet
pub fn fallback_name(ip: Ipv4Addr, mac: &str) -> String {
    let tail: String = mac.chars().rev().take(5).collect::<Vec<_>>().into_iter().rev().collect();
    let suffix = tail.replace(':', "").to_uppercase();
    format!("Device • {} (#{})", suffix, ip.octets()[3])
}
