//! Fire-and-forget probes that make the OS resolve hardware addresses
//!
//! Nothing a probe returns is used. Sending a datagram or opening a TCP
//! connection to a LAN address forces an ARP exchange, and the result is
//! read back from the neighbor table once every probe has finished.

use crate::logging::NetworkLogger;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Discard and mDNS: unlikely to answer, still trigger resolution
pub const UDP_PROBE_PORTS: [u16; 2] = [9, 5353];

/// Rotated across targets so no single service is hammered
pub const TCP_PROBE_PORTS: [u16; 4] = [80, 443, 22, 53];

/// The two TCP ports tried for the `index`-th probed host
pub fn tcp_ports_for(index: usize) -> [u16; 2] {
    [
        TCP_PROBE_PORTS[index % TCP_PROBE_PORTS.len()],
        TCP_PROBE_PORTS[(index + 2) % TCP_PROBE_PORTS.len()],
    ]
}

/// One side-effecting probe of a single host
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn probe(&self, target: Ipv4Addr, index: usize);
}

/// UDP pokes followed by two bounded TCP connection attempts
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    timeout: Duration,
    network: NetworkLogger,
}

impl ReachabilityProbe {
    pub fn new(timeout: Duration, network: NetworkLogger) -> Self {
        Self { timeout, network }
    }

    async fn udp_poke(&self, target: Ipv4Addr, port: u16) -> bool {
        let send = async {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
            socket.send_to(&[0u8], (target, port)).await
        };
        matches!(timeout(self.timeout, send).await, Ok(Ok(_)))
    }

    async fn tcp_try(&self, target: Ipv4Addr, port: u16) -> bool {
        matches!(
            timeout(self.timeout, TcpStream::connect((target, port))).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl HostProbe for ReachabilityProbe {
    async fn probe(&self, target: Ipv4Addr, index: usize) {
        for port in UDP_PROBE_PORTS {
            let sent = self.udp_poke(target, port).await;
            self.network.probe_outcome("udp", target, port, sent).await;
        }
        for port in tcp_ports_for(index) {
            let reached = self.tcp_try(target, port).await;
            self.network.probe_outcome("tcp", target, port, reached).await;
        }
    }
}

/// Bounded pool that runs one probe per target and waits for all of them
#[derive(Debug, Clone, Copy)]
pub struct ProbePool {
    concurrency: usize,
}

impl ProbePool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Probe every target; returns the number of probes run once all have finished
    pub async fn run<I>(&self, probe: Arc<dyn HostProbe>, targets: I) -> usize
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut probes = JoinSet::new();
        let mut launched = 0;

        for (index, target) in targets.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let probe = Arc::clone(&probe);
            probes.spawn(async move {
                let _permit = permit;
                probe.probe(target, index).await;
            });
            launched += 1;

            // Reap finished probes so the set does not grow with the range
            while probes.try_join_next().is_some() {}
        }

        while probes.join_next().await.is_some() {}
        launched
    }
}
