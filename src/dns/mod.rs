//! Reverse name resolution for discovered hosts

use crate::logging::NetworkLogger;
use async_trait::async_trait;
use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};
use tokio::time::Instant;
use trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf,
    TokioAsyncResolver,
};

/// Turns an address into a friendly host name, when one exists
#[async_trait]
pub trait HostNameResolver: Send + Sync {
    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Option<String>;
}

/// PTR lookups through the system resolver
pub struct DnsManager {
    resolver: TokioAsyncResolver,
    timeout: Duration,
    network: Option<NetworkLogger>,
}

impl DnsManager {
    /// Resolver built from the system configuration, or public defaults
    /// when the system configuration cannot be read
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = system_conf::read_system_conf()
            .unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));

        // LAN names come from the local resolver or nowhere; one short try is enough
        opts.timeout = timeout;
        opts.attempts = 1;

        Self::with_resolver(TokioAsyncResolver::tokio(config, opts), timeout)
    }

    pub fn with_resolver(resolver: TokioAsyncResolver, timeout: Duration) -> Self {
        Self {
            resolver,
            timeout,
            network: None,
        }
    }

    pub fn with_logger(mut self, network: NetworkLogger) -> Self {
        self.network = Some(network);
        self
    }
}

#[async_trait]
impl HostNameResolver for DnsManager {
    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Option<String> {
        let start = Instant::now();
        let name = match tokio::time::timeout(self.timeout, self.resolver.reverse_lookup(IpAddr::V4(ip))).await {
            Ok(Ok(lookup)) => lookup
                .iter()
                .find_map(|ptr| normalize_hostname(&ptr.to_string())),
            _ => None,
        };

        if let Some(network) = &self.network {
            network
                .reverse_lookup(ip, name.as_deref(), start.elapsed().as_secs_f64() * 1000.0)
                .await;
        }

        name
    }
}

/// Resolver that never finds a name
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNames;

#[async_trait]
impl HostNameResolver for NoNames {
    async fn reverse_lookup(&self, _ip: Ipv4Addr) -> Option<String> {
        None
    }
}

/// Strip the trailing root dot and reject names that carry no information
pub fn normalize_hostname(raw: &str) -> Option<String> {
    let name = raw.trim().trim_end_matches('.');
    if name.is_empty() || name.ends_with(".in-addr.arpa") || name.parse::<IpAddr>().is_ok() {
        return None;
    }
    Some(name.to_string())
}
