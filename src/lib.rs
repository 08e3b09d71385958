//! netgauge
//!
//! Measures the performance of a network path (latency, jitter, loss,
//! sustained download/upload throughput) and enumerates reachable hosts
//! on the local subnet.

pub mod cli;
pub mod client;
pub mod config;
pub mod discovery;
pub mod dns;
pub mod error;
pub mod identity;
pub mod latency;
pub mod logging;
pub mod models;
pub mod output;
pub mod session;
pub mod stats;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, DiscoveredHost, LatencyStats, LocalNetworkInfo, ScanReport, SpeedSample, TestResult, TransferSummary};
pub use latency::LatencyProbe;
pub use transfer::TransferEngine;
pub use identity::NetworkIdentityResolver;
pub use discovery::LanDiscoveryScanner;
pub use session::TestSessionOrchestrator;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_PING_URL: &str = "https://speed.cloudflare.com/__down?bytes=1";
    pub const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=50000000";
    pub const DEFAULT_UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";
    pub const DEFAULT_IDENTITY_URL: &str = "https://ipapi.co/json/";

    pub const DEFAULT_PING_ATTEMPTS: u32 = 15;
    pub const DEFAULT_TRANSFER_DURATION_MS: u64 = 10_000;
    pub const DEFAULT_PARALLEL_CONNECTIONS: usize = 4;
    pub const DEFAULT_TICK_MS: u64 = 250;

    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);
    pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Per-probe TCP connect timeout during LAN discovery
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(220);
    pub const DEFAULT_PROBE_CONCURRENCY: usize = 80;
    pub const DEFAULT_MAX_SCAN_HOSTS: u32 = 512;

    /// Transfer read/write chunk size
    pub const CHUNK_SIZE: usize = 64 * 1024;

    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const USER_AGENT: &str = concat!("netgauge/", env!("CARGO_PKG_VERSION"));
}
