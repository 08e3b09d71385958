//! Data models and structures for netgauge

pub mod config;
pub mod discovery;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use discovery::{DiscoveredHost, LocalNetworkInfo, NeighborEntry, ScanReport};
pub use metrics::{LatencyStats, NetworkIdentity, SpeedFigures, SpeedSample, TestResult, TransferSummary};
