//! Configuration data model and validation

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint hit by the latency probes (HEAD)
    #[serde(default = "default_ping_url")]
    pub ping_url: String,

    /// Large-object endpoint for download workers (GET)
    #[serde(default = "default_download_url")]
    pub download_url: String,

    /// Sink endpoint for upload workers (POST)
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// Public IP / organization lookup endpoint
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    /// Number of latency probes after the warm-up request
    #[serde(default = "default_ping_attempts")]
    pub ping_attempts: u32,

    /// Wall-clock length of each transfer phase
    #[serde(default = "default_transfer_duration_ms")]
    pub transfer_duration_ms: u64,

    /// Concurrent connections per transfer phase
    #[serde(default = "default_parallel_connections")]
    pub parallel_connections: usize,

    /// Sampling interval for throughput
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_identity_timeout_ms")]
    pub identity_timeout_ms: u64,

    /// Per-probe timeout during LAN discovery
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Simultaneous in-flight discovery probes
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    /// Ceiling on probed hosts; larger ranges are strided
    #[serde(default = "default_max_scan_hosts")]
    pub max_scan_hosts: u32,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ping_url: default_ping_url(),
            download_url: default_download_url(),
            upload_url: default_upload_url(),
            identity_url: default_identity_url(),
            ping_attempts: default_ping_attempts(),
            transfer_duration_ms: default_transfer_duration_ms(),
            parallel_connections: default_parallel_connections(),
            tick_ms: default_tick_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            identity_timeout_ms: default_identity_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_concurrency: default_probe_concurrency(),
            max_scan_hosts: default_max_scan_hosts(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("ping URL", &self.ping_url),
            ("download URL", &self.download_url),
            ("upload URL", &self.upload_url),
            ("identity URL", &self.identity_url),
        ] {
            if url.is_empty() {
                return Err(AppError::config(format!("The {} cannot be empty", name)));
            }
            match url::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => {
                    return Err(AppError::config(format!(
                        "The {} must use http or https, got '{}'",
                        name,
                        parsed.scheme()
                    )));
                }
                Err(e) => {
                    return Err(AppError::config(format!("Invalid {} '{}': {}", name, url, e)));
                }
            }
        }

        if self.ping_attempts == 0 {
            return Err(AppError::config("Ping attempts must be greater than 0"));
        }

        if self.ping_attempts > 100 {
            return Err(AppError::config("Ping attempts cannot exceed 100"));
        }

        if self.transfer_duration_ms == 0 {
            return Err(AppError::config("Transfer duration must be greater than 0"));
        }

        if self.transfer_duration_ms > 120_000 {
            return Err(AppError::config("Transfer duration cannot exceed 120000 ms"));
        }

        if self.tick_ms == 0 {
            return Err(AppError::config("Tick interval must be greater than 0"));
        }

        if self.tick_ms > self.transfer_duration_ms {
            return Err(AppError::config("Tick interval cannot be longer than the transfer duration"));
        }

        if self.parallel_connections == 0 {
            return Err(AppError::config("Parallel connections must be greater than 0"));
        }

        if self.parallel_connections > 32 {
            return Err(AppError::config("Parallel connections cannot exceed 32"));
        }

        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 || self.identity_timeout_ms == 0 {
            return Err(AppError::config("Timeouts must be greater than 0"));
        }

        if self.probe_timeout_ms == 0 {
            return Err(AppError::config("Probe timeout must be greater than 0"));
        }

        if self.probe_concurrency == 0 {
            return Err(AppError::config("Probe concurrency must be greater than 0"));
        }

        if self.max_scan_hosts == 0 {
            return Err(AppError::config("Maximum scan hosts must be greater than 0"));
        }

        Ok(())
    }

    /// Merge `NETGAUGE_*` environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Some(url) = env_value::<String>("NETGAUGE_PING_URL")? {
            self.ping_url = url;
        }
        if let Some(url) = env_value::<String>("NETGAUGE_DOWNLOAD_URL")? {
            self.download_url = url;
        }
        if let Some(url) = env_value::<String>("NETGAUGE_UPLOAD_URL")? {
            self.upload_url = url;
        }
        if let Some(url) = env_value::<String>("NETGAUGE_IDENTITY_URL")? {
            self.identity_url = url;
        }
        if let Some(attempts) = env_value("NETGAUGE_PING_ATTEMPTS")? {
            self.ping_attempts = attempts;
        }
        if let Some(duration) = env_value("NETGAUGE_DURATION_MS")? {
            self.transfer_duration_ms = duration;
        }
        if let Some(parallel) = env_value("NETGAUGE_PARALLEL")? {
            self.parallel_connections = parallel;
        }
        if let Some(tick) = env_value("NETGAUGE_TICK_MS")? {
            self.tick_ms = tick;
        }
        if let Some(timeout) = env_value("NETGAUGE_CONNECT_TIMEOUT_MS")? {
            self.connect_timeout_ms = timeout;
        }
        if let Some(timeout) = env_value("NETGAUGE_READ_TIMEOUT_MS")? {
            self.read_timeout_ms = timeout;
        }
        if let Some(timeout) = env_value("NETGAUGE_PROBE_TIMEOUT_MS")? {
            self.probe_timeout_ms = timeout;
        }
        if let Some(concurrency) = env_value("NETGAUGE_PROBE_CONCURRENCY")? {
            self.probe_concurrency = concurrency;
        }
        if let Some(enable_color) = env_value("NETGAUGE_ENABLE_COLOR")? {
            self.enable_color = enable_color;
        }

        Ok(())
    }
}

/// Read and parse one environment variable, `None` when unset or blank
fn env_value<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, raw, e))),
        _ => Ok(None),
    }
}

// Default value functions for serde
fn default_ping_url() -> String {
    crate::defaults::DEFAULT_PING_URL.to_string()
}

fn default_download_url() -> String {
    crate::defaults::DEFAULT_DOWNLOAD_URL.to_string()
}

fn default_upload_url() -> String {
    crate::defaults::DEFAULT_UPLOAD_URL.to_string()
}

fn default_identity_url() -> String {
    crate::defaults::DEFAULT_IDENTITY_URL.to_string()
}

fn default_ping_attempts() -> u32 {
    crate::defaults::DEFAULT_PING_ATTEMPTS
}

fn default_transfer_duration_ms() -> u64 {
    crate::defaults::DEFAULT_TRANSFER_DURATION_MS
}

fn default_parallel_connections() -> usize {
    crate::defaults::DEFAULT_PARALLEL_CONNECTIONS
}

fn default_tick_ms() -> u64 {
    crate::defaults::DEFAULT_TICK_MS
}

fn default_connect_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_read_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_READ_TIMEOUT.as_millis() as u64
}

fn default_identity_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_IDENTITY_TIMEOUT.as_millis() as u64
}

fn default_probe_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

fn default_probe_concurrency() -> usize {
    crate::defaults::DEFAULT_PROBE_CONCURRENCY
}

fn default_max_scan_hosts() -> u32 {
    crate::defaults::DEFAULT_MAX_SCAN_HOSTS
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parallel_connections, 4);
        assert_eq!(config.tick_ms, 250);
        assert_eq!(config.transfer_duration_ms, 10_000);
        assert_eq!(config.ping_attempts, 15);
    }

    #[test]
    fn test_empty_url_invalid() {
        let config = Config { download_url: String::new(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_url_invalid() {
        let config = Config { upload_url: "ftp://example.com/up".to_string(), ..Config::default() };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("upload URL"));
    }

    #[test]
    fn test_zero_attempts_invalid() {
        let config = Config { ping_attempts: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_longer_than_duration_invalid() {
        let config = Config { transfer_duration_ms: 200, tick_ms: 250, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parallelism_bounds() {
        assert!(Config { parallel_connections: 0, ..Config::default() }.validate().is_err());
        assert!(Config { parallel_connections: 33, ..Config::default() }.validate().is_err());
        assert!(Config { parallel_connections: 32, ..Config::default() }.validate().is_ok());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config::default();
        assert_eq!(config.probe_timeout(), Duration::from_millis(220));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"tick_ms": 100}"#).unwrap();
        assert_eq!(config.tick_ms, 100);
        assert_eq!(config.ping_url, crate::defaults::DEFAULT_PING_URL);
    }
}
