//! Command-line interface

use crate::{config::EnvManager, models::LocalNetworkInfo, types::LinkKind};
use clap::Parser;
use std::net::Ipv4Addr;

/// netgauge - network path speed test and LAN host discovery
#[derive(Parser, Debug, Clone)]
#[command(name = "netgauge")]
#[command(version, about, long_about = None)]
#[command(after_long_help = EnvManager::display_env_help())]
pub struct Cli {
    /// Number of latency probes after the warm-up request
    #[arg(long, value_name = "N")]
    pub ping_count: Option<u32>,

    /// Length of each transfer phase in milliseconds
    #[arg(long, value_name = "MS")]
    pub duration_ms: Option<u64>,

    /// Parallel connections per transfer phase
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Throughput sampling interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Connect and read timeout in seconds
    #[arg(short, long, value_name = "SECS", value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// Endpoint for latency probes
    #[arg(long, value_name = "URL")]
    pub ping_url: Option<String>,

    /// Large-object endpoint for download workers
    #[arg(long, value_name = "URL")]
    pub download_url: Option<String>,

    /// Sink endpoint for upload workers
    #[arg(long, value_name = "URL")]
    pub upload_url: Option<String>,

    /// Public IP / ISP lookup endpoint
    #[arg(long, value_name = "URL")]
    pub identity_url: Option<String>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Print every snapshot as one JSON line
    #[arg(long)]
    pub json: bool,

    /// Discover hosts on the local subnet instead of running a speed test
    #[arg(long)]
    pub scan: bool,

    /// This device's address on the local network
    #[arg(long, value_name = "IP")]
    pub local_ip: Option<Ipv4Addr>,

    /// Default gateway address
    #[arg(long, value_name = "IP")]
    pub gateway: Option<Ipv4Addr>,

    /// Subnet prefix length (0 = unknown, /24 is assumed)
    #[arg(long, value_name = "BITS", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=32))]
    pub prefix: u8,

    /// How this device is attached to the network
    #[arg(long, value_name = "KIND", default_value = "wifi", value_parser = parse_link_kind)]
    pub link: LinkKind,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.scan {
            if self.local_ip.is_none() {
                return Err("--scan requires --local-ip".to_string());
            }
        } else if self.local_ip.is_some() || self.gateway.is_some() {
            return Err("--local-ip and --gateway are only used with --scan".to_string());
        }

        Ok(())
    }

    /// Network description for a discovery scan, when one was requested
    pub fn network_info(&self) -> Option<LocalNetworkInfo> {
        if !self.scan {
            return None;
        }
        let local_ip = self.local_ip?;
        Some(LocalNetworkInfo::new(
            local_ip,
            self.gateway.unwrap_or(Ipv4Addr::UNSPECIFIED),
            self.prefix,
            self.link,
        ))
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color || self.json {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a timeout in whole seconds (1..=300)
fn parse_timeout(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if secs > 300 {
                Err("Timeout cannot exceed 300 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

fn parse_link_kind(s: &str) -> Result<LinkKind, String> {
    s.parse::<LinkKind>().map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(["netgauge"]);
        assert_eq!(cli.ping_count, None);
        assert_eq!(cli.timeout, None);
        assert_eq!(cli.prefix, 0);
        assert_eq!(cli.link, LinkKind::Wifi);
        assert!(!cli.scan);
        assert!(!cli.json);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_parsing_speed_test_options() {
        let cli = Cli::parse_from([
            "netgauge",
            "--ping-count", "12",
            "--duration-ms", "5000",
            "--parallel", "8",
            "--tick-ms", "100",
            "--timeout", "5",
            "--download-url", "https://example.com/down",
            "--no-color",
            "--verbose",
            "--json",
        ]);

        assert_eq!(cli.ping_count, Some(12));
        assert_eq!(cli.duration_ms, Some(5000));
        assert_eq!(cli.parallel, Some(8));
        assert_eq!(cli.tick_ms, Some(100));
        assert_eq!(cli.timeout, Some(5));
        assert_eq!(cli.download_url.as_deref(), Some("https://example.com/down"));
        assert!(cli.no_color);
        assert!(cli.verbose);
        assert!(!cli.use_colors());
    }

    #[test]
    fn test_scan_arguments() {
        let cli = Cli::parse_from([
            "netgauge",
            "--scan",
            "--local-ip", "192.168.1.10",
            "--gateway", "192.168.1.1",
            "--prefix", "24",
            "--link", "ethernet",
        ]);
        assert!(cli.validate().is_ok());

        let info = cli.network_info().unwrap();
        assert_eq!(info.local_ip, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(info.gateway(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(info.netmask_bits, 24);
        assert_eq!(info.link, LinkKind::Ethernet);
    }

    #[test]
    fn test_scan_without_gateway() {
        let cli = Cli::parse_from(["netgauge", "--scan", "--local-ip", "10.0.0.5"]);
        let info = cli.network_info().unwrap();
        assert_eq!(info.gateway(), None);
        assert_eq!(info.netmask_bits, 0);
    }

    #[test]
    fn test_invalid_combinations() {
        let cli = Cli::parse_from(["netgauge", "--scan"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["netgauge", "--local-ip", "10.0.0.5"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["netgauge", "--color", "--no-color"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_rejected_values() {
        assert!(Cli::try_parse_from(["netgauge", "--prefix", "33"]).is_err());
        assert!(Cli::try_parse_from(["netgauge", "--link", "pigeon"]).is_err());
        assert!(Cli::try_parse_from(["netgauge", "--local-ip", "not-an-ip"]).is_err());
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(parse_timeout("1").unwrap(), 1);
        assert_eq!(parse_timeout("300").unwrap(), 300);
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("301").is_err());
        assert!(parse_timeout("+10").is_err());
        assert!(parse_timeout("0x10").is_err());
        assert!(parse_timeout("10.5").is_err());
        assert!(parse_timeout("").is_err());
    }
}
