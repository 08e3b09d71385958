//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load `.env` from the current directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug).map(|_| ())
    }

    /// Load a specific env file; returns whether one was found.
    /// Variables already set in the process environment are kept.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<bool> {
        if !path.exists() {
            if debug {
                eprintln!("No {} file found, using defaults and CLI arguments", path.display());
            }
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

        if debug {
            eprintln!("Loaded configuration from {}", path.display());
        }
        Ok(true)
    }

    /// Validate one variable's format before it is merged
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "NETGAUGE_PING_URL" | "NETGAUGE_DOWNLOAD_URL" | "NETGAUGE_UPLOAD_URL" | "NETGAUGE_IDENTITY_URL" => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", key, value, e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::config(format!("{} must use http or https: {}", key, value)));
                }
            }
            "NETGAUGE_PING_ATTEMPTS" => check_range::<u32>(key, value, 1, 100)?,
            "NETGAUGE_DURATION_MS" => check_range::<u64>(key, value, 1, 120_000)?,
            "NETGAUGE_PARALLEL" => check_range::<usize>(key, value, 1, 32)?,
            "NETGAUGE_TICK_MS" | "NETGAUGE_CONNECT_TIMEOUT_MS" | "NETGAUGE_READ_TIMEOUT_MS"
            | "NETGAUGE_PROBE_TIMEOUT_MS" => check_range::<u64>(key, value, 1, u64::MAX)?,
            "NETGAUGE_PROBE_CONCURRENCY" => check_range::<usize>(key, value, 1, 1024)?,
            "NETGAUGE_ENABLE_COLOR" => {
                value
                    .trim()
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// All supported environment variables with a description and an example
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("NETGAUGE_PING_URL", "Latency probe endpoint", "https://speed.cloudflare.com/__down?bytes=1"),
            ("NETGAUGE_DOWNLOAD_URL", "Download endpoint", "https://speed.cloudflare.com/__down?bytes=50000000"),
            ("NETGAUGE_UPLOAD_URL", "Upload endpoint", "https://speed.cloudflare.com/__up"),
            ("NETGAUGE_IDENTITY_URL", "Public IP / ISP lookup endpoint", "https://ipapi.co/json/"),
            ("NETGAUGE_PING_ATTEMPTS", "Latency probes per test (1-100)", "15"),
            ("NETGAUGE_DURATION_MS", "Transfer phase length in ms", "10000"),
            ("NETGAUGE_PARALLEL", "Parallel connections (1-32)", "4"),
            ("NETGAUGE_TICK_MS", "Throughput sampling interval in ms", "250"),
            ("NETGAUGE_CONNECT_TIMEOUT_MS", "Connect timeout in ms", "10000"),
            ("NETGAUGE_READ_TIMEOUT_MS", "Read timeout in ms", "20000"),
            ("NETGAUGE_PROBE_TIMEOUT_MS", "Discovery probe timeout in ms", "220"),
            ("NETGAUGE_PROBE_CONCURRENCY", "Simultaneous discovery probes", "80"),
            ("NETGAUGE_ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Environment section appended to `--help`
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<28} {}\n", var, description));
            help.push_str(&format!("  {:<28} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Warnings for currently set variables that would fail to merge
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}

fn check_range<T>(key: &str, value: &str, min: T, max: T) -> Result<()>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
    if parsed < min || parsed > max {
        return Err(AppError::config(format!("{} must be between {} and {}, got: {}", key, min, max, parsed)));
    }
    Ok(())
}
