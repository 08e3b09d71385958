//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Combines defaults, `.env`, the process environment and CLI arguments
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        if self.cli.debug {
            for warning in EnvManager::validate_current_env() {
                eprintln!("{}", warning);
            }
        }
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(count) = cli.ping_count {
            config.ping_attempts = count;
        }
        if let Some(duration) = cli.duration_ms {
            config.transfer_duration_ms = duration;
        }
        if let Some(parallel) = cli.parallel {
            config.parallel_connections = parallel;
        }
        if let Some(tick) = cli.tick_ms {
            config.tick_ms = tick;
        }
        if let Some(secs) = cli.timeout {
            config.connect_timeout_ms = secs * 1000;
            config.read_timeout_ms = secs * 1000;
            config.identity_timeout_ms = secs * 1000;
        }

        for (target, value) in [
            (&mut config.ping_url, &cli.ping_url),
            (&mut config.download_url, &cli.download_url),
            (&mut config.upload_url, &cli.upload_url),
            (&mut config.identity_url, &cli.identity_url),
        ] {
            if let Some(url) = value {
                *target = url.clone();
            }
        }

        if cli.no_color || cli.json {
            config.enable_color = false;
        } else if cli.color {
            config.enable_color = true;
        }

        // CLI-only
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    [
        format!("Ping URL: {}", config.ping_url),
        format!("Download URL: {}", config.download_url),
        format!("Upload URL: {}", config.upload_url),
        format!("Identity URL: {}", config.identity_url),
        format!("Ping attempts: {}", config.ping_attempts),
        format!(
            "Transfer: {}ms x {} connections, tick {}ms",
            config.transfer_duration_ms, config.parallel_connections, config.tick_ms
        ),
        format!(
            "Timeouts: connect {}ms, read {}ms, identity {}ms",
            config.connect_timeout_ms, config.read_timeout_ms, config.identity_timeout_ms
        ),
        format!(
            "Discovery: {} probes in flight, {}ms per probe",
            config.probe_concurrency, config.probe_timeout_ms
        ),
        format!("Color Output: {}", config.enable_color),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ]
    .join("\n")
}
