//! netgauge - command-line entry point
//!
//! Runs a speed test session (identity, latency, download, upload) or a
//! LAN discovery scan and prints the results.

use clap::Parser;
use netgauge::{
    cli::Cli,
    config::load_config,
    discovery::LanDiscoveryScanner,
    error::{AppError, Result},
    models::{Config, LocalNetworkInfo},
    output::{json_line, OutputFormatter, OutputFormatterFactory},
    session::TestSessionOrchestrator,
    PKG_NAME, VERSION,
};
use std::io::Write;
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        let error = AppError::validation(message);
        eprintln!("{}", error.format_for_console(cli.use_colors()));
        process::exit(error.exit_code());
    }

    if let Err(e) = run_application(cli.clone()).await {
        eprintln!("{}", e.format_for_console(cli.use_colors()));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    if cli.debug {
        eprintln!("{} v{}", PKG_NAME, VERSION);
        if let Some(built) = option_env!("BUILD_TIME") {
            eprintln!("Built {} ({})", built, option_env!("GIT_COMMIT").unwrap_or("unknown commit"));
        }
    }

    let config = load_config(cli.clone())?;
    let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);

    match cli.network_info() {
        Some(network) => run_scan(&config, &network, formatter.as_ref(), cli.json).await,
        None => run_speed_test(config, formatter.as_ref(), cli.json).await,
    }
}

async fn run_speed_test(config: Config, formatter: &dyn OutputFormatter, json: bool) -> Result<()> {
    let orchestrator = TestSessionOrchestrator::from_config(config)?;
    let mut snapshots = orchestrator.start_test();

    if !json {
        println!("{}", formatter.format_header(&format!("{} v{}", PKG_NAME, VERSION))?);
    }

    let mut stdout = std::io::stdout();
    let mut last_phase = None;
    while let Some(snapshot) = snapshots.recv().await {
        if json {
            println!("{}", json_line(&snapshot)?);
            continue;
        }

        if snapshot.is_terminal() {
            println!();
            println!();
            println!("{}", formatter.format_summary(&snapshot)?);
            if snapshot.latency.is_some_and(|latency| latency.is_offline()) {
                eprintln!("{}", formatter.format_warning("No endpoint answered; check the connection and the configured URLs")?);
            }
            continue;
        }

        // Live samples of one phase overwrite each other on a single line
        if last_phase.is_some() && last_phase != Some(snapshot.phase) {
            println!();
        }
        print!("\r{}", formatter.format_progress(&snapshot)?);
        stdout.flush()?;
        last_phase = Some(snapshot.phase);
    }

    Ok(())
}

async fn run_scan(
    config: &Config,
    network: &LocalNetworkInfo,
    formatter: &dyn OutputFormatter,
    json: bool,
) -> Result<()> {
    let scanner = LanDiscoveryScanner::from_config(config);

    if !json {
        eprintln!(
            "Scanning {}/{} ...",
            network.local_ip,
            if network.netmask_bits == 0 { 24 } else { network.netmask_bits }
        );
    }

    let report = scanner.scan(network).await?;

    if json {
        println!("{}", json_line(&report)?);
    } else {
        println!("{}", formatter.format_scan(&report)?);
    }
    Ok(())
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file and NETGAUGE_* variables");
            eprintln!("  - URLs must start with http:// or https://");
            eprintln!("  - The tick interval cannot exceed the transfer duration");
        }
        AppError::Validation(_) => {
            eprintln!();
            eprintln!("Usage help:");
            eprintln!("  - --scan needs --local-ip (and usually --gateway and --prefix)");
            eprintln!("  - Run with --help for all options");
        }
        AppError::Discovery(_) | AppError::Io(_) => {
            eprintln!();
            eprintln!("Discovery troubleshooting:");
            eprintln!("  - The neighbor table may not be readable on this platform");
            eprintln!("  - Try again with --debug for details");
        }
        _ => {}
    }
}
