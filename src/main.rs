// ABOUTME: Main entry point for devharbor
//
// Binary: devharbor
// Usage: devharbor <COMMAND>
// - resolve: show the devcontainer config a project resolves to
// - up: build and start a project's container
// - shell: open a shell routed to the host or the project container
// - config: print the effective configuration

#![allow(missing_docs)]

use anyhow::Result;
use clap::Parser;

use devharbor::cli;
use devharbor::config::{AppConfig, LoggingConfig};

/// Terminal cleanup utility to ensure proper restoration
fn cleanup_terminal() {
    let _ = crossterm::terminal::disable_raw_mode();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    setup_logging(&config.logging);
    setup_panic_handler();

    let args = cli::Cli::parse();
    tracing::debug!("Effective configuration: {:?}", config);

    let result = match args.command {
        cli::Commands::Resolve(resolve_args) => cli::resolve::execute(resolve_args, args.format).await,
        cli::Commands::Up(up_args) => cli::up::execute(up_args, &config, args.format).await,
        cli::Commands::Shell(shell_args) => cli::shell::execute(shell_args, &config).await,
        cli::Commands::Config(config_args) => cli::config::execute(config_args, &config, args.format),
    };

    // Ensure terminal is cleaned up on any error
    if let Err(e) = &result {
        cleanup_terminal();
        tracing::error!("Command failed: {:#}", e);
    }

    result
}

fn setup_logging(logging: &LoggingConfig) {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = logging.resolve_directory();
    let _ = std::fs::create_dir_all(&log_dir);

    // Create JSONL log file with timestamp
    let log_file = log_dir.join(format!(
        "devharbor-{}.jsonl",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| "devharbor=info".into());

    // Logging is best effort: an unwritable log directory must not stop the CLI
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_file) else {
        eprintln!("Warning: could not open log file {}", log_file.display());
        return;
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()             // Output in JSON Lines format
                .with_target(true)  // Include target module in JSON
                .with_writer(file)
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn setup_panic_handler() {
    use tracing::error;

    std::panic::set_hook(Box::new(|panic_info| {
        // Ensure terminal is restored before logging the panic
        cleanup_terminal();

        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
