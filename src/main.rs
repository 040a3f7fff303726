// DHIS2 Sync - Aggregate data transfer engine for DHIS2 instances
// Copyright (c) 2025 DHIS2 Sync Contributors
// Licensed under the MIT License

use clap::Parser;
use dhis2sync::cli::commands::{EXIT_CANCELLED, EXIT_FATAL};
use dhis2sync::cli::{Cli, Commands};
use dhis2sync::config::LoggingConfig;
use dhis2sync::logging::init_logging;
use std::process;

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Console only; file logging belongs to long-running embedders
    let log_level = cli.log_level.as_deref().unwrap_or("info");
    let guard = match init_logging(log_level, &LoggingConfig::console_only()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "dhis2sync - DHIS2 aggregate data transfer"
    );

    let exit_code = tokio::select! {
        result = execute_command(&cli) => match result {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "Command execution failed");
                eprintln!("Error: {e}");
                EXIT_FATAL
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Received SIGINT (Ctrl+C), stopping");
            eprintln!("\nInterrupted. Import jobs already submitted keep running on the destination.");
            EXIT_CANCELLED
        }
    };

    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Transfer(args) => args.execute(&cli.config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Status(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
    }
}
