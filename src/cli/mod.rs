//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for dhis2sync using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// DHIS2 Sync - Aggregate data transfer between DHIS2 instances
#[derive(Parser, Debug)]
#[command(name = "dhis2sync")]
#[command(version, about, long_about = None)]
#[command(author = "DHIS2 Sync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "dhis2sync.toml", env = "DHIS2SYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DHIS2SYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a transfer described by a request file
    Transfer(commands::transfer::TransferArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show stored transfer progress
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
