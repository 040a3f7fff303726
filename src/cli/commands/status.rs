//! Status command implementation
//!
//! This module implements the `status` command for displaying stored
//! transfer progress.

use super::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_SUCCESS};
use crate::adapters::store::create_progress_store;
use crate::config::load_config;
use crate::domain::{TaskId, TransferProgress};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show the full progress of a single task
    #[arg(long)]
    pub task_id: Option<String>,

    /// Maximum number of transfers to list
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking transfer status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let store = match create_progress_store(&config.store).await {
            Ok(s) => s,
            Err(e) => {
                println!("Failed to open {:?} progress store", config.store.backend);
                println!("   Error: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        if let Some(raw) = &self.task_id {
            let task_id = match TaskId::new(raw.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    println!("Invalid task id: {e}");
                    return Ok(EXIT_CONFIG);
                }
            };
            return Ok(match store.load(&task_id).await {
                Ok(Some(progress)) => {
                    print_detail(&progress);
                    EXIT_SUCCESS
                }
                Ok(None) => {
                    println!("No transfer found with id {task_id}");
                    EXIT_FATAL
                }
                Err(e) => {
                    println!("Failed to load task {task_id}");
                    println!("   Error: {e}");
                    EXIT_FATAL
                }
            });
        }

        let transfers = match store.list(self.limit).await {
            Ok(t) => t,
            Err(e) => {
                println!("Failed to list transfers");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        if transfers.is_empty() {
            println!("No transfer history found.");
            println!("Run 'dhis2sync transfer --request <file>' to start a transfer.");
            return Ok(EXIT_SUCCESS);
        }

        println!("Found {} transfer(s) in the {} store:", transfers.len(), store.backend_name());
        println!();
        println!(
            "{:<38} {:<24} {:>5} {:>10} {:>10} {:<20}",
            "Task ID", "Status", "%", "Fetched", "Imported", "Started"
        );
        println!("{}", "-".repeat(112));

        for progress in &transfers {
            println!(
                "{:<38} {:<24} {:>5} {:>10} {:>10} {:<20}",
                progress.task_id.as_str(),
                progress.status.as_str(),
                progress.progress,
                progress.total_fetched,
                progress.total_imported,
                progress.started_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        println!();
        Ok(EXIT_SUCCESS)
    }
}

fn print_detail(progress: &TransferProgress) {
    println!("Task: {}", progress.task_id);
    println!("  Status: {} ({}%)", progress.status, progress.progress);
    println!("  Started: {}", progress.started_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(completed_at) = progress.completed_at {
        println!("  Finished: {}", completed_at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!(
        "  Values: {} fetched, {} mapped, {} imported, {} skipped",
        progress.total_fetched, progress.total_mapped, progress.total_imported, progress.total_skipped
    );
    if progress.unmapped_count() > 0 {
        println!(
            "  Unmapped: {} values for {}",
            progress.unmapped_count(),
            progress.unmapped_elements().join(", ")
        );
    }
    if let Some(error) = &progress.error {
        println!("  Error: {error}");
    }

    println!();
    println!("Log:");
    for line in &progress.messages {
        println!("  {line}");
    }
}
