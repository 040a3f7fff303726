//! Transfer command implementation
//!
//! Runs one transfer in-process, streams its log lines to stdout and
//! settles an awaiting decision according to `--on-unmapped`.

use super::{exit_code_for, EXIT_AWAITING, EXIT_CANCELLED, EXIT_CONFIG, EXIT_CONNECTION, EXIT_FATAL, EXIT_SUCCESS};
use crate::config::load_config;
use crate::core::progress::ProgressEvent;
use crate::core::transfer::{TransferHandle, TransferService};
use crate::domain::{TaskId, TransferProgress, TransferRequest, TransferStatus};
use anyhow::Context;
use clap::{Args, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Time the log printer gets to drain after the task settles
const PRINTER_DRAIN: Duration = Duration::from_secs(2);

/// What to do when a transfer stops with unmapped values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnUnmapped {
    /// Leave the task awaiting a decision (exit code 3)
    Wait,
    /// Complete the transfer without the unmapped values
    Skip,
    /// Cancel the transfer
    Cancel,
}

/// Arguments for the transfer command
#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Transfer request file (.toml or .json)
    #[arg(short, long)]
    pub request: PathBuf,

    /// Decision applied when values have no element mapping
    #[arg(long, value_enum, default_value = "wait")]
    pub on_unmapped: OnUnmapped,

    /// Extra element mappings (.toml or .json table of source -> destination
    /// ids) used for one retry before `--on-unmapped` applies
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
}

impl TransferArgs {
    /// Execute the transfer command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(request = %self.request.display(), "Starting transfer command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let request = match load_request(&self.request) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Invalid transfer request: {e:#}");
                return Ok(EXIT_CONFIG);
            }
        };

        let mapping = match self.mapping.as_deref().map(load_mapping).transpose() {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Invalid mapping file: {e:#}");
                return Ok(EXIT_CONFIG);
            }
        };

        let service = match TransferService::from_config(&config).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to open progress store: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        println!(
            "Transferring {} ({} periods) using profile '{}'",
            request.source_dataset,
            request.normalized_periods().len(),
            request.profile_id
        );

        let events = service.repository().bus().subscribe();
        let handle = match service.start_transfer(request).await {
            Ok(h) => h,
            Err(e) => {
                eprintln!("Transfer rejected: {e}");
                return Ok(exit_code_for(&e));
            }
        };
        let task_id = handle.task_id.clone();
        println!("Task {task_id}");

        let mut status = match settle(handle, events, &task_id, 0).await {
            Ok(status) => status,
            Err(code) => return Ok(code),
        };

        if status == TransferStatus::AwaitingUserDecision {
            if let Some(mapping) = mapping {
                println!("Retrying with {} additional mappings", mapping.len());
                let seen = service.get_progress(&task_id).await?.messages_logged;
                let events = service.repository().bus().subscribe();
                let handle = match service.retry_with_new_mappings(&task_id, mapping).await {
                    Ok(h) => h,
                    Err(e) => {
                        eprintln!("Retry rejected: {e}");
                        return Ok(exit_code_for(&e));
                    }
                };
                status = match settle(handle, events, &task_id, seen).await {
                    Ok(status) => status,
                    Err(code) => return Ok(code),
                };
            }
        }

        if status == TransferStatus::AwaitingUserDecision {
            status = match self.on_unmapped {
                OnUnmapped::Wait => status,
                OnUnmapped::Skip => {
                    let progress = service.skip_unmapped_and_complete(&task_id).await?;
                    print_tail(&progress, 2);
                    progress.status
                }
                OnUnmapped::Cancel => {
                    let progress = service.cancel_transfer(&task_id).await?;
                    print_tail(&progress, 1);
                    progress.status
                }
            };
        }

        let progress = service.get_progress(&task_id).await?;
        print_summary(&progress);

        Ok(match status {
            TransferStatus::Completed => EXIT_SUCCESS,
            TransferStatus::AwaitingUserDecision => {
                println!();
                println!("Transfer is awaiting a decision. Unmapped data elements:");
                for element in progress.unmapped_elements() {
                    println!("  - {element}");
                }
                EXIT_AWAITING
            }
            TransferStatus::Cancelled => EXIT_CANCELLED,
            _ => EXIT_FATAL,
        })
    }
}

/// Waits for a run to settle while printing log lines past the first `seen`
///
/// Returns the exit code as `Err` when the run failed.
async fn settle(
    handle: TransferHandle,
    events: broadcast::Receiver<ProgressEvent>,
    task_id: &TaskId,
    seen: u64,
) -> Result<TransferStatus, i32> {
    let printer = spawn_printer(events, task_id.clone(), seen);

    let outcome = handle.join.await;
    if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
        tracing::debug!(task_id = %task_id, "Log printer did not drain in time");
    }

    match outcome {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => {
            eprintln!("Transfer failed: {e}");
            Err(exit_code_for(&e))
        }
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "Transfer task panicked");
            eprintln!("Transfer task aborted: {e}");
            Err(EXIT_FATAL)
        }
    }
}

/// Prints each new log line of `task_id` until the task rests
fn spawn_printer(
    mut events: broadcast::Receiver<ProgressEvent>,
    task_id: TaskId,
    mut seen: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped = skipped, "Log printer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if event.task_id != task_id {
                continue;
            }

            for line in fresh_lines(&event.snapshot, &mut seen) {
                println!("[{:>3}%] {line}", event.progress);
            }

            if event.status.is_terminal() || event.status == TransferStatus::AwaitingUserDecision {
                break;
            }
        }
    })
}

/// Lines of `progress` not yet printed; advances `seen` past them
fn fresh_lines<'a>(progress: &'a TransferProgress, seen: &mut u64) -> Vec<&'a String> {
    let lines = progress.messages_since(*seen).collect();
    *seen = (*seen).max(progress.messages_logged);
    lines
}

fn print_tail(progress: &TransferProgress, lines: usize) {
    let skip = progress.messages.len().saturating_sub(lines);
    for line in progress.messages.iter().skip(skip) {
        println!("[{:>3}%] {line}", progress.progress);
    }
}

fn print_summary(progress: &TransferProgress) {
    println!();
    println!("Transfer Summary:");
    println!("  Status: {}", progress.status);
    println!("  Fetched: {}", progress.total_fetched);
    println!("  Mapped: {}", progress.total_mapped);
    println!("  Imported: {}", progress.total_imported);
    println!("  Skipped: {}", progress.total_skipped);
    if !progress.not_found_units.is_empty() {
        println!(
            "  Org units not found: {} ({} values)",
            progress.not_found_units.len(),
            progress.not_found_values
        );
    }
    if let Some(summary) = &progress.import_summary {
        println!("  Import: {} - {}", summary.status, summary.description);
    }
    if let Some(error) = &progress.error {
        println!("  Error: {error}");
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Reads a transfer request from TOML or JSON
pub fn load_request(path: &Path) -> anyhow::Result<TransferRequest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let request = if is_json(path) {
        serde_json::from_str(&contents)?
    } else {
        toml::from_str(&contents)?
    };
    Ok(request)
}

/// Reads a flat source -> destination element table from TOML or JSON
pub fn load_mapping(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mapping = if is_json(path) {
        serde_json::from_str(&contents)?
    } else {
        toml::from_str(&contents)?
    };
    Ok(mapping)
}
