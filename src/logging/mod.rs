//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output for interactive runs
//! - JSON-formatted file logs with rotation
//! - `RUST_LOG` overrides of the configured level
//!
//! # Example
//!
//! ```no_run
//! use dhis2sync::logging::init_logging;
//! use dhis2sync::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(task_id = "abc", "Transfer started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a transfer
///
/// # Example
///
/// ```no_run
/// use dhis2sync::log_transfer_start;
/// use dhis2sync::domain::TaskId;
///
/// let task_id = TaskId::generate();
/// log_transfer_start!(task_id, "national", "BfMAe6Itzgt");
/// ```
#[macro_export]
macro_rules! log_transfer_start {
    ($task_id:expr, $profile:expr, $data_set:expr) => {
        tracing::info!(
            task_id = %$task_id,
            profile = %$profile,
            data_set = %$data_set,
            "Starting transfer"
        );
    };
}

/// Log the resting status a transfer reached
///
/// # Example
///
/// ```no_run
/// use dhis2sync::log_transfer_complete;
/// use dhis2sync::domain::{TaskId, TransferStatus};
///
/// let task_id = TaskId::generate();
/// log_transfer_complete!(task_id, TransferStatus::Completed, 1200u64);
/// ```
#[macro_export]
macro_rules! log_transfer_complete {
    ($task_id:expr, $status:expr, $duration_ms:expr) => {
        tracing::info!(
            task_id = %$task_id,
            status = %$status,
            duration_ms = $duration_ms,
            "Transfer finished"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use dhis2sync::log_error_with_context;
/// use dhis2sync::domain::SyncError;
///
/// let error = SyncError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
    ($error:expr, $context:expr, $task_id:expr) => {
        tracing::error!(
            task_id = %$task_id,
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use dhis2sync::log_retry_attempt;
///
/// log_retry_attempt!("submit_chunk", 2, 3, 2000u64, "Server error: 502");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($operation:expr, $attempt:expr, $max_attempts:expr, $delay_ms:expr, $reason:expr) => {
        tracing::warn!(
            operation = $operation,
            attempt = $attempt,
            max_attempts = $max_attempts,
            delay_ms = $delay_ms,
            reason = %$reason,
            "Retrying operation"
        );
    };
}

/// Log a status check of a running import job
///
/// # Example
///
/// ```no_run
/// use dhis2sync::log_job_progress;
///
/// log_job_progress!("Xa3KQ7bLm1p", 1, 5, "Importing data values");
/// ```
#[macro_export]
macro_rules! log_job_progress {
    ($job_id:expr, $chunk:expr, $attempt:expr, $message:expr) => {
        tracing::debug!(
            job_id = %$job_id,
            chunk = $chunk,
            attempt = $attempt,
            message = %$message,
            "Import job still running"
        );
    };
}
