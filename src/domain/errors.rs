//! Domain error types
//!
//! This module defines the error hierarchy for dhis2sync.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main dhis2sync error type
///
/// This is the primary error type used throughout the library.
/// It wraps the remote-platform and import error types and carries
/// the state machine violations raised by the progress repository.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid transfer requests or inputs
    #[error("Validation error: {0}")]
    Validation(String),

    /// Errors talking to a DHIS2 instance
    #[error("DHIS2 error: {0}")]
    Platform(#[from] PlatformError),

    /// Errors raised while importing into the destination
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A progress mutation attempted a transition the state machine forbids
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A caller action requires the task to be in a different status
    #[error("task {task_id} is not {expected} (current status: {actual})")]
    StateMismatch {
        task_id: String,
        expected: String,
        actual: String,
    },

    /// No progress record exists for the task id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Progress store errors
    #[error("Progress store error: {0}")]
    Store(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Builds the error returned when a decision endpoint is called outside
    /// the awaiting-decision checkpoint.
    pub fn not_awaiting(task_id: impl Into<String>, actual: impl Into<String>) -> Self {
        SyncError::StateMismatch {
            task_id: task_id.into(),
            expected: "awaiting user decision".to_string(),
            actual: actual.into(),
        }
    }
}

/// DHIS2 REST errors
///
/// Errors that occur when interacting with a DHIS2 instance.
/// These errors don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Failed to reach the server
    #[error("Failed to connect to DHIS2 server: {0}")]
    ConnectionFailed(String),

    /// Credentials rejected (401/403)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Response body could not be decoded or lacked required fields
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Rate limit exceeded (429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Request timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

impl PlatformError {
    /// Whether the transport layer should retry the request
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::ConnectionFailed(_)
                | PlatformError::Timeout(_)
                | PlatformError::RateLimited(_)
                | PlatformError::ServerError { .. }
        )
    }
}

/// Chunked async import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// A chunk could not be submitted after all attempts
    #[error("failed to submit chunk {chunk}/{total}: {message}")]
    SubmissionFailed {
        chunk: usize,
        total: usize,
        message: String,
    },

    /// The destination accepted a chunk but returned no job id
    #[error("destination returned no job id for chunk {chunk}")]
    MissingJobId { chunk: usize },

    /// The destination reported the job as failed; carries its message verbatim
    #[error("{0}")]
    JobFailed(String),

    /// The job completed but its summary could not be read
    #[error("could not parse import summary: {0}")]
    Parse(String),

    /// A single poll loop ran out of attempts while the job was still running
    #[error("job {job_id} still running after {attempts} status checks")]
    PollTimeout { job_id: String, attempts: usize },

    /// The outer poll wrapper gave up
    #[error("job polling for {job_id} failed after {attempts} attempts: {last_error}")]
    PollExhausted {
        job_id: String,
        attempts: usize,
        last_error: String,
    },

    /// Status query failed at the transport level
    #[error("job status query failed: {0}")]
    Status(PlatformError),
}

impl ImportError {
    /// Whether the outer poll wrapper should re-run the poll loop
    ///
    /// Destination verdicts (job failure, unreadable summary) are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ImportError::PollTimeout { .. } | ImportError::Status(_))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Configuration(format!("TOML parse error: {err}"))
    }
}
