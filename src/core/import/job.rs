//! Async import job polling
//!
//! One poll loop queries the job status every interval until the
//! destination marks it completed; the outer wrapper in
//! [`super::BulkImporter`] restarts exhausted loops.

use crate::adapters::dhis2::{JobNotification, PlatformApi, DATA_VALUE_IMPORT_JOB};
use crate::domain::{ImportCount, ImportError, ImportSummary};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// A submitted chunk awaiting completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncJob {
    pub job_id: String,

    /// 1-based chunk index
    pub chunk: usize,

    pub value_count: usize,
}

fn summary_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(\d+)\s+created,\s+(\d+)\s+updated,\s+(\d+)\s+deleted,\s+(\d+)\s+ignored")
                .ok()
        })
        .as_ref()
}

/// Extracts counts from a completion message such as
/// `"Import complete with status SUCCESS, 3 created, 1 updated, 0 deleted, 2 ignored"`
///
/// # Errors
///
/// Returns `ImportError::Parse` if the message does not contain the pattern.
pub fn parse_import_message(message: &str) -> Result<ImportCount, ImportError> {
    let captures = summary_pattern()
        .and_then(|re| re.captures(message))
        .ok_or_else(|| ImportError::Parse(format!("unrecognised job message: '{message}'")))?;

    let number = |index: usize| -> Result<u64, ImportError> {
        captures[index]
            .parse()
            .map_err(|e| ImportError::Parse(format!("invalid count in '{message}': {e}")))
    };

    Ok(ImportCount {
        imported: number(1)?,
        updated: number(2)?,
        deleted: number(3)?,
        ignored: number(4)?,
    })
}

/// Turns a completed notification into a summary
///
/// Level ERROR fails the job with the destination's message verbatim; a
/// structured summary wins over the text message.
pub fn evaluate_completion(notification: &JobNotification) -> Result<ImportSummary, ImportError> {
    if notification.is_error() {
        return Err(ImportError::JobFailed(notification.message.clone()));
    }

    if let Some(summary) = &notification.summary {
        return Ok(summary.clone());
    }

    let counts = parse_import_message(&notification.message)?;
    let mut summary = ImportSummary::from_counts(counts);
    summary.description = notification.message.clone();
    Ok(summary)
}

/// Poll cadence of one loop
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: usize,
}

/// Polls one job until it completes or the loop is exhausted
///
/// An empty status array means the job has not started yet.
pub async fn poll_job(
    api: &dyn PlatformApi,
    job: &AsyncJob,
    settings: PollSettings,
) -> Result<ImportSummary, ImportError> {
    for attempt in 1..=settings.max_attempts {
        let notifications = api
            .job_status(DATA_VALUE_IMPORT_JOB, &job.job_id)
            .await
            .map_err(ImportError::Status)?;

        if let Some(latest) = notifications.first() {
            if latest.completed {
                return evaluate_completion(latest);
            }
            crate::log_job_progress!(job.job_id, job.chunk, attempt, latest.message);
        }

        if attempt < settings.max_attempts {
            tokio::time::sleep(settings.interval).await;
        }
    }

    Err(ImportError::PollTimeout {
        job_id: job.job_id.clone(),
        attempts: settings.max_attempts,
    })
}
