//! Chunked async importer
//!
//! Values are split into fixed-size chunks, each submitted as one async
//! import job. Submission is sequential with a short quadratic retry; a
//! chunk that cannot be submitted fails the whole import and leaves earlier
//! jobs running on the destination untracked. Submitted jobs are then
//! polled through a bounded pool, each poll loop wrapped in a long capped
//! exponential retry for slow destinations.

pub mod job;

pub use job::{evaluate_completion, parse_import_message, poll_job, AsyncJob, PollSettings};

use crate::adapters::dhis2::PlatformApi;
use crate::config::ImportConfig;
use crate::core::retry::{retry_with_backoff, retry_with_backoff_if, RetryPolicy};
use crate::domain::{ImportError, ImportSummary, PlatformError, ReportedValue};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Importer tuning, derived from `[import]`
#[derive(Debug, Clone, Copy)]
pub struct ImportSettings {
    pub chunk_size: usize,
    pub max_concurrent_polls: usize,
    pub poll: PollSettings,
    pub poll_retry: RetryPolicy,
    pub submit_retry: RetryPolicy,
}

impl From<&ImportConfig> for ImportSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            max_concurrent_polls: config.max_concurrent_polls.max(1),
            poll: PollSettings {
                interval: Duration::from_millis(config.poll_interval_ms),
                max_attempts: config.max_poll_attempts,
            },
            poll_retry: RetryPolicy::exponential(
                config.poll_retry_attempts,
                Duration::from_millis(config.poll_retry_initial_delay_ms),
                Duration::from_millis(config.poll_retry_max_delay_ms),
            ),
            submit_retry: RetryPolicy::quadratic(
                config.submit_attempts,
                Duration::from_millis(config.submit_base_delay_ms),
            ),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

/// Receives importer milestones, e.g. to drive a progress bar
#[async_trait]
pub trait ImportObserver: Send + Sync {
    async fn chunk_submitted(&self, _job: &AsyncJob, _total_chunks: usize) {}

    async fn job_finished(&self, _job: &AsyncJob, _finished: usize, _total_jobs: usize) {}
}

/// Observer that ignores every milestone
pub struct NoopObserver;

impl ImportObserver for NoopObserver {}

/// Splits values into consecutive chunks of at most `chunk_size`
pub fn chunk_values(values: &[ReportedValue], chunk_size: usize) -> Vec<&[ReportedValue]> {
    values.chunks(chunk_size.max(1)).collect()
}

pub struct BulkImporter {
    settings: ImportSettings,
}

impl BulkImporter {
    pub fn new(settings: ImportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Imports `values` and returns one summary per chunk, in completion order
    ///
    /// # Errors
    ///
    /// - `ImportError::SubmissionFailed` / `MissingJobId` if any chunk cannot be submitted
    /// - `ImportError::JobFailed` if the destination reports a job error
    /// - `ImportError::Parse` if a completion cannot be read
    /// - `ImportError::PollExhausted` if a job never completes
    pub async fn import_bulk(
        &self,
        api: &dyn PlatformApi,
        values: &[ReportedValue],
        observer: &dyn ImportObserver,
    ) -> Result<Vec<ImportSummary>, ImportError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let jobs = self.submit_all(api, values, observer).await?;
        self.poll_all(api, &jobs, observer).await
    }

    async fn submit_all(
        &self,
        api: &dyn PlatformApi,
        values: &[ReportedValue],
        observer: &dyn ImportObserver,
    ) -> Result<Vec<AsyncJob>, ImportError> {
        let chunks = chunk_values(values, self.settings.chunk_size);
        let total = chunks.len();
        let mut jobs = Vec::with_capacity(total);

        for (index, chunk) in chunks.into_iter().enumerate() {
            let chunk_no = index + 1;

            let job_id = retry_with_backoff(
                &self.settings.submit_retry,
                |_| api.submit_data_values(chunk),
                |attempt, e: &PlatformError, delay| {
                    crate::log_retry_attempt!(
                        "submit_chunk",
                        attempt,
                        self.settings.submit_retry.max_attempts,
                        delay.as_millis() as u64,
                        e
                    );
                },
            )
            .await
            .map_err(|e| ImportError::SubmissionFailed {
                chunk: chunk_no,
                total,
                message: e.to_string(),
            })?;

            if job_id.trim().is_empty() {
                return Err(ImportError::MissingJobId { chunk: chunk_no });
            }

            let job = AsyncJob {
                job_id,
                chunk: chunk_no,
                value_count: chunk.len(),
            };
            tracing::debug!(
                job_id = %job.job_id,
                chunk = chunk_no,
                total_chunks = total,
                values = job.value_count,
                "Import chunk submitted"
            );
            observer.chunk_submitted(&job, total).await;
            jobs.push(job);
        }

        Ok(jobs)
    }

    async fn poll_all(
        &self,
        api: &dyn PlatformApi,
        jobs: &[AsyncJob],
        observer: &dyn ImportObserver,
    ) -> Result<Vec<ImportSummary>, ImportError> {
        let total = jobs.len();
        let finished = AtomicUsize::new(0);

        let polls: Vec<_> = jobs
            .iter()
            .map(|job| {
                let finished = &finished;
                async move {
                    let summary = self.poll_with_retry(api, job).await?;
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    observer.job_finished(job, done, total).await;
                    Ok::<_, ImportError>(summary)
                }
            })
            .collect();

        stream::iter(polls)
            .buffer_unordered(self.settings.max_concurrent_polls)
            .try_collect()
            .await
    }

    /// Runs poll loops until the job completes, restarting retryable failures
    async fn poll_with_retry(
        &self,
        api: &dyn PlatformApi,
        job: &AsyncJob,
    ) -> Result<ImportSummary, ImportError> {
        let policy = &self.settings.poll_retry;

        retry_with_backoff_if(
            policy,
            |_| poll_job(api, job, self.settings.poll),
            ImportError::is_retryable,
            |attempt, e, delay| {
                crate::log_retry_attempt!(
                    "poll_job",
                    attempt,
                    policy.max_attempts,
                    delay.as_millis() as u64,
                    e
                );
            },
        )
        .await
        .map_err(|e| {
            if e.is_retryable() {
                ImportError::PollExhausted {
                    job_id: job.job_id.clone(),
                    attempts: policy.max_attempts,
                    last_error: e.to_string(),
                }
            } else {
                e
            }
        })
    }
}
