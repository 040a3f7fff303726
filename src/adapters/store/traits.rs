//! Progress store abstraction
//!
//! Transfer snapshots are persisted through [`ProgressStore`] so that status
//! queries survive a restart. Writes are best effort from the engine's point
//! of view; callers log failures instead of aborting a transfer.

use crate::domain::{Result, TaskId, TransferProgress};
use async_trait::async_trait;

/// Durable storage for transfer progress snapshots
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Short backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Inserts or replaces the snapshot of a task
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` if the snapshot cannot be written.
    async fn save(&self, progress: &TransferProgress) -> Result<()>;

    /// Loads the snapshot of a task, `None` if it was never saved
    async fn load(&self, task_id: &TaskId) -> Result<Option<TransferProgress>>;

    /// Lists stored snapshots, most recently started first
    async fn list(&self, limit: usize) -> Result<Vec<TransferProgress>>;
}

/// Sorts snapshots newest first and applies `limit`
pub(crate) fn newest_first(
    mut snapshots: Vec<TransferProgress>,
    limit: usize,
) -> Vec<TransferProgress> {
    snapshots.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    snapshots.truncate(limit);
    snapshots
}
