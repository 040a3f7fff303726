//! Directory-backed progress store
//!
//! Each task is one pretty-printed JSON document named `<task_id>.json`.
//! Writes go to a temporary file that is renamed over the previous
//! snapshot, so readers never observe a half-written document.

use super::traits::{newest_first, ProgressStore};
use crate::domain::{Result, SyncError, TaskId, TransferProgress};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    /// Opens the store, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` if the directory cannot be created.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|e| {
            SyncError::Store(format!(
                "Failed to create progress directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path, `None` for ids that are not safe file names
    fn path_for(&self, task_id: &TaskId) -> Option<PathBuf> {
        let id = task_id.as_str();
        let safe = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        safe.then(|| self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn save(&self, progress: &TransferProgress) -> Result<()> {
        let path = self.path_for(&progress.task_id).ok_or_else(|| {
            SyncError::Store(format!(
                "Task id '{}' cannot be used as a file name",
                progress.task_id
            ))
        })?;

        let json = serde_json::to_vec_pretty(progress)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, json)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to replace {}: {e}", path.display())))?;

        Ok(())
    }

    async fn load(&self, task_id: &TaskId) -> Result<Option<TransferProgress>> {
        let Some(path) = self.path_for(task_id) else {
            return Ok(None);
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Store(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn list(&self, limit: usize) -> Result<Vec<TransferProgress>> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            SyncError::Store(format!("Failed to list {}: {e}", self.dir.display()))
        })?;

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<TransferProgress>(&bytes) {
                    Ok(snapshot) => snapshots.push(snapshot),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable progress snapshot"
                    ),
                },
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable progress snapshot"
                ),
            }
        }

        Ok(newest_first(snapshots, limit))
    }
}
