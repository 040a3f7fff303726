//! In-process progress store

use super::traits::{newest_first, ProgressStore};
use crate::domain::{Result, TaskId, TransferProgress};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps snapshots in memory; nothing survives the process
#[derive(Default)]
pub struct MemoryProgressStore {
    snapshots: RwLock<HashMap<TaskId, TransferProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn save(&self, progress: &TransferProgress) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(progress.task_id.clone(), progress.clone());
        Ok(())
    }

    async fn load(&self, task_id: &TaskId) -> Result<Option<TransferProgress>> {
        Ok(self.snapshots.read().await.get(task_id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<TransferProgress>> {
        let all = self.snapshots.read().await.values().cloned().collect();
        Ok(newest_first(all, limit))
    }
}
