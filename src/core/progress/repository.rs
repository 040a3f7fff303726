//! Progress repository
//!
//! Owns the live [`TransferProgress`] of every task in this process. Reads
//! come from the in-memory map first and fall back to the durable store;
//! every mutation is validated against the status transition table, then
//! persisted (best effort) and published on the event bus.

use super::events::{EventBus, ProgressEvent};
use crate::adapters::store::ProgressStore;
use crate::domain::{Result, SyncError, TaskId, TransferProgress, TransferStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ProgressRepository {
    tasks: Mutex<HashMap<TaskId, TransferProgress>>,
    store: Arc<dyn ProgressStore>,
    bus: Arc<EventBus>,

    /// Serializes durable writes so the newest snapshot is always written last
    persist_lock: tokio::sync::Mutex<()>,
}

impl ProgressRepository {
    pub fn new(store: Arc<dyn ProgressStore>, bus: Arc<EventBus>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            store,
            bus,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, TransferProgress>> {
        // A poisoned map still holds consistent snapshots; each mutation is
        // applied to a clone and swapped in whole.
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a new task in `starting`
    pub async fn create(&self, task_id: TaskId) -> Result<TransferProgress> {
        let mut progress = TransferProgress::new(task_id.clone());
        progress.push_message("Transfer queued");

        {
            let mut tasks = self.tasks();
            if tasks.contains_key(&task_id) {
                return Err(SyncError::Other(format!("task {task_id} already exists")));
            }
            tasks.insert(task_id.clone(), progress.clone());
        }

        self.bus.publish(ProgressEvent::from_snapshot(&progress));
        self.persist(&task_id).await;
        Ok(progress)
    }

    /// Current snapshot, from memory or the durable store
    ///
    /// # Errors
    ///
    /// Returns `SyncError::TaskNotFound` if neither knows the task.
    pub async fn get(&self, task_id: &TaskId) -> Result<TransferProgress> {
        if let Some(progress) = self.tasks().get(task_id).cloned() {
            return Ok(progress);
        }

        match self.store.load(task_id).await {
            Ok(Some(progress)) => Ok(progress),
            Ok(None) => Err(SyncError::TaskNotFound(task_id.to_string())),
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "Progress store lookup failed");
                Err(SyncError::TaskNotFound(task_id.to_string()))
            }
        }
    }

    /// Whether the task is live in this process
    pub fn is_live(&self, task_id: &TaskId) -> bool {
        self.tasks().contains_key(task_id)
    }

    /// Snapshots newest first, live tasks taking precedence over stored ones
    pub async fn list(&self, limit: usize) -> Result<Vec<TransferProgress>> {
        let mut by_id: HashMap<TaskId, TransferProgress> = match self.store.list(limit).await {
            Ok(stored) => stored.into_iter().map(|p| (p.task_id.clone(), p)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Progress store listing failed");
                HashMap::new()
            }
        };

        for (id, progress) in self.tasks().iter() {
            by_id.insert(id.clone(), progress.clone());
        }

        let mut all: Vec<TransferProgress> = by_id.into_values().collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all.truncate(limit);
        Ok(all)
    }

    /// Applies `mutate` to a live task without touching the durable store
    ///
    /// Used for high-frequency updates (import polling); the next persisted
    /// mutation carries the result to the store.
    pub fn update_live<F>(&self, task_id: &TaskId, mutate: F) -> Result<TransferProgress>
    where
        F: FnOnce(&mut TransferProgress) -> Result<()>,
    {
        let snapshot = {
            let mut tasks = self.tasks();
            let current = tasks
                .get(task_id)
                .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;

            let before_status = current.status;
            let before_progress = current.progress;

            let mut next = current.clone();
            mutate(&mut next)?;

            before_status.check_transition_or_same(next.status)?;
            // Percent never moves backwards
            next.progress = next.progress.clamp(before_progress, 100);
            if next.status.is_terminal() && next.completed_at.is_none() {
                next.completed_at = Some(Utc::now());
            }

            tasks.insert(task_id.clone(), next.clone());
            next
        };

        self.bus.publish(ProgressEvent::from_snapshot(&snapshot));
        Ok(snapshot)
    }

    /// Applies `mutate` to a live task, then persists and publishes it
    ///
    /// # Errors
    ///
    /// Returns `SyncError::TaskNotFound` for unknown tasks,
    /// `SyncError::InvalidTransition` if the mutation changes the status
    /// along an edge the state machine forbids, or any error `mutate` returns.
    /// On error the stored snapshot is left untouched.
    pub async fn update<F>(&self, task_id: &TaskId, mutate: F) -> Result<TransferProgress>
    where
        F: FnOnce(&mut TransferProgress) -> Result<()>,
    {
        let snapshot = self.update_live(task_id, mutate)?;
        self.persist(task_id).await;
        Ok(snapshot)
    }

    /// Moves a task to `status`, optionally raising the percent and logging a line
    pub async fn transition(
        &self,
        task_id: &TaskId,
        status: TransferStatus,
        percent: Option<u8>,
        message: Option<String>,
    ) -> Result<TransferProgress> {
        self.update(task_id, |p| {
            p.status.check_transition(status)?;
            p.status = status;
            if let Some(percent) = percent {
                p.progress = percent;
            }
            if let Some(message) = message {
                p.push_message(message);
            }
            Ok(())
        })
        .await
    }

    /// Appends a log line
    pub async fn log(&self, task_id: &TaskId, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.update(task_id, |p| {
            p.push_message(message);
            Ok(())
        })
        .await
        .map(|_| ())
    }

    /// Loads a stored snapshot back into memory so it can be mutated again
    ///
    /// # Errors
    ///
    /// Returns `SyncError::TaskNotFound` if the store has no snapshot.
    pub async fn restore(&self, task_id: &TaskId) -> Result<()> {
        if self.is_live(task_id) {
            return Ok(());
        }
        let progress = self.get(task_id).await?;
        self.tasks().entry(task_id.clone()).or_insert(progress);
        Ok(())
    }

    /// Removes a finished task from memory; the durable snapshot stays
    pub fn evict(&self, task_id: &TaskId) -> Option<TransferProgress> {
        self.tasks().remove(task_id)
    }

    /// Evicts a terminal task once its final snapshot is in the store
    ///
    /// Returns `false` and keeps the task live when it is not terminal or
    /// the store rejects the write.
    pub async fn retire(&self, task_id: &TaskId) -> bool {
        let terminal = self
            .tasks()
            .get(task_id)
            .is_some_and(|p| p.status.is_terminal());
        if !terminal || !self.persist(task_id).await {
            return false;
        }
        self.evict(task_id);
        tracing::debug!(task_id = %task_id, "Finished task evicted from memory");
        true
    }

    async fn persist(&self, task_id: &TaskId) -> bool {
        let _guard = self.persist_lock.lock().await;

        let Some(snapshot) = self.tasks().get(task_id).cloned() else {
            return false;
        };

        match self.store.save(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    task_id = %task_id,
                    backend = self.store.backend_name(),
                    error = %e,
                    "Failed to persist progress snapshot"
                );
                false
            }
        }
    }
}

trait TransitionExt {
    fn check_transition_or_same(&self, next: TransferStatus) -> Result<()>;
}

impl TransitionExt for TransferStatus {
    fn check_transition_or_same(&self, next: TransferStatus) -> Result<()> {
        if *self == next {
            Ok(())
        } else {
            self.check_transition(next)
        }
    }
}

/// Progress handle bound to one task, used by the orchestrator and importer
#[derive(Clone)]
pub struct TaskReporter {
    repository: Arc<ProgressRepository>,
    task_id: TaskId,
}

impl TaskReporter {
    pub fn new(repository: Arc<ProgressRepository>, task_id: TaskId) -> Self {
        Self {
            repository,
            task_id,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub async fn snapshot(&self) -> Result<TransferProgress> {
        self.repository.get(&self.task_id).await
    }

    /// Appends a log line; repository failures are only traced
    pub async fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(task_id = %self.task_id, "{message}");
        if let Err(e) = self.repository.log(&self.task_id, message).await {
            tracing::warn!(task_id = %self.task_id, error = %e, "Failed to record log line");
        }
    }

    /// Raises the percent and appends a log line
    pub async fn advance(&self, percent: u8, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(task_id = %self.task_id, progress = percent, "{message}");
        let result = self
            .repository
            .update(&self.task_id, |p| {
                p.progress = percent;
                p.push_message(message);
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(task_id = %self.task_id, error = %e, "Failed to record progress");
        }
    }

    /// Raises the percent in memory only
    pub fn tick(&self, percent: u8) {
        let result = self.repository.update_live(&self.task_id, |p| {
            p.progress = percent;
            Ok(())
        });
        if let Err(e) = result {
            tracing::debug!(task_id = %self.task_id, error = %e, "Failed to record progress tick");
        }
    }

    pub async fn transition(
        &self,
        status: TransferStatus,
        percent: Option<u8>,
        message: Option<String>,
    ) -> Result<TransferProgress> {
        if let Some(message) = &message {
            tracing::info!(task_id = %self.task_id, status = %status, "{message}");
        }
        self.repository
            .transition(&self.task_id, status, percent, message)
            .await
    }

    pub async fn update<F>(&self, mutate: F) -> Result<TransferProgress>
    where
        F: FnOnce(&mut TransferProgress) -> Result<()>,
    {
        self.repository.update(&self.task_id, mutate).await
    }
}
