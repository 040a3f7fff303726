//! Transfer service
//!
//! Entry point for callers: submits transfers as background tasks, answers
//! progress queries, and applies user decisions at the awaiting-decision
//! checkpoint.

use super::orchestrator::TransferOrchestrator;
use crate::adapters::dhis2::{PlatformConnector, ProfileConnector};
use crate::adapters::store::create_progress_store;
use crate::config::SyncConfig;
use crate::core::import::{BulkImporter, ImportSettings};
use crate::core::progress::{EventBus, ProgressRepository, TaskReporter, TaskSubscription};
use crate::domain::{
    Result, SyncError, TaskId, TransferProgress, TransferRequest, TransferStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A running background task
pub struct TransferHandle {
    pub task_id: TaskId,
    pub join: JoinHandle<Result<TransferStatus>>,
}

type RequestMap = Arc<Mutex<HashMap<TaskId, Arc<TransferRequest>>>>;

pub struct TransferService {
    orchestrator: Arc<TransferOrchestrator>,
    repository: Arc<ProgressRepository>,

    /// Requests of tasks that may still be retried
    requests: RequestMap,
}

impl TransferService {
    pub fn new(
        connector: Arc<dyn PlatformConnector>,
        repository: Arc<ProgressRepository>,
        settings: ImportSettings,
        discovery_timeout: Duration,
    ) -> Self {
        let orchestrator = TransferOrchestrator::new(
            connector,
            Arc::new(BulkImporter::new(settings)),
            discovery_timeout,
        );
        Self {
            orchestrator: Arc::new(orchestrator),
            repository,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Builds the service from configuration: profile connector, the
    /// configured progress store and a fresh event bus
    pub async fn from_config(config: &SyncConfig) -> Result<Self> {
        let store = create_progress_store(&config.store).await?;
        let repository = Arc::new(ProgressRepository::new(store, Arc::new(EventBus::default())));
        let connector = Arc::new(ProfileConnector::new(
            config.profiles.clone(),
            config.http.clone(),
        ));

        Ok(Self::new(
            connector,
            repository,
            ImportSettings::from(&config.import),
            Duration::from_secs(config.http.discovery_timeout_seconds),
        ))
    }

    pub fn repository(&self) -> &Arc<ProgressRepository> {
        &self.repository
    }

    /// Validates `request`, registers a task and runs it in the background
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` without creating a task when the
    /// request is invalid.
    pub async fn start_transfer(&self, request: TransferRequest) -> Result<TransferHandle> {
        request.validate()?;

        let task_id = TaskId::generate();
        self.repository.create(task_id.clone()).await?;

        let request = Arc::new(request);
        self.remember(&task_id, request.clone());

        tracing::info!(
            task_id = %task_id,
            profile = %request.profile_id,
            periods = request.normalized_periods().len(),
            selection = %request.org_unit_selection,
            "Transfer submitted"
        );

        let join = self.spawn(task_id.clone(), move |orchestrator, reporter| async move {
            orchestrator.run(&request, &reporter).await
        });

        Ok(TransferHandle { task_id, join })
    }

    /// Current snapshot, live or stored
    pub async fn get_progress(&self, task_id: &TaskId) -> Result<TransferProgress> {
        self.repository.get(task_id).await
    }

    /// Known transfers, newest first
    pub async fn list_transfers(&self, limit: usize) -> Result<Vec<TransferProgress>> {
        self.repository.list(limit).await
    }

    /// Progress events of one task
    pub fn subscribe(&self, task_id: &TaskId) -> TaskSubscription {
        self.repository.bus().subscribe_task(task_id.clone())
    }

    /// Completes an awaiting transfer, discarding its unmapped values
    ///
    /// # Errors
    ///
    /// Returns `SyncError::StateMismatch` unless the task is awaiting a decision.
    pub async fn skip_unmapped_and_complete(&self, task_id: &TaskId) -> Result<TransferProgress> {
        self.repository.restore(task_id).await?;

        let outcome = self
            .repository
            .update(task_id, |p| {
                require_awaiting(p)?;
                let dropped = p.unmapped_count();
                p.unmapped_values.clear();
                p.status = TransferStatus::Completed;
                p.progress = 100;
                p.push_message("User chose to skip unmapped values");
                p.push_message("Transfer complete!");
                tracing::info!(task_id = %p.task_id, dropped = dropped, "Unmapped values skipped");
                Ok(())
            })
            .await;
        // A restored task that was already finished goes back out of memory
        self.repository.retire(task_id).await;
        let progress = outcome?;

        self.forget(task_id);
        Ok(progress)
    }

    /// Cancels an awaiting transfer
    ///
    /// # Errors
    ///
    /// Returns `SyncError::StateMismatch` unless the task is awaiting a decision.
    pub async fn cancel_transfer(&self, task_id: &TaskId) -> Result<TransferProgress> {
        self.repository.restore(task_id).await?;

        let outcome = self
            .repository
            .update(task_id, |p| {
                require_awaiting(p)?;
                p.status = TransferStatus::Cancelled;
                p.error = Some("Transfer cancelled by user".to_string());
                p.push_message("Transfer cancelled by user");
                Ok(())
            })
            .await;
        self.repository.retire(task_id).await;
        let progress = outcome?;

        tracing::info!(task_id = %task_id, "Transfer cancelled");
        self.forget(task_id);
        Ok(progress)
    }

    /// Re-resolves the unmapped values of an awaiting transfer with a new
    /// element mapping and imports what now resolves
    ///
    /// # Errors
    ///
    /// - `SyncError::Validation` for an empty mapping or an empty bucket
    /// - `SyncError::TaskNotFound` if the original request is no longer
    ///   held by this process
    /// - `SyncError::StateMismatch` unless the task is awaiting a decision
    pub async fn retry_with_new_mappings(
        &self,
        task_id: &TaskId,
        mapping: BTreeMap<String, String>,
    ) -> Result<TransferHandle> {
        if mapping.is_empty() {
            return Err(SyncError::Validation(
                "at least one element mapping is required".to_string(),
            ));
        }
        if let Some((source, _)) = mapping
            .iter()
            .find(|(source, target)| source.trim().is_empty() || target.trim().is_empty())
        {
            return Err(SyncError::Validation(format!(
                "element mapping entry '{source}' has an empty id"
            )));
        }

        let request = self
            .recall(task_id)
            .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;

        let mapped = mapping.len();
        self.repository
            .update(task_id, |p| {
                require_awaiting(p)?;
                if p.unmapped_values.is_empty() {
                    return Err(SyncError::Validation(format!(
                        "task {} has no unmapped values to retry",
                        p.task_id
                    )));
                }
                p.status = TransferStatus::Running;
                p.push_message(format!(
                    "Retrying {} unmapped values with {mapped} new mappings",
                    p.unmapped_count()
                ));
                Ok(())
            })
            .await?;

        let join = self.spawn(task_id.clone(), move |orchestrator, reporter| async move {
            orchestrator
                .rerun_unmapped(&request, &mapping, &reporter)
                .await
        });

        Ok(TransferHandle {
            task_id: task_id.clone(),
            join,
        })
    }

    /// Runs `work` on a tokio task; once the task reaches a terminal status
    /// its stored request is dropped and it leaves memory
    fn spawn<F, Fut>(&self, task_id: TaskId, work: F) -> JoinHandle<Result<TransferStatus>>
    where
        F: FnOnce(Arc<TransferOrchestrator>, TaskReporter) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<TransferStatus>> + Send + 'static,
    {
        let orchestrator = self.orchestrator.clone();
        let reporter = TaskReporter::new(self.repository.clone(), task_id.clone());
        let requests = self.requests.clone();
        let repository = self.repository.clone();

        tokio::spawn(async move {
            let outcome = work(orchestrator, reporter).await;
            let keep = matches!(outcome, Ok(TransferStatus::AwaitingUserDecision));
            if !keep {
                lock(&requests).remove(&task_id);
                repository.retire(&task_id).await;
            }
            outcome
        })
    }

    fn remember(&self, task_id: &TaskId, request: Arc<TransferRequest>) {
        lock(&self.requests).insert(task_id.clone(), request);
    }

    fn recall(&self, task_id: &TaskId) -> Option<Arc<TransferRequest>> {
        lock(&self.requests).get(task_id).cloned()
    }

    fn forget(&self, task_id: &TaskId) {
        lock(&self.requests).remove(task_id);
    }
}

fn lock(
    requests: &RequestMap,
) -> std::sync::MutexGuard<'_, HashMap<TaskId, Arc<TransferRequest>>> {
    requests.lock().unwrap_or_else(|e| e.into_inner())
}

fn require_awaiting(progress: &TransferProgress) -> Result<()> {
    if progress.status == TransferStatus::AwaitingUserDecision {
        Ok(())
    } else {
        Err(SyncError::not_awaiting(
            progress.task_id.as_str(),
            progress.status.as_str(),
        ))
    }
}
