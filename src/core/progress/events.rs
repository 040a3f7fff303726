//! Progress event bus
//!
//! Every progress mutation is republished on a `tokio::sync::broadcast`
//! channel. Delivery is at-most-current: a lagging receiver skips ahead to
//! the newest events and can always poll the repository for the snapshot.

use crate::domain::{TaskId, TransferProgress, TransferStatus};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

/// Default buffer capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1024;

/// One progress update for push-style consumers
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub status: TransferStatus,
    pub progress: u8,

    /// Last log line at the time of the update
    pub message: Option<String>,

    pub snapshot: TransferProgress,
}

impl ProgressEvent {
    pub fn from_snapshot(snapshot: &TransferProgress) -> Self {
        Self {
            task_id: snapshot.task_id.clone(),
            status: snapshot.status,
            progress: snapshot.progress,
            message: snapshot.last_message().map(str::to_string),
            snapshot: snapshot.clone(),
        }
    }
}

/// In-process fan-out of [`ProgressEvent`]s
pub struct EventBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: ProgressEvent) {
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every task's events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of one task
    pub fn subscribe_task(&self, task_id: TaskId) -> TaskSubscription {
        TaskSubscription {
            task_id,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiver filtered to a single task
pub struct TaskSubscription {
    task_id: TaskId,
    receiver: broadcast::Receiver<ProgressEvent>,
}

impl TaskSubscription {
    /// Next event for the task, `None` once the bus is dropped
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.task_id == self.task_id => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(
                        task_id = %self.task_id,
                        skipped = skipped,
                        "Progress subscriber lagged, skipping to newest events"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }
}
