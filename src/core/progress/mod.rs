//! Progress tracking: the repository that owns live task state and the
//! event bus that republishes it.

pub mod events;
pub mod repository;

pub use events::{EventBus, ProgressEvent, TaskSubscription};
pub use repository::{ProgressRepository, TaskReporter};
