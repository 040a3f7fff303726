//! Progress store backends
//!
//! - [`MemoryProgressStore`] - process memory
//! - [`FileProgressStore`] - one JSON document per task
//! - [`PostgresProgressStore`] - `task_progress` table

pub mod factory;
pub mod file;
pub mod memory;
pub mod postgresql;
pub mod traits;

pub use factory::create_progress_store;
pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;
pub use postgresql::PostgresProgressStore;
pub use traits::ProgressStore;
