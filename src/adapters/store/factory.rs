//! Progress store factory

use super::file::FileProgressStore;
use super::memory::MemoryProgressStore;
use super::postgresql::PostgresProgressStore;
use super::traits::ProgressStore;
use crate::config::{StoreBackend, StoreConfig};
use crate::domain::{Result, SyncError};
use std::sync::Arc;

/// Creates the progress store selected by `[store].backend`
///
/// # Errors
///
/// Returns an error if the backend cannot be initialised (directory not
/// writable, database unreachable, missing `[store.postgresql]`).
pub async fn create_progress_store(config: &StoreConfig) -> Result<Arc<dyn ProgressStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory progress store");
            Ok(Arc::new(MemoryProgressStore::new()))
        }
        StoreBackend::File => {
            tracing::info!(path = %config.path, "Using file progress store");
            let store = FileProgressStore::new(&config.path).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                SyncError::Configuration(
                    "store.postgresql configuration is required when backend = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Using PostgreSQL progress store");
            let store = PostgresProgressStore::new(pg_config).await?;
            Ok(Arc::new(store))
        }
    }
}
