//! PostgreSQL progress store
//!
//! Snapshots live in the `task_progress` table. The scalar columns make the
//! table queryable from SQL; the full snapshot is kept in `results` so a load
//! restores every field.

use super::traits::ProgressStore;
use crate::config::PostgreSQLConfig;
use crate::domain::{Result, SyncError, TaskId, TransferProgress};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

/// Value of the `task_type` column
pub const TASK_TYPE_TRANSFER: &str = "dhis2_transfer";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS task_progress (
    id          TEXT PRIMARY KEY,
    task_type   TEXT NOT NULL,
    status      TEXT NOT NULL,
    progress    INTEGER NOT NULL DEFAULT 0,
    messages    JSONB NOT NULL DEFAULT '[]'::jsonb,
    results     JSONB,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_task_progress_created_at ON task_progress (created_at DESC);
"#;

const UPSERT: &str = r#"
    INSERT INTO task_progress (
        id, task_type, status, progress, messages, results, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (id) DO UPDATE SET
        status = EXCLUDED.status,
        progress = EXCLUDED.progress,
        messages = EXCLUDED.messages,
        results = EXCLUDED.results,
        updated_at = EXCLUDED.updated_at
"#;

/// Row shape of `task_progress`
#[derive(Debug, Clone)]
pub struct TaskProgressRow {
    pub id: String,
    pub task_type: String,
    pub status: String,
    pub progress: i32,
    pub messages: serde_json::Value,
    pub results: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskProgressRow {
    pub fn from_domain(progress: &TransferProgress) -> Result<Self> {
        Ok(Self {
            id: progress.task_id.to_string(),
            task_type: TASK_TYPE_TRANSFER.to_string(),
            status: progress.status.to_string(),
            progress: i32::from(progress.progress),
            messages: serde_json::to_value(&progress.messages)?,
            results: Some(serde_json::to_value(progress)?),
            created_at: progress.started_at,
            updated_at: Utc::now(),
        })
    }

    /// Restores the snapshot; rows written without `results` fall back to
    /// the scalar columns.
    pub fn to_domain(&self) -> Result<TransferProgress> {
        if let Some(results) = &self.results {
            return Ok(serde_json::from_value(results.clone())?);
        }

        let task_id = TaskId::new(self.id.clone()).map_err(SyncError::Store)?;
        let mut progress = TransferProgress::new(task_id);
        progress.status = self.status.parse().map_err(SyncError::Store)?;
        progress.progress = self.progress.clamp(0, 100) as u8;
        progress.messages = serde_json::from_value(self.messages.clone())?;
        progress.messages_logged = progress.messages.len() as u64;
        progress.started_at = self.created_at;
        Ok(progress)
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            task_type: row.get("task_type"),
            status: row.get("status"),
            progress: row.get("progress"),
            messages: row.get("messages"),
            results: row.get("results"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Progress store over a deadpool connection pool
pub struct PostgresProgressStore {
    pool: Pool,
}

impl PostgresProgressStore {
    /// Builds the pool and ensures the table exists
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Configuration` for an unparsable connection string
    /// and `SyncError::Store` if the pool or schema cannot be set up.
    pub async fn new(config: &PostgreSQLConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .parse()
            .map_err(|e| {
                SyncError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| SyncError::Store(format!("Failed to create connection pool: {e}")))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SyncError::Store(format!("Failed to get connection from pool: {e}")))
    }

    async fn ensure_schema(&self) -> Result<()> {
        let client = self.connection().await?;
        client
            .batch_execute(CREATE_TABLE)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to create task_progress table: {e}")))?;
        tracing::debug!("PostgreSQL progress table ready");
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for PostgresProgressStore {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn save(&self, progress: &TransferProgress) -> Result<()> {
        let row = TaskProgressRow::from_domain(progress)?;
        let client = self.connection().await?;

        client
            .execute(
                UPSERT,
                &[
                    &row.id,
                    &row.task_type,
                    &row.status,
                    &row.progress,
                    &row.messages,
                    &row.results,
                    &row.created_at,
                    &row.updated_at,
                ],
            )
            .await
            .map_err(|e| SyncError::Store(format!("Failed to save progress: {e}")))?;

        Ok(())
    }

    async fn load(&self, task_id: &TaskId) -> Result<Option<TransferProgress>> {
        let client = self.connection().await?;
        let rows = client
            .query("SELECT * FROM task_progress WHERE id = $1", &[&task_id.as_str()])
            .await
            .map_err(|e| SyncError::Store(format!("Failed to load progress: {e}")))?;

        rows.first()
            .map(|row| TaskProgressRow::from_row(row).to_domain())
            .transpose()
    }

    async fn list(&self, limit: usize) -> Result<Vec<TransferProgress>> {
        let client = self.connection().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client
            .query(
                "SELECT * FROM task_progress WHERE task_type = $1 \
                 ORDER BY created_at DESC LIMIT $2",
                &[&TASK_TYPE_TRANSFER, &limit],
            )
            .await
            .map_err(|e| SyncError::Store(format!("Failed to list progress: {e}")))?;

        rows.iter()
            .map(|row| TaskProgressRow::from_row(row).to_domain())
            .collect()
    }
}
