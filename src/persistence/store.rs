//! SQLite-based persistence store

use crate::core::ExecutionStatus;
use crate::persistence::{ExecutionSummary, PersistenceBackend};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, run_id, workflow_name, matrix_os, event, status, \
     started_at, completed_at, progress, completed_steps, skipped_steps, total_steps, failed_step \
     FROM executions";

/// SQLite execution store
pub struct SqliteExecutionStore {
    pool: SqlitePool,
}

impl SqliteExecutionStore {
    /// Open (or create) the database at `db_path`; `:memory:` is accepted
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);

        // One connection keeps `:memory:` databases on a single handle.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Default database location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sdt-ci")
            .join("history.db")
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        Self::at(&Self::default_path()).await
    }

    /// Create store at `path`, creating parent directories
    pub async fn at(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let db_path = path
            .to_str()
            .with_context(|| format!("Database path is not valid UTF-8: {}", path.display()))?;
        Self::new(db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                workflow_name TEXT NOT NULL,
                matrix_os TEXT NOT NULL,
                event TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                progress REAL NOT NULL DEFAULT 0.0,
                completed_steps INTEGER NOT NULL DEFAULT 0,
                skipped_steps INTEGER NOT NULL DEFAULT 0,
                total_steps INTEGER NOT NULL DEFAULT 0,
                failed_step TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_workflow_name ON executions(workflow_name)",
            "CREATE INDEX IF NOT EXISTS idx_run_id ON executions(run_id)",
            "CREATE INDEX IF NOT EXISTS idx_started_at ON executions(started_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to initialize history schema")?;
        }

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn from_row(row: &SqliteRow) -> Result<ExecutionSummary> {
        Ok(ExecutionSummary {
            execution_id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
            run_id: Uuid::parse_str(&row.try_get::<String, _>("run_id")?)?,
            workflow_name: row.try_get("workflow_name")?,
            matrix_os: row.try_get("matrix_os")?,
            event: row.try_get("event")?,
            status: ExecutionStatus::from_label(&row.try_get::<String, _>("status")?),
            started_at: Self::from_naive(row.try_get("started_at")?),
            completed_at: row
                .try_get::<Option<NaiveDateTime>, _>("completed_at")?
                .map(Self::from_naive),
            progress: row.try_get("progress")?,
            completed_steps: row.try_get::<i64, _>("completed_steps")? as usize,
            skipped_steps: row.try_get::<i64, _>("skipped_steps")? as usize,
            total_steps: row.try_get::<i64, _>("total_steps")? as usize,
            failed_step: row.try_get("failed_step")?,
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteExecutionStore {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO executions
            (id, run_id, workflow_name, matrix_os, event, status, started_at, completed_at,
             progress, completed_steps, skipped_steps, total_steps, failed_step)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(execution.execution_id.to_string())
        .bind(execution.run_id.to_string())
        .bind(&execution.workflow_name)
        .bind(&execution.matrix_os)
        .bind(&execution.event)
        .bind(format!("{:?}", execution.status))
        .bind(Self::to_naive(execution.started_at))
        .bind(execution.completed_at.map(Self::to_naive))
        .bind(execution.progress)
        .bind(execution.completed_steps as i64)
        .bind(execution.skipped_steps as i64)
        .bind(execution.total_steps as i64)
        .bind(&execution.failed_step)
        .execute(&self.pool)
        .await
        .context("Failed to save execution")?;

        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load execution")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_run(&self, run_id: Uuid) -> Result<Vec<ExecutionSummary>> {
        let rows = sqlx::query(&format!(
            "{} WHERE run_id = ?1 ORDER BY started_at ASC, matrix_os ASC",
            SELECT_COLUMNS
        ))
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list run")?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn list_executions(&self, workflow_name: &str) -> Result<Vec<ExecutionSummary>> {
        let rows = sqlx::query(&format!(
            "{} WHERE workflow_name = ?1 ORDER BY started_at DESC",
            SELECT_COLUMNS
        ))
        .bind(workflow_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list executions")?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT workflow_name
            FROM executions
            ORDER BY workflow_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list workflows")?;

        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("workflow_name")?))
            .collect()
    }
}
