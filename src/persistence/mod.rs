//! Persistence layer for workflow run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::Job;
use crate::execution::WorkflowRun;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one job of a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique id of the job execution
    pub execution_id: Uuid,

    /// Run the job belonged to
    pub run_id: Uuid,

    pub workflow_name: String,

    /// Matrix label (`ubuntu-latest`)
    pub matrix_os: String,

    /// Event that triggered the run
    pub event: String,

    pub status: ExecutionStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    pub completed_steps: usize,

    pub skipped_steps: usize,

    pub total_steps: usize,

    /// Step that failed the job, if any
    pub failed_step: Option<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a job execution
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load an execution by ID
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// All jobs of one run, in matrix order
    async fn list_run(&self, run_id: Uuid) -> Result<Vec<ExecutionSummary>>;

    /// All executions of a workflow, newest first
    async fn list_executions(&self, workflow_name: &str) -> Result<Vec<ExecutionSummary>>;

    /// Names of all workflows with history
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or `--no-history`)
pub struct InMemoryPersistence {
    executions: RwLock<HashMap<Uuid, ExecutionSummary>>,
    order: RwLock<Vec<Uuid>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    async fn collect<F>(&self, filter: F) -> Vec<ExecutionSummary>
    where
        F: Fn(&ExecutionSummary) -> bool,
    {
        let execs = self.executions.read().await;
        let order = self.order.read().await;
        order
            .iter()
            .filter_map(|id| execs.get(id))
            .filter(|e| filter(e))
            .cloned()
            .collect()
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        if execs.insert(execution.execution_id, execution.clone()).is_none() {
            self.order.write().await.push(execution.execution_id);
        }
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_run(&self, run_id: Uuid) -> Result<Vec<ExecutionSummary>> {
        Ok(self.collect(|e| e.run_id == run_id).await)
    }

    async fn list_executions(&self, workflow_name: &str) -> Result<Vec<ExecutionSummary>> {
        let mut result = self.collect(|e| e.workflow_name == workflow_name).await;
        result.reverse();
        Ok(result)
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let execs = self.executions.read().await;
        let mut names: Vec<String> = execs.values().map(|e| e.workflow_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Create a summary from a finished job
pub fn create_summary(run: &WorkflowRun, job: &Job) -> ExecutionSummary {
    ExecutionSummary {
        execution_id: job.state.execution_id,
        run_id: run.run_id,
        workflow_name: job.workflow_name.clone(),
        matrix_os: job.instance.label.clone(),
        event: run.event.kind.name().to_string(),
        status: job.state.status,
        started_at: job.state.started_at.unwrap_or(run.started_at),
        completed_at: job.state.completed_at,
        progress: job.state.progress(),
        completed_steps: job.state.completed_steps,
        skipped_steps: job.state.skipped_steps,
        total_steps: job.state.total_steps,
        failed_step: job.failed_step().map(|s| s.id.clone()),
    }
}

/// Summaries of every job of a run
pub fn create_summaries(run: &WorkflowRun) -> Vec<ExecutionSummary> {
    run.jobs.iter().map(|job| create_summary(run, job)).collect()
}

/// Save every job of a run
pub async fn save_run(store: &dyn PersistenceBackend, run: &WorkflowRun) -> Result<usize> {
    let summaries = create_summaries(run);
    for summary in &summaries {
        store.save_execution(summary).await?;
    }
    Ok(summaries.len())
}
