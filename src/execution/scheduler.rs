//! Matrix scheduler - expands a workflow into jobs and runs them

use crate::{
    core::{
        config::{BuiltinAction, WorkflowConfig},
        matrix::{Matrix, OperatingSystem},
        trigger::TriggerEvent,
        ExecutionStatus, Job, JobContext,
    },
    execution::{
        engine::{ExecutionEngine, ExecutionEvent},
        workspace::{self, Workspace},
    },
    runner::CommandRunner,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

/// Strategy for scheduling jobs of the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One job at a time, in matrix order
    Sequential,

    /// All jobs at once
    #[default]
    Parallel,

    /// At most N jobs at once
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Combine with the workflow's `max_parallel` setting
    pub fn with_limit(self, max_parallel: Option<usize>) -> Self {
        match (self, max_parallel) {
            (SchedulingStrategy::Parallel, Some(n)) => SchedulingStrategy::LimitedParallel(n),
            (SchedulingStrategy::LimitedParallel(m), Some(n)) => {
                SchedulingStrategy::LimitedParallel(m.min(n))
            }
            (strategy, _) => strategy,
        }
    }
}

/// Options of a single workflow run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub strategy: SchedulingStrategy,

    /// Restrict the matrix to these labels or OS families
    pub os_filter: Vec<String>,

    /// Only run jobs whose OS matches the host; the others are cancelled
    pub host_only: bool,

    /// Keep workspaces after the run
    pub keep_workspace: bool,

    /// Parent directory of the workspaces
    pub workspace_root: PathBuf,

    /// Repository to check out (path or URL); the invoking directory by default
    pub repository: Option<String>,

    /// Variables overriding the workflow's own
    pub variables: HashMap<String, String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            strategy: SchedulingStrategy::default(),
            os_filter: Vec::new(),
            host_only: false,
            keep_workspace: false,
            workspace_root: workspace::default_root(),
            repository: default_repository(),
            variables: HashMap::new(),
        }
    }
}

/// The invoking directory as an absolute path
pub fn default_repository() -> Option<String> {
    std::env::current_dir()
        .ok()
        .map(|dir| dir.display().to_string())
}

/// Outcome of running a workflow for one event
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub event: TriggerEvent,

    /// Whether the event activated the workflow at all
    pub triggered: bool,

    /// One job per matrix entry, in matrix order
    pub jobs: Vec<Job>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// A run passes when it was not triggered or every job passed
    pub fn is_success(&self) -> bool {
        !self.triggered || self.status.is_success()
    }

    pub fn job(&self, label: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.instance.label == label)
    }
}

/// Runs every matrix instance of a workflow
pub struct MatrixScheduler<R> {
    engine: ExecutionEngine<R>,
    options: RunOptions,
}

impl<R: CommandRunner + 'static> MatrixScheduler<R> {
    pub fn new(runner: R, options: RunOptions) -> Self {
        Self {
            engine: ExecutionEngine::new(runner),
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.engine.add_event_handler(handler).await;
    }

    /// Build the jobs of a run without executing them
    pub fn plan(&self, config: &WorkflowConfig) -> Result<Vec<Job>> {
        let matrix = self.matrix(config)?;
        Ok(matrix.expand().iter().map(|i| config.to_job(i)).collect())
    }

    /// Context every step of `job` starts from
    pub fn base_context(&self, job: &Job, event: &TriggerEvent) -> JobContext {
        let mut context = job.base_context();

        context.set_variable("event.name", event.kind.name());
        if let Some(branch) = event.branch() {
            context.set_variable("event.ref", branch);
        }
        if let Some(sha) = &event.sha {
            context.set_variable("event.sha", sha.clone());
        }
        if let Some(repository) = &self.options.repository {
            context.set_variable("repository", repository.clone());
        }
        for (key, value) in &self.options.variables {
            context.set_variable(key.clone(), value.clone());
        }

        context
    }

    /// Whether a checkout step would render without a source
    fn missing_checkout_source(&self, config: &WorkflowConfig) -> bool {
        let has_source = self.options.repository.is_some()
            || self.options.variables.contains_key("repository")
            || config.get_variables().contains_key("repository");
        !has_source
            && config.steps.iter().any(|step| {
                step.uses == Some(BuiltinAction::Checkout) && !step.with.contains_key("repository")
            })
    }

    fn matrix(&self, config: &WorkflowConfig) -> Result<Matrix> {
        let matrix = config.matrix()?;
        if self.options.os_filter.is_empty() {
            Ok(matrix)
        } else {
            matrix.restrict(&self.options.os_filter)
        }
    }

    /// Run the workflow for `event`
    pub async fn run(&self, config: &WorkflowConfig, event: &TriggerEvent) -> Result<WorkflowRun> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let triggers = config.trigger_set()?;

        if !triggers.matches(event) {
            info!("Event {} does not trigger workflow {}", event.kind, config.name);
            self.engine
                .emit_event(ExecutionEvent::RunSkipped {
                    workflow_name: config.name.clone(),
                    event: event.kind.name().to_string(),
                })
                .await;
            return Ok(WorkflowRun {
                run_id,
                workflow_name: config.name.clone(),
                event: event.clone(),
                triggered: false,
                jobs: Vec::new(),
                status: ExecutionStatus::Pending,
                started_at,
                completed_at: Some(Utc::now()),
            });
        }

        if self.missing_checkout_source(config) {
            anyhow::bail!(
                "Workflow '{}' checks out a repository but none was given",
                config.name
            );
        }

        let jobs = self.plan(config)?;
        let strategy = self.options.strategy.with_limit(config.strategy.max_parallel);
        info!(
            "Starting run {} of {} with {} jobs ({:?})",
            run_id,
            config.name,
            jobs.len(),
            strategy
        );
        self.engine
            .emit_event(ExecutionEvent::RunStarted {
                run_id,
                workflow_name: config.name.clone(),
                event: event.kind.name().to_string(),
                jobs: jobs.len(),
            })
            .await;

        let root = &self.options.workspace_root;
        let mut prepared = Vec::with_capacity(jobs.len());
        for job in jobs {
            let ws = Workspace::create(root, run_id, &job.instance.label, self.options.keep_workspace)
                .await
                .with_context(|| format!("Failed to create workspace for {}", job.instance.label))?;
            let mut context = self.base_context(&job, event);
            context.workspace = Some(ws.path().to_path_buf());
            prepared.push((job, context, ws));
        }

        let job_runner = JobRunner {
            engine: self.engine.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
            fail_fast: config.strategy.fail_fast,
            host_only: self.options.host_only,
            host: OperatingSystem::host(),
        };

        let jobs = match strategy {
            SchedulingStrategy::Sequential => {
                let mut finished = Vec::with_capacity(prepared.len());
                for (job, context, ws) in prepared {
                    finished.push(job_runner.run(job, context, ws, None).await);
                }
                finished
            }
            SchedulingStrategy::Parallel | SchedulingStrategy::LimitedParallel(_) => {
                let semaphore = match strategy {
                    SchedulingStrategy::LimitedParallel(n) => Some(Arc::new(Semaphore::new(n.max(1)))),
                    _ => None,
                };
                let handles: Vec<_> = prepared
                    .into_iter()
                    .map(|(job, context, ws)| {
                        let job_runner = job_runner.clone();
                        let semaphore = semaphore.clone();
                        tokio::spawn(async move { job_runner.run(job, context, ws, semaphore).await })
                    })
                    .collect();

                let mut finished = Vec::with_capacity(handles.len());
                for joined in join_all(handles).await {
                    finished.push(joined.context("Job task panicked")?);
                }
                finished
            }
        };

        workspace::remove_run_dir(root, run_id).await;

        let status = if jobs.iter().any(|j| j.state.status == ExecutionStatus::Failed) {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };

        info!("Run {} finished: {:?}", run_id, status);
        self.engine
            .emit_event(ExecutionEvent::RunCompleted { run_id, status })
            .await;

        Ok(WorkflowRun {
            run_id,
            workflow_name: config.name.clone(),
            event: event.clone(),
            triggered: true,
            jobs,
            status,
            started_at,
            completed_at: Some(Utc::now()),
        })
    }
}

/// Runs one job on behalf of a scheduler run
struct JobRunner<R> {
    engine: ExecutionEngine<R>,

    /// Set by the first failed job when fail-fast is on
    cancel: Arc<AtomicBool>,
    fail_fast: bool,
    host_only: bool,
    host: Option<OperatingSystem>,
}

impl<R> Clone for JobRunner<R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            cancel: self.cancel.clone(),
            fail_fast: self.fail_fast,
            host_only: self.host_only,
            host: self.host,
        }
    }
}

impl<R: CommandRunner + 'static> JobRunner<R> {
    async fn run(
        &self,
        mut job: Job,
        context: JobContext,
        ws: Workspace,
        semaphore: Option<Arc<Semaphore>>,
    ) -> Job {
        let _permit = match semaphore {
            Some(s) => s.acquire_owned().await.ok(),
            None => None,
        };

        if self.host_only && self.host != Some(job.instance.os) {
            warn!("Skipping {}: {} jobs cannot run on this host", job.instance.label, job.instance.os);
            let label = job.instance.label.clone();
            let reason = format!("{} is not the host operating system", job.instance.os);
            job.state.start(job.steps.len());
            let count = job.skip_remaining(&reason);
            job.state.cancel();
            job.update_counts();
            self.engine
                .emit_event(ExecutionEvent::StepsSkipped { job: label.clone(), count, reason })
                .await;
            self.engine
                .emit_event(ExecutionEvent::JobCompleted {
                    job: label,
                    execution_id: job.state.execution_id,
                    status: job.state.status,
                })
                .await;
        } else {
            self.engine.execute(&mut job, &context, &self.cancel).await;
            if self.fail_fast && job.has_failed() {
                warn!("Job {} failed, cancelling remaining jobs", job.instance.label);
                self.cancel.store(true, Ordering::SeqCst);
            }
        }

        workspace::cleanup_quietly(&ws).await;
        job
    }
}
