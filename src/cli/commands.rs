//! CLI command definitions

use crate::core::config::WorkflowConfig;
use crate::core::trigger::{EventKind, TriggerEvent};
use crate::execution::{
    scheduler::{default_repository, RunOptions},
    workspace, SchedulingStrategy,
};
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Run a workflow for an event
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file (defaults to the built-in sdt-python workflow)
    #[arg(short, long)]
    pub file: Option<String>,

    #[command(flatten)]
    pub event: EventArgs,

    /// Repository to check out (path or URL)
    #[arg(long)]
    pub repository: Option<String>,

    /// Only run these matrix entries (label or family, repeatable)
    #[arg(long)]
    pub os: Vec<String>,

    /// Scheduling strategy for matrix jobs
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Limit for `parallel-limited`
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Cancel jobs whose OS differs from the host instead of running them
    #[arg(long)]
    pub host_only: bool,

    /// Keep job workspaces after the run
    #[arg(long)]
    pub keep_workspace: bool,

    /// Parent directory for job workspaces
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    pub fn scheduling_strategy(&self) -> SchedulingStrategy {
        match self.strategy {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => {
                SchedulingStrategy::Parallel.with_limit(self.max_parallel)
            }
            SchedulingStrategyArg::ParallelLimited => {
                SchedulingStrategy::LimitedParallel(self.max_parallel.unwrap_or(2))
            }
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            strategy: self.scheduling_strategy(),
            os_filter: self.os.clone(),
            host_only: self.host_only,
            keep_workspace: self.keep_workspace,
            workspace_root: self
                .workspace_root
                .clone()
                .unwrap_or_else(workspace::default_root),
            repository: repository_or_default(self.repository.as_deref()),
            variables: self.variable.iter().cloned().collect(),
        }
    }
}

/// The event a run is evaluated against
#[derive(Debug, Args, Clone)]
pub struct EventArgs {
    /// Triggering event
    #[arg(long = "event", value_enum, default_value_t = EventArg::Push)]
    pub kind: EventArg,

    /// Branch of the event
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    /// Revision to check out
    #[arg(long)]
    pub sha: Option<String>,
}

impl EventArgs {
    pub fn to_event(&self) -> TriggerEvent {
        let mut event = TriggerEvent::new(self.kind.into());
        if let Some(git_ref) = &self.git_ref {
            event = event.with_ref(git_ref.clone());
        }
        if let Some(sha) = &self.sha {
            event = event.with_sha(sha.clone());
        }
        event
    }
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file (defaults to the built-in workflow)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show what a run would do without executing anything
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to workflow YAML file (defaults to the built-in workflow)
    #[arg(short, long)]
    pub file: Option<String>,

    #[command(flatten)]
    pub event: EventArgs,

    /// Only plan these matrix entries
    #[arg(long)]
    pub os: Vec<String>,

    /// Repository to check out (path or URL)
    #[arg(long)]
    pub repository: Option<String>,
}

/// List workflows with history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show execution counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent job executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show the jobs of one run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

/// Event kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    PullRequest,
    WorkflowDispatch,
    Schedule,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => EventKind::Push,
            EventArg::PullRequest => EventKind::PullRequest,
            EventArg::WorkflowDispatch => EventKind::WorkflowDispatch,
            EventArg::Schedule => EventKind::Schedule,
        }
    }
}

/// Load the workflow at `file`, or the built-in one
pub fn load_workflow(file: Option<&str>) -> Result<WorkflowConfig> {
    match file {
        Some(path) => WorkflowConfig::from_file(path)
            .with_context(|| format!("Failed to load workflow {}", path)),
        None => WorkflowConfig::builtin(),
    }
}

/// Resolve a local repository path against the invoking directory.
///
/// URLs and `user@host:path` remotes are kept as given.
pub fn absolute_repository(repository: &str) -> String {
    let path = Path::new(repository);
    if repository.contains("://") || repository.contains('@') || path.is_absolute() {
        return repository.to_string();
    }
    match std::env::current_dir() {
        Ok(dir) => dir.join(path).display().to_string(),
        Err(_) => repository.to_string(),
    }
}

/// `--repository` made absolute, or the invoking directory
pub fn repository_or_default(repository: Option<&str>) -> Option<String> {
    repository.map(absolute_repository).or_else(default_repository)
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
