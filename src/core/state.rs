//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall status of a job or a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Not started yet
    Pending,
    /// Currently running
    Running,
    /// Every fatal step succeeded
    Completed,
    /// A fatal step failed
    Failed,
    /// Stopped by fail-fast before finishing
    Cancelled,
}

impl ExecutionStatus {
    /// Whether the status counts as a pass
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Completed)
    }

    /// Parse the `Debug` rendering used in the history store
    pub fn from_label(label: &str) -> Self {
        match label {
            "Running" => ExecutionStatus::Running,
            "Completed" => ExecutionStatus::Completed,
            "Failed" => ExecutionStatus::Failed,
            "Cancelled" => ExecutionStatus::Cancelled,
            _ => ExecutionStatus::Pending,
        }
    }
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not run yet
    Pending,
    /// Step is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Step finished without aborting the job.
    ///
    /// `tolerated` is set when the command exited non-zero but the step
    /// is marked `continue_on_error`.
    Completed {
        output: String,
        exit_code: i32,
        tolerated: bool,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step failed and aborted the job
    Failed {
        error: String,
        exit_code: Option<i32>,
        output: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step never ran
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    /// Captured output, if the step ran to completion or failure
    pub fn output(&self) -> Option<&str> {
        match self {
            StepState::Completed { output, .. } | StepState::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// State of one job (one matrix instance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Unique id of this job execution
    pub execution_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of steps
    pub total_steps: usize,

    /// Number of steps that completed (including tolerated failures)
    pub completed_steps: usize,

    /// Number of steps that failed
    pub failed_steps: usize,

    /// Number of steps that were skipped
    pub skipped_steps: usize,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
        }
    }

    /// Mark job as started
    pub fn start(&mut self, total_steps: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
    }

    /// Mark job as completed
    pub fn complete(&mut self) {
        self.finish(ExecutionStatus::Completed);
    }

    /// Mark job as failed
    pub fn fail(&mut self) {
        self.finish(ExecutionStatus::Failed);
    }

    /// Mark job as cancelled
    pub fn cancel(&mut self) {
        self.finish(ExecutionStatus::Cancelled);
    }

    fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Update step counts
    pub fn update_counts(&mut self, completed: usize, failed: usize, skipped: usize) {
        self.completed_steps = completed;
        self.failed_steps = failed;
        self.skipped_steps = skipped;
    }

    /// Fraction of steps that reached a terminal state (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        (self.completed_steps + self.failed_steps + self.skipped_steps) as f64
            / self.total_steps as f64
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}
