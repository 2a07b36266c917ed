//! Job domain model - one matrix instance of a workflow

use crate::core::{
    config::{EnvironmentConfig, WorkflowConfig},
    context::JobContext,
    matrix::MatrixInstance,
    state::{ExecutionStatus, JobState, StepState},
    step::{Step, StepDefaults},
};
use std::collections::HashMap;

/// A workflow instantiated for one operating system
#[derive(Debug, Clone)]
pub struct Job {
    /// Name of the workflow this job belongs to
    pub workflow_name: String,

    /// Matrix entry the job runs for
    pub instance: MatrixInstance,

    /// Runtime environment to provision
    pub environment: EnvironmentConfig,

    /// Global variables available to all steps
    pub variables: HashMap<String, String>,

    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Execution state
    pub state: JobState,
}

impl Job {
    /// Create a job from configuration
    pub fn from_config(config: &WorkflowConfig, instance: &MatrixInstance) -> Self {
        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or_else(|| StepDefaults::default().timeout_secs),
        };

        let steps = config
            .steps
            .iter()
            .map(|step_config| Step::from_config(step_config, &defaults))
            .collect();

        Job {
            workflow_name: config.name.clone(),
            instance: instance.clone(),
            environment: config.environment.clone(),
            variables: config.variables_as_string_map(),
            steps,
            state: JobState::new(),
        }
    }

    /// Display name, e.g. `sdt-python (ubuntu-latest)`
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.workflow_name, self.instance.label)
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// First step that has not run yet
    pub fn next_pending(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| matches!(s.state, StepState::Pending))
    }

    /// Every step reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.state.is_terminal())
    }

    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// Mark every step that has not run as skipped
    pub fn skip_remaining(&mut self, reason: &str) -> usize {
        let mut skipped = 0;
        for step in self
            .steps
            .iter_mut()
            .filter(|s| matches!(s.state, StepState::Pending))
        {
            step.state = StepState::Skipped {
                reason: reason.to_string(),
            };
            skipped += 1;
        }
        skipped
    }

    /// Recount step states into the job state
    pub fn update_counts(&mut self) {
        let mut completed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for step in &self.steps {
            match &step.state {
                StepState::Completed { .. } => completed += 1,
                StepState::Failed { .. } => failed += 1,
                StepState::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }

        self.state.update_counts(completed, failed, skipped);
    }

    /// Id of the step that aborted the job
    pub fn failed_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| matches!(s.state, StepState::Failed { .. }))
    }

    /// Variables and environment every step of this job sees
    pub fn base_context(&self) -> JobContext {
        let mut context = JobContext::new();

        context.variables.extend(self.variables.clone());

        let env = &self.environment;
        context.set_variable("env.name", env.name.clone());
        context.set_variable("env.python_version", env.python_version.clone());
        context.set_variable("env.channel", env.channel.clone());
        context.set_variable("env.requirements", env.requirements.clone());
        context.set_variable("env.packages", env.packages.join(" "));
        context.set_variable("matrix.os", self.instance.label.clone());
        context.set_variable("runner.os", self.instance.os.runner_os());

        context.env.insert("CI".to_string(), "true".to_string());
        context
            .env
            .insert("RUNNER_OS".to_string(), self.instance.os.runner_os().to_string());
        context
            .env
            .insert("MATRIX_OS".to_string(), self.instance.label.clone());

        context
    }

    /// Create execution context for a step on top of `base`
    pub fn create_context_for_step(&self, base: &JobContext, step_id: &str) -> JobContext {
        let mut context = base.clone();

        for step in &self.steps {
            if let StepState::Completed { output, .. } = &step.state {
                context.set_step_output(&step.id, output.clone());
            }
        }

        context.current_step_id = Some(step_id.to_string());
        context
    }
}
