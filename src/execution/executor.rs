//! Step executor - runs individual steps through a command runner

use crate::{
    core::{lint::LintReport, step::render_template, step::unresolved_placeholders, JobContext, Step},
    runner::{CommandInvocation, CommandOutput, CommandRunner, OutputCallback, RunnerError},
};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Result of executing a step
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Command exited with code 0
    Success {
        output: CommandOutput,
        lint: Option<LintReport>,
    },
    /// Command failed but the step is marked `continue_on_error`
    Tolerated {
        error: String,
        output: Option<CommandOutput>,
        lint: Option<LintReport>,
    },
    /// Command failed and the job must stop
    Failed {
        error: String,
        output: Option<CommandOutput>,
        lint: Option<LintReport>,
    },
}

impl ExecutionResult {
    pub fn lint(&self) -> Option<&LintReport> {
        match self {
            ExecutionResult::Success { lint, .. }
            | ExecutionResult::Tolerated { lint, .. }
            | ExecutionResult::Failed { lint, .. } => lint.as_ref(),
        }
    }

    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            ExecutionResult::Success { output, .. } => Some(output),
            ExecutionResult::Tolerated { output, .. } | ExecutionResult::Failed { output, .. } => {
                output.as_ref()
            }
        }
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Build the invocation for a step in the given context
    pub fn prepare(&self, step: &Step, context: &JobContext) -> CommandInvocation {
        let variables = context.get_rendering_variables();
        let command = step.render_command(&variables);

        let leftovers = unresolved_placeholders(&command);
        if !leftovers.is_empty() {
            warn!(
                "Step {} has unresolved placeholders: {}",
                step.id,
                leftovers.join(", ")
            );
        }

        let mut invocation = CommandInvocation::new(command).for_step(&step.id);
        invocation.env = context.env.clone();
        for (key, value) in &step.env {
            invocation
                .env
                .insert(key.clone(), render_template(value, &variables));
        }
        invocation.working_dir = context.workspace.clone();
        invocation
    }

    /// Execute a step and return the result
    pub async fn execute(
        &self,
        step: &Step,
        context: &JobContext,
        callback: Option<&dyn OutputCallback>,
    ) -> ExecutionResult {
        let invocation = self.prepare(step, context);
        info!("Executing step: {}", step.id);
        debug!("Command for step {}: {}", step.id, invocation.command);

        let timeout_duration = Duration::from_secs(step.timeout_secs);
        let (error, output) = match timeout(
            timeout_duration,
            self.runner.run(&invocation, callback),
        )
        .await
        {
            Ok(Ok(output)) if output.success() => {
                info!("Step {} completed successfully", step.id);
                let lint = lint_report(step, &output);
                return ExecutionResult::Success { output, lint };
            }
            Ok(Ok(output)) => {
                let error = match output.exit_code {
                    Some(code) => format!("Process exited with code {}", code),
                    None => "Process terminated by signal".to_string(),
                };
                (error, Some(output))
            }
            Ok(Err(e)) => {
                error!("Runner error for step {}: {}", step.id, e);
                (e.to_string(), None)
            }
            Err(_) => {
                let e = RunnerError::Timeout(step.timeout_secs);
                error!("Step {} failed: {}", step.id, e);
                (e.to_string(), None)
            }
        };

        let lint = output.as_ref().and_then(|o| lint_report(step, o));

        if step.continue_on_error {
            warn!("Step {} failed but continues on error: {}", step.id, error);
            ExecutionResult::Tolerated { error, output, lint }
        } else {
            warn!("Step {} failed: {}", step.id, error);
            ExecutionResult::Failed { error, output, lint }
        }
    }
}

fn lint_report(step: &Step, output: &CommandOutput) -> Option<LintReport> {
    step.lint_report.then(|| LintReport::parse(&output.stdout))
}
