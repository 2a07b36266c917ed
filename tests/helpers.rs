//! Test utility functions for sdt-ci

use async_trait::async_trait;
use sdt_ci::core::config::WorkflowConfig;
use sdt_ci::core::trigger::{EventKind, TriggerEvent};
use sdt_ci::core::{ExecutionStatus, Job, StepState};
use sdt_ci::execution::{ExecutionEvent, MatrixScheduler, RunOptions, SchedulingStrategy, WorkflowRun};
use sdt_ci::runner::{
    CommandInvocation, CommandOutput, CommandRunner, OutputCallback, OutputStream, RunnerError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned response for commands containing `needle`
#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    os: Option<String>,
    exit_code: i32,
    stdout: String,
}

/// A command the mock runner received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub os: String,
    pub step_id: String,
    pub command: String,
}

/// Mock runner that answers from scripted rules; unmatched commands succeed
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Arc<Vec<Rule>>,
    calls: Arc<Mutex<Vec<Call>>>,
    delay: Option<Duration>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_rule(mut self, rule: Rule) -> Self {
        Arc::make_mut(&mut self.rules).push(rule);
        self
    }

    /// Commands containing `needle` exit with `exit_code` on every OS
    pub fn fail(self, needle: &str, exit_code: i32) -> Self {
        self.respond(needle, exit_code, "")
    }

    /// Commands containing `needle` exit with `exit_code` on `os` only
    pub fn fail_on(self, os: &str, needle: &str, exit_code: i32) -> Self {
        self.with_rule(Rule {
            needle: needle.to_string(),
            os: Some(os.to_string()),
            exit_code,
            stdout: String::new(),
        })
    }

    /// Commands containing `needle` print `stdout` and exit with `exit_code`
    pub fn respond(self, needle: &str, exit_code: i32, stdout: &str) -> Self {
        self.with_rule(Rule {
            needle: needle.to_string(),
            os: None,
            exit_code,
            stdout: stdout.to_string(),
        })
    }

    /// Unmatched commands take `delay` before succeeding
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, os: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.os == os).collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        invocation: &CommandInvocation,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        let os = invocation.env.get("MATRIX_OS").cloned().unwrap_or_default();
        self.calls.lock().unwrap().push(Call {
            os: os.clone(),
            step_id: invocation.step_id.clone(),
            command: invocation.command.clone(),
        });

        let rule = self.rules.iter().find(|rule| {
            invocation.command.contains(&rule.needle)
                && rule.os.as_deref().map_or(true, |wanted| wanted == os)
        });

        let (exit_code, stdout) = match rule {
            Some(rule) => (rule.exit_code, rule.stdout.clone()),
            None => {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                (0, String::new())
            }
        };

        if let Some(cb) = callback {
            for line in stdout.lines() {
                cb.on_line(OutputStream::Stdout, line);
            }
        }

        Ok(CommandOutput::new(exit_code, stdout))
    }
}

/// Result of a scenario run
pub struct RunTestResult {
    pub run: WorkflowRun,
    pub events: Vec<ExecutionEvent>,
    _workspace_root: tempfile::TempDir,
}

impl RunTestResult {
    pub fn job(&self, os: &str) -> &Job {
        self.run
            .job(os)
            .unwrap_or_else(|| panic!("No job for '{}' in run", os))
    }

    pub fn step_state(&self, os: &str, step_id: &str) -> &StepState {
        &self
            .job(os)
            .step(step_id)
            .unwrap_or_else(|| panic!("Step '{}' not found in job '{}'", step_id, os))
            .state
    }

    /// Summary of every job for assertion messages
    pub fn summary(&self) -> String {
        self.run
            .jobs
            .iter()
            .map(|job| {
                format!(
                    "{}: {:?} ({} completed, {} failed, {} skipped)",
                    job.instance.label,
                    job.state.status,
                    job.state.completed_steps,
                    job.state.failed_steps,
                    job.state.skipped_steps
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Run a workflow against the mock runner
pub async fn run_workflow(
    config: &WorkflowConfig,
    runner: MockRunner,
    event: TriggerEvent,
    strategy: SchedulingStrategy,
) -> RunTestResult {
    let root = tempfile::tempdir().expect("temp dir");
    let options = RunOptions {
        strategy,
        workspace_root: root.path().to_path_buf(),
        repository: Some("/src/sdt-python".to_string()),
        ..RunOptions::default()
    };
    let scheduler = MatrixScheduler::new(runner, options);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    scheduler
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let run = scheduler
        .run(config, &event)
        .await
        .unwrap_or_else(|e| panic!("Run failed to start: {:#}", e));

    let events = events.lock().unwrap().clone();
    RunTestResult {
        run,
        events,
        _workspace_root: root,
    }
}

/// Run the built-in sdt-python workflow for a push event
pub async fn run_builtin(runner: MockRunner) -> RunTestResult {
    let config = WorkflowConfig::builtin().expect("built-in workflow");
    run_workflow(
        &config,
        runner,
        TriggerEvent::new(EventKind::Push),
        SchedulingStrategy::Parallel,
    )
    .await
}

/// Assert a job finished with `status`
pub fn assert_job_status(result: &RunTestResult, os: &str, status: ExecutionStatus) {
    assert_eq!(
        result.job(os).state.status,
        status,
        "Unexpected status for {}: {}",
        os,
        result.summary()
    );
}

/// Assert a step completed (tolerated failures included)
pub fn assert_step_completed(result: &RunTestResult, os: &str, step_id: &str) {
    let state = result.step_state(os, step_id);
    assert!(
        matches!(state, StepState::Completed { .. }),
        "Step '{}' on {} should be completed, but was in state: {:?}",
        step_id,
        os,
        state
    );
}

/// Assert a step failed with an error containing `expected_error`
pub fn assert_step_failed(result: &RunTestResult, os: &str, step_id: &str, expected_error: &str) {
    let state = result.step_state(os, step_id);
    match state {
        StepState::Failed { error, .. } => assert!(
            error.contains(expected_error),
            "Step '{}' error:\n{}\n\ndoes not contain:\n{}",
            step_id,
            error,
            expected_error
        ),
        other => panic!(
            "Step '{}' on {} should have failed, but was in state: {:?}",
            step_id, os, other
        ),
    }
}

/// Assert a step never ran
pub fn assert_step_skipped(result: &RunTestResult, os: &str, step_id: &str) {
    let state = result.step_state(os, step_id);
    assert!(
        matches!(state, StepState::Skipped { .. }),
        "Step '{}' on {} should be skipped, but was in state: {:?}",
        step_id,
        os,
        state
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_rules() {
        let runner = MockRunner::new()
            .fail_on("windows-latest", "pytest", 1)
            .respond("flake8", 0, "0\n");

        let invocation = CommandInvocation::new("conda run pytest")
            .for_step("test")
            .with_env("MATRIX_OS", "windows-latest");
        assert_eq!(runner.run(&invocation, None).await.unwrap().exit_code, Some(1));

        let invocation = CommandInvocation::new("conda run pytest")
            .for_step("test")
            .with_env("MATRIX_OS", "ubuntu-latest");
        assert_eq!(runner.run(&invocation, None).await.unwrap().exit_code, Some(0));

        let invocation = CommandInvocation::new("flake8 .").for_step("lint");
        assert_eq!(runner.run(&invocation, None).await.unwrap().stdout, "0\n");

        assert_eq!(runner.calls().len(), 3);
        assert_eq!(runner.calls_for("windows-latest").len(), 1);
    }

    #[tokio::test]
    async fn test_run_builtin_succeeds_with_default_mock() {
        let result = run_builtin(MockRunner::new()).await;
        assert!(result.run.is_success(), "{}", result.summary());
        assert_eq!(result.run.jobs.len(), 3);
    }
}
