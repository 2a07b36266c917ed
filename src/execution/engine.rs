//! Main execution engine - runs the steps of one job

use crate::{
    core::{lint::LintReport, ExecutionStatus, Job, JobContext, StepState},
    execution::{ExecutionResult, StepExecutor},
    runner::{CommandRunner, OutputCallback, OutputStream},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Events that can occur during a workflow run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow_name: String,
        event: String,
        jobs: usize,
    },
    RunSkipped {
        workflow_name: String,
        event: String,
    },
    JobStarted {
        job: String,
        execution_id: Uuid,
        total_steps: usize,
    },
    StepStarted {
        job: String,
        step_id: String,
        name: String,
    },
    StepOutput {
        job: String,
        step_id: String,
        stream: OutputStream,
        line: String,
    },
    StepCompleted {
        job: String,
        step_id: String,
    },
    StepTolerated {
        job: String,
        step_id: String,
        error: String,
    },
    LintFindings {
        job: String,
        step_id: String,
        report: LintReport,
    },
    StepFailed {
        job: String,
        step_id: String,
        error: String,
    },
    StepsSkipped {
        job: String,
        count: usize,
        reason: String,
    },
    JobCompleted {
        job: String,
        execution_id: Uuid,
        status: ExecutionStatus,
    },
    RunCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Forwards streamed lines of a step as `StepOutput` events
struct EventForwarder {
    job: String,
    step_id: String,
    handlers: Vec<EventHandler>,
}

impl OutputCallback for EventForwarder {
    fn on_line(&self, stream: OutputStream, line: &str) {
        for handler in &self.handlers {
            handler(ExecutionEvent::StepOutput {
                job: self.job.clone(),
                step_id: self.step_id.clone(),
                stream,
                line: line.to_string(),
            });
        }
    }
}

/// Runs the steps of a job one after another
pub struct ExecutionEngine<R> {
    executor: Arc<StepExecutor<R>>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R> Clone for ExecutionEngine<R> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            event_handlers: self.event_handlers.clone(),
        }
    }
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(runner)),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    pub(crate) async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute every step of `job` in declaration order.
    ///
    /// A failing step that is not `continue_on_error` fails the job and
    /// skips the remaining steps. `cancel` is checked before each step;
    /// once set, the remaining steps are skipped and the job is cancelled.
    pub async fn execute(&self, job: &mut Job, base: &JobContext, cancel: &AtomicBool) {
        let label = job.instance.label.clone();
        let execution_id = job.state.execution_id;

        info!("Starting job: {} ({})", job.display_name(), execution_id);
        job.state.start(job.steps.len());
        self.emit_event(ExecutionEvent::JobStarted {
            job: label.clone(),
            execution_id,
            total_steps: job.steps.len(),
        })
        .await;

        while let Some(step_id) = job.next_pending().map(|s| s.id.clone()) {
            if cancel.load(Ordering::SeqCst) {
                warn!("Job {} cancelled before step {}", label, step_id);
                self.skip_remaining(job, "cancelled by fail-fast").await;
                job.state.cancel();
                break;
            }

            self.execute_step(job, base, &step_id).await;
            job.update_counts();

            if job.failed_step().is_some() {
                let reason = format!("step '{}' failed", step_id);
                self.skip_remaining(job, &reason).await;
                job.state.fail();
                break;
            }
        }

        if job.state.status == ExecutionStatus::Running {
            job.state.complete();
        }
        job.update_counts();

        info!("Job finished: {} - {:?}", job.display_name(), job.state.status);
        self.emit_event(ExecutionEvent::JobCompleted {
            job: label,
            execution_id,
            status: job.state.status,
        })
        .await;
    }

    async fn execute_step(&self, job: &mut Job, base: &JobContext, step_id: &str) {
        let label = job.instance.label.clone();
        let context = job.create_context_for_step(base, step_id);

        let step = match job.step_mut(step_id) {
            Some(step) => step,
            None => return,
        };
        let started_at = chrono::Utc::now();
        step.state = StepState::Running { started_at };
        let step = step.clone();

        self.emit_event(ExecutionEvent::StepStarted {
            job: label.clone(),
            step_id: step.id.clone(),
            name: step.name.clone(),
        })
        .await;

        let forwarder = EventForwarder {
            job: label.clone(),
            step_id: step.id.clone(),
            handlers: self.event_handlers.lock().await.clone(),
        };
        let result = self.executor.execute(&step, &context, Some(&forwarder)).await;

        if let Some(report) = result.lint() {
            info!("Lint report for {}/{}: {}", label, step.id, report.summary());
            self.emit_event(ExecutionEvent::LintFindings {
                job: label.clone(),
                step_id: step.id.clone(),
                report: report.clone(),
            })
            .await;
        }

        let now = chrono::Utc::now();
        let (state, event) = match result {
            ExecutionResult::Success { output, .. } => (
                StepState::Completed {
                    output: output.stdout,
                    exit_code: output.exit_code.unwrap_or(0),
                    tolerated: false,
                    started_at,
                    completed_at: now,
                },
                ExecutionEvent::StepCompleted {
                    job: label,
                    step_id: step.id.clone(),
                },
            ),
            ExecutionResult::Tolerated { error, output, .. } => (
                StepState::Completed {
                    exit_code: output.as_ref().and_then(|o| o.exit_code).unwrap_or(-1),
                    output: output.map(|o| o.stdout).unwrap_or_default(),
                    tolerated: true,
                    started_at,
                    completed_at: now,
                },
                ExecutionEvent::StepTolerated {
                    job: label,
                    step_id: step.id.clone(),
                    error,
                },
            ),
            ExecutionResult::Failed { error, output, .. } => (
                StepState::Failed {
                    error: error.clone(),
                    exit_code: output.as_ref().and_then(|o| o.exit_code),
                    output: output.map(|o| o.combined()).unwrap_or_default(),
                    started_at,
                    failed_at: now,
                },
                ExecutionEvent::StepFailed {
                    job: label,
                    step_id: step.id.clone(),
                    error,
                },
            ),
        };

        if let Some(s) = job.step_mut(&step.id) {
            s.state = state;
        }
        self.emit_event(event).await;
    }

    async fn skip_remaining(&self, job: &mut Job, reason: &str) {
        let count = job.skip_remaining(reason);
        if count > 0 {
            self.emit_event(ExecutionEvent::StepsSkipped {
                job: job.instance.label.clone(),
                count,
                reason: reason.to_string(),
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorkflowConfig;
    use crate::runner::{CommandInvocation, CommandOutput, RunnerError};
    use std::sync::Mutex as StdMutex;

    /// Fails every command that contains `fail_on`
    struct ScriptedRunner {
        fail_on: Option<String>,
        commands: StdMutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(fail_on: Option<&str>) -> Self {
            Self {
                fail_on: fail_on.map(str::to_string),
                commands: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            invocation: &CommandInvocation,
            callback: Option<&dyn OutputCallback>,
        ) -> Result<CommandOutput, RunnerError> {
            self.commands.lock().unwrap().push(invocation.command.clone());
            if let Some(cb) = callback {
                cb.on_line(OutputStream::Stdout, &invocation.command);
            }
            let failing = self
                .fail_on
                .as_deref()
                .is_some_and(|needle| invocation.command.contains(needle));
            Ok(CommandOutput::new(if failing { 1 } else { 0 }, "out\n"))
        }
    }

    fn job() -> Job {
        let yaml = r#"
name: "Engine Test"
on: push
strategy:
  matrix:
    os: [ubuntu-latest]
steps:
  - id: "info"
    name: "Info"
    run: "conda info"
    continue_on_error: true
  - id: "install"
    name: "Install"
    run: "conda install --file requirements.txt"
  - id: "test"
    name: "Test"
    run: "pytest"
"#;
        let config = WorkflowConfig::from_yaml(yaml).unwrap();
        let matrix = config.matrix().unwrap();
        config.to_job(&matrix.expand()[0])
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let engine = ExecutionEngine::new(ScriptedRunner::new(None));
        let mut job = job();
        let base = job.base_context();

        engine.execute(&mut job, &base, &AtomicBool::new(false)).await;

        assert_eq!(job.state.status, ExecutionStatus::Completed);
        assert_eq!(job.state.completed_steps, 3);
        assert_eq!(job.state.progress(), 1.0);
    }

    #[tokio::test]
    async fn test_failure_skips_remaining_steps() {
        let engine = ExecutionEngine::new(ScriptedRunner::new(Some("requirements.txt")));
        let mut job = job();
        let base = job.base_context();

        engine.execute(&mut job, &base, &AtomicBool::new(false)).await;

        assert_eq!(job.state.status, ExecutionStatus::Failed);
        assert!(matches!(job.step("info").unwrap().state, StepState::Completed { .. }));
        assert!(matches!(
            job.step("install").unwrap().state,
            StepState::Failed { exit_code: Some(1), .. }
        ));
        assert!(matches!(job.step("test").unwrap().state, StepState::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_tolerated_failure_does_not_fail_job() {
        let engine = ExecutionEngine::new(ScriptedRunner::new(Some("conda info")));
        let mut job = job();
        let base = job.base_context();

        engine.execute(&mut job, &base, &AtomicBool::new(false)).await;

        assert_eq!(job.state.status, ExecutionStatus::Completed);
        assert!(matches!(
            job.step("info").unwrap().state,
            StepState::Completed { tolerated: true, exit_code: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancel_flag_skips_everything() {
        let runner = Arc::new(ScriptedRunner::new(None));
        let engine = ExecutionEngine::new(runner.clone());
        let mut job = job();
        let base = job.base_context();

        engine.execute(&mut job, &base, &AtomicBool::new(true)).await;

        assert_eq!(job.state.status, ExecutionStatus::Cancelled);
        assert_eq!(job.state.skipped_steps, 3);
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let engine = ExecutionEngine::new(ScriptedRunner::new(Some("pytest")));
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        engine
            .add_event_handler(move |event| {
                let name = match event {
                    ExecutionEvent::JobStarted { .. } => "job-started",
                    ExecutionEvent::StepStarted { .. } => "step-started",
                    ExecutionEvent::StepOutput { .. } => "output",
                    ExecutionEvent::StepCompleted { .. } => "completed",
                    ExecutionEvent::StepTolerated { .. } => "tolerated",
                    ExecutionEvent::StepFailed { .. } => "failed",
                    ExecutionEvent::JobCompleted { .. } => "job-completed",
                    _ => "other",
                };
                sink.lock().unwrap().push(name);
            })
            .await;

        let mut job = job();
        let base = job.base_context();
        engine.execute(&mut job, &base, &AtomicBool::new(false)).await;

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "job-started",
                "step-started",
                "output",
                "completed",
                "step-started",
                "output",
                "completed",
                "step-started",
                "output",
                "failed",
                "job-completed",
            ]
        );
    }
}
