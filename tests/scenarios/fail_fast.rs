//! Failure isolation between matrix jobs

use crate::helpers::*;
use sdt_ci::core::config::WorkflowConfig;
use sdt_ci::core::trigger::{EventKind, TriggerEvent};
use sdt_ci::core::{ExecutionStatus, StepState};
use sdt_ci::execution::SchedulingStrategy;
use std::time::Duration;

const TEST_COMMAND: &str = "conda run --name test-environment pytest";

#[tokio::test]
async fn test_windows_failure_leaves_other_jobs_alone() {
    let runner = MockRunner::new().fail_on("windows-latest", TEST_COMMAND, 1);
    let result = run_builtin(runner).await;

    assert_job_status(&result, "ubuntu-latest", ExecutionStatus::Completed);
    assert_job_status(&result, "macos-latest", ExecutionStatus::Completed);
    assert_job_status(&result, "windows-latest", ExecutionStatus::Failed);
    assert_step_failed(&result, "windows-latest", "test", "Process exited with code 1");
    assert_step_completed(&result, "ubuntu-latest", "test");
    assert_step_completed(&result, "macos-latest", "test");

    assert_eq!(result.run.status, ExecutionStatus::Failed);
    assert!(!result.run.is_success());
}

#[tokio::test]
async fn test_fail_fast_cancels_jobs_that_have_not_started() {
    let mut config = WorkflowConfig::builtin().unwrap();
    config.strategy.fail_fast = true;

    let runner = MockRunner::new().fail_on("ubuntu-latest", "--file requirements.txt", 1);
    let result = run_workflow(
        &config,
        runner.clone(),
        TriggerEvent::new(EventKind::Push),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_job_status(&result, "ubuntu-latest", ExecutionStatus::Failed);
    assert_job_status(&result, "macos-latest", ExecutionStatus::Cancelled);
    assert_job_status(&result, "windows-latest", ExecutionStatus::Cancelled);
    assert_step_skipped(&result, "macos-latest", "checkout");
    assert!(runner.calls_for("macos-latest").is_empty());
    assert!(runner.calls_for("windows-latest").is_empty());
}

#[tokio::test]
async fn test_fail_fast_cancels_running_jobs_at_next_step() {
    let mut config = WorkflowConfig::builtin().unwrap();
    config.strategy.fail_fast = true;

    let runner = MockRunner::new()
        .fail_on("windows-latest", "git clone", 128)
        .with_delay(Duration::from_millis(100));
    let result = run_workflow(
        &config,
        runner.clone(),
        TriggerEvent::new(EventKind::Push),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_job_status(&result, "windows-latest", ExecutionStatus::Failed);
    assert_step_failed(&result, "windows-latest", "checkout", "Process exited with code 128");

    for os in ["ubuntu-latest", "macos-latest"] {
        assert_job_status(&result, os, ExecutionStatus::Cancelled);
        for step in ["setup-conda", "install-requirements", "lint-errors", "test"] {
            assert_step_skipped(&result, os, step);
        }
        match result.step_state(os, "test") {
            StepState::Skipped { reason } => assert_eq!(reason, "cancelled by fail-fast"),
            other => panic!("test should be skipped, was {:?}", other),
        }
        let calls = runner.calls_for(os);
        assert!(
            calls.iter().all(|c| c.step_id == "checkout"),
            "{} ran past the step boundary: {:?}",
            os,
            calls
        );
    }

    assert_eq!(result.run.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_sequential_without_fail_fast_runs_every_job() {
    let config = WorkflowConfig::builtin().unwrap();
    let runner = MockRunner::new().fail_on("ubuntu-latest", "--file requirements.txt", 1);
    let result = run_workflow(
        &config,
        runner.clone(),
        TriggerEvent::new(EventKind::PullRequest),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_job_status(&result, "ubuntu-latest", ExecutionStatus::Failed);
    assert_job_status(&result, "macos-latest", ExecutionStatus::Completed);
    assert_job_status(&result, "windows-latest", ExecutionStatus::Completed);
    assert_eq!(runner.calls_for("windows-latest").len(), 13);
}

#[tokio::test]
async fn test_limited_parallel_runs_all_jobs() {
    let config = WorkflowConfig::builtin().unwrap();
    let result = run_workflow(
        &config,
        MockRunner::new(),
        TriggerEvent::new(EventKind::Push),
        SchedulingStrategy::LimitedParallel(1),
    )
    .await;

    assert!(result.run.is_success(), "{}", result.summary());
    assert_eq!(result.run.jobs.len(), 3);
}
