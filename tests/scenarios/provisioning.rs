//! Provisioning failures abort the job they happen in

use crate::helpers::*;
use sdt_ci::core::{ExecutionStatus, StepState};
use sdt_ci::execution::ExecutionEvent;

const BEFORE: [&str; 7] = [
    "checkout",
    "setup-conda",
    "conda-info",
    "conda-list",
    "update-conda",
    "update-packages",
    "install-tools",
];

const AFTER: [&str; 5] = [
    "install-packages",
    "lint-errors",
    "lint-style",
    "reinstall-pytest",
    "test",
];

#[tokio::test]
async fn test_missing_requirements_fails_install_step() {
    let runner = MockRunner::new().fail("--file requirements.txt", 1);
    let result = run_builtin(runner.clone()).await;

    for os in ["ubuntu-latest", "macos-latest", "windows-latest"] {
        for step in BEFORE {
            assert_step_completed(&result, os, step);
        }
        assert_step_failed(&result, os, "install-requirements", "exited with code 1");
        for step in AFTER {
            assert_step_skipped(&result, os, step);
        }

        let job = result.job(os);
        assert_eq!(job.state.status, ExecutionStatus::Failed);
        assert_eq!(job.state.completed_steps, 7);
        assert_eq!(job.state.failed_steps, 1);
        assert_eq!(job.state.skipped_steps, 5);
        assert_eq!(job.failed_step().map(|s| s.id.as_str()), Some("install-requirements"));

        assert_eq!(runner.calls_for(os).len(), 8, "later steps must not run on {}", os);
    }
}

#[tokio::test]
async fn test_skipped_steps_name_the_failed_step() {
    let runner = MockRunner::new().fail("--file requirements.txt", 1);
    let result = run_builtin(runner).await;

    match result.step_state("ubuntu-latest", "test") {
        StepState::Skipped { reason } => {
            assert_eq!(reason, "step 'install-requirements' failed");
        }
        other => panic!("test should be skipped, was {:?}", other),
    }

    let skipped: usize = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StepsSkipped { count, .. } => Some(*count),
            _ => None,
        })
        .sum();
    assert_eq!(skipped, 15);
}

#[tokio::test]
async fn test_diagnostics_failure_is_not_fatal() {
    let runner = MockRunner::new().fail("conda info", 127);
    let result = run_builtin(runner).await;

    assert!(result.run.is_success(), "{}", result.summary());
    match result.step_state("macos-latest", "conda-info") {
        StepState::Completed {
            tolerated,
            exit_code,
            ..
        } => {
            assert!(tolerated);
            assert_eq!(*exit_code, 127);
        }
        other => panic!("conda-info should be tolerated, was {:?}", other),
    }

    let tolerated = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::StepTolerated { step_id, .. } if step_id == "conda-info"))
        .count();
    assert_eq!(tolerated, 3);
}
