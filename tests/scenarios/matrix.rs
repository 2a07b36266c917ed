//! One independent job per configured operating system

use crate::helpers::*;
use sdt_ci::core::ExecutionStatus;
use sdt_ci::execution::ExecutionEvent;

const LABELS: [&str; 3] = ["ubuntu-latest", "macos-latest", "windows-latest"];

#[tokio::test]
async fn test_builtin_runs_one_job_per_os() {
    let runner = MockRunner::new();
    let result = run_builtin(runner.clone()).await;

    assert!(result.run.triggered);
    assert_eq!(result.run.jobs.len(), 3, "{}", result.summary());
    for label in LABELS {
        assert_job_status(&result, label, ExecutionStatus::Completed);
        assert_eq!(result.job(label).state.completed_steps, 13);
    }
    assert_eq!(result.run.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_every_job_runs_every_step_in_order() {
    let runner = MockRunner::new();
    run_builtin(runner.clone()).await;

    let expected = [
        "checkout",
        "setup-conda",
        "conda-info",
        "conda-list",
        "update-conda",
        "update-packages",
        "install-tools",
        "install-requirements",
        "install-packages",
        "lint-errors",
        "lint-style",
        "reinstall-pytest",
        "test",
    ];
    for label in LABELS {
        let steps: Vec<String> = runner
            .calls_for(label)
            .into_iter()
            .map(|call| call.step_id)
            .collect();
        assert_eq!(steps, expected, "step order on {}", label);
    }
}

#[tokio::test]
async fn test_jobs_get_their_own_execution_ids() {
    let result = run_builtin(MockRunner::new()).await;

    let mut ids: Vec<_> = result.run.jobs.iter().map(|j| j.state.execution_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    let started = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::JobStarted { .. }))
        .count();
    assert_eq!(started, 3);
}

#[tokio::test]
async fn test_commands_use_the_named_environment() {
    let runner = MockRunner::new();
    run_builtin(runner.clone()).await;

    let calls = runner.calls_for("macos-latest");
    let install = calls
        .iter()
        .find(|c| c.step_id == "install-requirements")
        .expect("install-requirements ran");
    assert_eq!(
        install.command,
        "conda install --yes --name test-environment -c conda-forge --file requirements.txt"
    );

    let test = calls.iter().find(|c| c.step_id == "test").expect("test ran");
    assert_eq!(test.command, "conda run --name test-environment pytest");
}
