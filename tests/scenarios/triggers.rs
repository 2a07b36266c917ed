//! Which events start a run

use crate::helpers::*;
use sdt_ci::core::config::WorkflowConfig;
use sdt_ci::core::trigger::{EventKind, TriggerEvent};
use sdt_ci::core::ExecutionStatus;
use sdt_ci::execution::{ExecutionEvent, SchedulingStrategy};

async fn run_for(kind: EventKind, runner: MockRunner) -> RunTestResult {
    let config = WorkflowConfig::builtin().unwrap();
    run_workflow(&config, runner, TriggerEvent::new(kind), SchedulingStrategy::Parallel).await
}

#[tokio::test]
async fn test_push_and_pull_request_trigger() {
    for kind in [EventKind::Push, EventKind::PullRequest] {
        let result = run_for(kind, MockRunner::new()).await;
        assert!(result.run.triggered, "{} should trigger", kind);
        assert_eq!(result.run.jobs.len(), 3);
        assert_eq!(result.run.status, ExecutionStatus::Completed);
    }
}

#[tokio::test]
async fn test_workflow_dispatch_does_not_trigger() {
    let runner = MockRunner::new();
    let result = run_for(EventKind::WorkflowDispatch, runner.clone()).await;

    assert!(!result.run.triggered);
    assert!(result.run.jobs.is_empty());
    assert_eq!(result.run.status, ExecutionStatus::Pending);
    assert!(result.run.is_success());
    assert!(runner.calls().is_empty());
    assert!(matches!(
        result.events.as_slice(),
        [ExecutionEvent::RunSkipped { event, .. }] if event == "workflow_dispatch"
    ));
}

#[tokio::test]
async fn test_event_details_reach_checkout() {
    let config = WorkflowConfig::builtin().unwrap();
    let runner = MockRunner::new();
    let event = TriggerEvent::new(EventKind::Push)
        .with_ref("refs/heads/develop")
        .with_sha("4f2c9e1");
    run_workflow(&config, runner.clone(), event, SchedulingStrategy::Sequential).await;

    let checkout = runner
        .calls_for("ubuntu-latest")
        .into_iter()
        .find(|c| c.step_id == "checkout")
        .expect("checkout ran");
    assert_eq!(
        checkout.command,
        "git clone --quiet /src/sdt-python . && git checkout --quiet 4f2c9e1"
    );
}

#[tokio::test]
async fn test_branch_only_event_checks_out_the_branch() {
    let config = WorkflowConfig::builtin().unwrap();
    let runner = MockRunner::new();
    let event = TriggerEvent::new(EventKind::PullRequest).with_ref("refs/heads/feature-x");
    run_workflow(&config, runner.clone(), event, SchedulingStrategy::Parallel).await;

    for os in ["ubuntu-latest", "macos-latest", "windows-latest"] {
        let checkout = runner
            .calls_for(os)
            .into_iter()
            .find(|c| c.step_id == "checkout")
            .expect("checkout ran");
        assert_eq!(
            checkout.command,
            "git clone --quiet /src/sdt-python . && git checkout --quiet feature-x"
        );
    }
}
