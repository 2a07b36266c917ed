//! The two flake8 passes: errors are fatal, style findings are reported

use crate::helpers::*;
use sdt_ci::core::{ExecutionStatus, StepState};
use sdt_ci::execution::ExecutionEvent;

const UNDEFINED_NAME: &str = "\
./sdt/io/tiff.py:41:16: F821 undefined name 'np'
1     F821 undefined name 'np'
1
";

const PASS_A: &str = "--select=E9,F63,F7,F82";
const PASS_B: &str = "--exit-zero";

#[tokio::test]
async fn test_error_pass_fails_on_undefined_name() {
    let runner = MockRunner::new().respond(PASS_A, 1, UNDEFINED_NAME);
    let result = run_builtin(runner).await;

    for os in ["ubuntu-latest", "macos-latest", "windows-latest"] {
        assert_job_status(&result, os, ExecutionStatus::Failed);
        assert_step_failed(&result, os, "lint-errors", "Process exited with code 1");
        assert_step_skipped(&result, os, "lint-style");
        assert_step_skipped(&result, os, "test");
    }

    let report = result
        .events
        .iter()
        .find_map(|e| match e {
            ExecutionEvent::LintFindings { step_id, report, .. } if step_id == "lint-errors" => {
                Some(report.clone())
            }
            _ => None,
        })
        .expect("lint findings reported");
    assert_eq!(report.total, 1);
    assert_eq!(report.by_code.get("F821"), Some(&1));
}

#[tokio::test]
async fn test_style_pass_reports_without_failing() {
    let runner = MockRunner::new().respond(PASS_B, 0, UNDEFINED_NAME);
    let result = run_builtin(runner).await;

    assert!(result.run.is_success(), "{}", result.summary());
    match result.step_state("ubuntu-latest", "lint-style") {
        StepState::Completed { tolerated, output, .. } => {
            assert!(!tolerated);
            assert!(output.contains("F821"));
        }
        other => panic!("lint-style should have completed, was {:?}", other),
    }

    let findings = result
        .events
        .iter()
        .filter(|e| {
            matches!(e, ExecutionEvent::LintFindings { step_id, report, .. }
                if step_id == "lint-style" && report.total == 1)
        })
        .count();
    assert_eq!(findings, 3);
}

#[tokio::test]
async fn test_style_pass_tolerates_non_zero_exit() {
    let runner = MockRunner::new().respond(PASS_B, 1, UNDEFINED_NAME);
    let result = run_builtin(runner).await;

    assert!(result.run.is_success(), "{}", result.summary());
    match result.step_state("windows-latest", "lint-style") {
        StepState::Completed {
            tolerated,
            exit_code,
            ..
        } => {
            assert!(tolerated);
            assert_eq!(*exit_code, 1);
        }
        other => panic!("lint-style should be tolerated, was {:?}", other),
    }
    assert_step_completed(&result, "windows-latest", "test");
}

#[tokio::test]
async fn test_clean_error_pass_reports_zero_findings() {
    let runner = MockRunner::new().respond(PASS_A, 0, "0\n");
    let result = run_builtin(runner).await;

    assert!(result.run.is_success());
    let clean = result.events.iter().any(|e| {
        matches!(e, ExecutionEvent::LintFindings { step_id, report, .. }
            if step_id == "lint-errors" && report.is_clean())
    });
    assert!(clean);
}
