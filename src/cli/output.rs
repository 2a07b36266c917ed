//! CLI output formatting

use crate::{
    core::{ExecutionStatus, Job, StepState},
    execution::{ExecutionEvent, WorkflowRun},
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over matrix jobs
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed { tolerated: true, exit_code, .. } => {
            style(format!("TOLERATED (exit {})", exit_code)).yellow().to_string()
        }
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn status_icon(status: ExecutionStatus) -> Emoji<'static, 'static> {
    match status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Cancelled => SKIP,
        ExecutionStatus::Pending => INFO,
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let mut line = format!(
        "{} {} - {} ({}) - {} ({}/{}) - {}",
        status_icon(summary.status),
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow_name).bold(),
        style(&summary.matrix_os).cyan(),
        format_status(summary.status),
        summary.completed_steps,
        summary.total_steps,
        style(format!("{:.0}%", summary.progress * 100.0)).cyan()
    );
    if let Some(step) = &summary.failed_step {
        line.push_str(&format!(" - failed at {}", style(step).red()));
    }
    line
}

/// One line per job of a finished run
pub fn format_job_result(job: &Job) -> String {
    let mut line = format!(
        "{} {:<16} {} ({}/{} steps)",
        status_icon(job.state.status),
        job.instance.label,
        format_status(job.state.status),
        job.state.completed_steps,
        job.state.total_steps
    );
    if let Some(step) = job.failed_step() {
        line.push_str(&format!(" - failed at {}", style(&step.id).red()));
    }
    line
}

/// Final verdict of a run
pub fn format_run_result(run: &WorkflowRun) -> String {
    if !run.triggered {
        return format!(
            "{} {} is not triggered by {}",
            INFO,
            style(&run.workflow_name).bold(),
            style(run.event.kind).cyan()
        );
    }
    if run.is_success() {
        format!(
            "{} {} completed {}",
            CHECK,
            style(&run.workflow_name).bold(),
            style("successfully").green()
        )
    } else {
        let failed = run
            .jobs
            .iter()
            .filter(|j| j.state.status == ExecutionStatus::Failed)
            .count();
        format!(
            "{} {} {} ({} of {} jobs failed)",
            CROSS,
            style(&run.workflow_name).bold(),
            style("failed").red(),
            failed,
            run.jobs.len()
        )
    }
}

/// Format an execution event for display; `None` for events that are
/// not printed as a line of their own
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::RunStarted {
            run_id,
            workflow_name,
            event,
            jobs,
        } => format!(
            "{} Starting {} for {} with {} jobs ({})",
            ROCKET,
            style(workflow_name).bold(),
            style(event).cyan(),
            jobs,
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::RunSkipped { workflow_name, event } => format!(
            "{} {} is not triggered by {}",
            INFO,
            style(workflow_name).bold(),
            style(event).cyan()
        ),
        ExecutionEvent::JobStarted { job, total_steps, .. } => format!(
            "{} [{}] starting ({} steps)",
            ROCKET,
            style(job).cyan(),
            total_steps
        ),
        ExecutionEvent::StepStarted { job, name, .. } => {
            format!("{} [{}] {}", SPINNER, style(job).cyan(), name)
        }
        ExecutionEvent::StepOutput { .. } => return None,
        ExecutionEvent::StepCompleted { job, step_id } => {
            format!("{} [{}] {}", CHECK, style(job).cyan(), style(step_id).green())
        }
        ExecutionEvent::StepTolerated { job, step_id, error } => format!(
            "{} [{}] {}: {} (continuing)",
            WARN,
            style(job).cyan(),
            style(step_id).yellow(),
            style(error).dim()
        ),
        ExecutionEvent::LintFindings { job, step_id, report } => format!(
            "{} [{}] {}: {}",
            INFO,
            style(job).cyan(),
            style(step_id).dim(),
            report.summary()
        ),
        ExecutionEvent::StepFailed { job, step_id, error } => format!(
            "{} [{}] {}: {}",
            CROSS,
            style(job).cyan(),
            style(step_id).red(),
            style(error).dim()
        ),
        ExecutionEvent::StepsSkipped { job, count, reason } => format!(
            "{} [{}] skipped {} steps ({})",
            SKIP,
            style(job).cyan(),
            count,
            reason
        ),
        ExecutionEvent::JobCompleted { job, status, .. } => format!(
            "{} [{}] {}",
            status_icon(*status),
            style(job).cyan(),
            format_status(*status)
        ),
        ExecutionEvent::RunCompleted { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
    };
    Some(line)
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
