use anyhow::{Context, Result};
use sdt_ci::cli::commands::{
    load_workflow, repository_or_default, HistoryCommand, ListCommand, PlanCommand, RunCommand,
    ValidateCommand,
};
use sdt_ci::cli::output::*;
use sdt_ci::cli::terminal_output::TerminalOutput;
use sdt_ci::cli::{Cli, Command};
use sdt_ci::core::{ExecutionStatus, StepState};
use sdt_ci::execution::{MatrixScheduler, RunOptions};
use sdt_ci::persistence::{save_run, ExecutionSummary, InMemoryPersistence, PersistenceBackend};
use sdt_ci::runner::SubprocessRunner;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Lines of a failed step's output shown after the run
const FAILED_OUTPUT_LINES: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.stream).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Plan(cmd) => plan_workflow(cmd)?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd, cli.verbose).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    let store = sdt_ci::persistence::SqliteExecutionStore::with_default_path()
        .await
        .context("Failed to open run history")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    tracing::warn!("Built without the sqlite feature; history is not kept between runs");
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_workflow(cmd: &RunCommand, stream: bool) -> Result<()> {
    let config = load_workflow(cmd.file.as_deref())?;
    println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());

    for (key, value) in &cmd.variable {
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history().await?
    };

    let event = cmd.event.to_event();
    let scheduler = MatrixScheduler::new(SubprocessRunner::default(), cmd.run_options());

    let mut output = TerminalOutput::new(stream);
    if !stream && config.trigger_set()?.matches(&event) {
        output = output.with_progress(create_progress_bar(scheduler.plan(&config)?.len()));
    }
    scheduler
        .add_event_handler(move |event| output.on_event(&event))
        .await;

    println!();
    let run = scheduler.run(&config, &event).await?;

    if run.triggered {
        println!();
        for job in &run.jobs {
            println!("  {}", format_job_result(job));
            if job.has_failed() {
                for step in &job.steps {
                    let detail = match &step.state {
                        StepState::Failed { error, .. } => format!(" - {}", error),
                        StepState::Skipped { reason } => format!(" - {}", reason),
                        _ => String::new(),
                    };
                    println!(
                        "      {:<22} {}{}",
                        step.id,
                        format_step_state(&step.state),
                        style(detail).dim()
                    );
                    if let StepState::Failed { output, .. } = &step.state {
                        if !output.trim().is_empty() {
                            for line in format_output(output.trim_end(), FAILED_OUTPUT_LINES).lines() {
                                println!("        {}", style(line).dim());
                            }
                        }
                    }
                }
            }
        }

        let saved = save_run(store.as_ref(), &run).await?;
        if !cmd.no_history {
            println!(
                "\n{} {} jobs saved to history (run {})",
                INFO,
                saved,
                style(&run.run_id.to_string()[..8]).dim()
            );
        }
    }

    println!("\n{}", format_run_result(&run));
    if !run.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    let config = match load_workflow(cmd.file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let triggers: Vec<&str> = config
        .trigger_set()?
        .kinds()
        .iter()
        .map(|kind| kind.name())
        .collect();
    let matrix = config.matrix()?;
    let labels: Vec<&str> = matrix.expand().iter().map(|i| i.label.as_str()).collect();

    println!("{} Workflow configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!("  Triggers: {}", style(triggers.join(", ")).cyan());
    println!("  Matrix: {} ({})", style(matrix.len()).cyan(), labels.join(", "));
    println!("  Fail-fast: {}", style(config.strategy.fail_fast).cyan());
    println!("  Steps: {}", style(config.steps.len()).cyan());
    println!("  Variables: {}", style(config.get_variables().len()).cyan());

    if cmd.json {
        let json = serde_json::to_string_pretty(&config)?;
        println!("\n{}", json);
    }

    Ok(())
}

fn plan_workflow(cmd: &PlanCommand) -> Result<()> {
    let config = load_workflow(cmd.file.as_deref())?;
    let event = cmd.event.to_event();

    if !config.trigger_set()?.matches(&event) {
        println!(
            "{} {} is not triggered by {}",
            INFO,
            style(&config.name).bold(),
            style(event.kind).cyan()
        );
        return Ok(());
    }

    let options = RunOptions {
        os_filter: cmd.os.clone(),
        repository: repository_or_default(cmd.repository.as_deref()),
        ..RunOptions::default()
    };
    let scheduler = MatrixScheduler::new(SubprocessRunner::default(), options);
    let jobs = scheduler.plan(&config)?;

    println!(
        "{} {} runs {} jobs for {}",
        ROCKET,
        style(&config.name).bold(),
        jobs.len(),
        style(event.kind).cyan()
    );

    for job in &jobs {
        println!("\n{} ({})", style(&job.instance.label).bold(), job.instance.os);
        let context = scheduler.base_context(job, &event);
        let variables = context.get_rendering_variables();
        for (n, step) in job.steps.iter().enumerate() {
            let marker = if step.continue_on_error {
                style(" (continue on error)").yellow().to_string()
            } else {
                String::new()
            };
            println!("  {:>2}. {}{}", n + 1, step.name, marker);
            println!("      {}", style(step.render_command(&variables)).dim());
        }
    }

    Ok(())
}

async fn list_workflows(cmd: &ListCommand) -> Result<()> {
    let store = open_history().await?;
    let workflows = store.list_workflows().await?;

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(());
    }

    println!("{} Workflows in history:", INFO);

    let mut json_data = Vec::new();
    for name in &workflows {
        let executions = store.list_executions(name).await?;
        let completed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        let failed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count();

        if cmd.with_counts {
            println!(
                "  {} ({} jobs: {} succeeded, {} failed)",
                style(name).bold(),
                style(executions.len()).cyan(),
                style(completed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(name).bold());
        }

        json_data.push(serde_json::json!({
            "name": name,
            "execution_count": executions.len(),
            "completed": completed,
            "failed": failed,
        }));
    }

    if cmd.json {
        let data = serde_json::json!({ "workflows": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand, verbose: bool) -> Result<()> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        let jobs = store.list_run(run_id).await?;

        if jobs.is_empty() {
            println!("{} Run not found", WARN);
            return Ok(());
        }
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "jobs": jobs }))?);
            return Ok(());
        }
        for summary in &jobs {
            print_execution_details(summary, verbose)?;
        }
        return Ok(());
    }

    let executions = if let Some(workflow) = &cmd.workflow {
        store.list_executions(workflow).await?
    } else {
        let mut all = Vec::new();
        for workflow in store.list_workflows().await? {
            all.extend(store.list_executions(&workflow).await?);
        }
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    };
    let executions: Vec<ExecutionSummary> = executions.into_iter().take(cmd.limit).collect();

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, executions.len());
    for summary in &executions {
        if verbose {
            print_execution_details(summary, true)?;
        } else {
            println!("  {}", format_execution_summary(summary));
        }
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("\n{} {} ({})", INFO, style(&summary.workflow_name).bold(), style(&summary.matrix_os).cyan());
    println!("  Run: {}", style(summary.run_id).dim());
    println!("  Execution: {}", style(summary.execution_id).dim());
    println!("  Event: {}", summary.event);
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{}, {} skipped)",
        style(format!("{:.0}%", summary.progress * 100.0)).cyan(),
        summary.completed_steps,
        summary.total_steps,
        summary.skipped_steps
    );
    if let Some(step) = &summary.failed_step {
        println!("  Failed step: {}", style(step).red());
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
