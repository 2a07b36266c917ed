//! Terminal rendering of execution events
//!
//! [`TerminalOutput`] turns the events of a run into console lines. Lines
//! go through the progress bar when one is attached so the bar stays at
//! the bottom of the terminal. Streamed step output is prefixed with the
//! matrix label, since jobs of different operating systems interleave:
//!
//! ```text
//! [ubuntu-latest] collected 212 items
//! [windows-latest] Solving environment: done
//! ```

use crate::cli::output::{format_execution_event, style};
use crate::execution::ExecutionEvent;
use crate::runner::OutputStream;
use indicatif::ProgressBar;

/// Prints execution events as they arrive
#[derive(Clone)]
pub struct TerminalOutput {
    stream: bool,
    progress: Option<ProgressBar>,
}

impl TerminalOutput {
    /// `stream` enables live step output
    pub fn new(stream: bool) -> Self {
        Self {
            stream,
            progress: None,
        }
    }

    /// Route lines through `progress` and advance it per finished job
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Render one event
    pub fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::StepOutput {
                job, stream, line, ..
            } => {
                if self.stream {
                    self.print(&format_stream_line(job, *stream, line));
                }
            }
            ExecutionEvent::RunStarted { .. } if self.stream => {
                if let Some(line) = format_execution_event(event) {
                    self.print(&line);
                }
                self.print_separator();
            }
            ExecutionEvent::JobCompleted { job, .. } => {
                if let Some(line) = format_execution_event(event) {
                    self.print(&line);
                }
                if let Some(progress) = &self.progress {
                    progress.inc(1);
                    progress.set_message(format!("{} done", job));
                }
            }
            ExecutionEvent::RunCompleted { .. } => {
                if let Some(progress) = &self.progress {
                    progress.finish_and_clear();
                }
                if let Some(line) = format_execution_event(event) {
                    self.print(&line);
                }
            }
            _ => {
                if let Some(line) = format_execution_event(event) {
                    self.print(&line);
                }
            }
        }
    }

    fn print(&self, line: &str) {
        match &self.progress {
            Some(progress) if !progress.is_finished() => progress.println(line),
            _ => println!("{}", line),
        }
    }

    /// A horizontal rule spanning the terminal width
    pub fn print_separator(&self) {
        self.print(&separator());
    }
}

/// Horizontal rule as wide as the terminal (80 columns when unknown)
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width)
}

/// Prefix a streamed line with its job label
pub fn format_stream_line(job: &str, stream: OutputStream, line: &str) -> String {
    let label = format!("[{}]", job);
    match stream {
        OutputStream::Stdout => format!("{} {}", style(label).dim(), line),
        OutputStream::Stderr => format!("{} {}", style(label).dim(), style(line).yellow()),
    }
}
