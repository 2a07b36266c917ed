//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Matrix CI runner for the sdt-python workflow
#[derive(Debug, Parser, Clone)]
#[command(name = "sdt-ci")]
#[command(version)]
#[command(about = "Run a matrix CI workflow locally", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (and full details in `history`)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Stream step output live
    #[arg(short, long, global = true)]
    pub stream: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow
    Run(RunCommand),

    /// Validate a workflow configuration
    Validate(ValidateCommand),

    /// Show the trigger decision and the jobs of a run without executing
    Plan(PlanCommand),

    /// List workflows in history
    List(ListCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
