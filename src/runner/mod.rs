//! Command runners - the seam between the engine and the processes it starts

pub mod config;
pub mod output;
pub mod streaming;
pub mod subprocess;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use config::RunnerConfig;
pub use output::{CommandOutput, OutputStream, RunnerError};
pub use streaming::OutputCallback;
pub use subprocess::SubprocessRunner;

/// A fully rendered command ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Step the command belongs to
    pub step_id: String,

    /// Rendered command line
    pub command: String,

    /// Directory to run in
    pub working_dir: Option<PathBuf>,

    /// Environment variables for the process
    pub env: BTreeMap<String, String>,
}

impl CommandInvocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            step_id: String::new(),
            command: command.into(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = step_id.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, streaming lines to `callback`.
    ///
    /// A non-zero exit code is not an error; errors mean the command
    /// could not be run at all.
    async fn run(
        &self,
        invocation: &CommandInvocation,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError>;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<R> {
    async fn run(
        &self,
        invocation: &CommandInvocation,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        (**self).run(invocation, callback).await
    }
}
