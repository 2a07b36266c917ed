//! Command output and runner error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which stream a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Result of one finished command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured stdout
    pub stdout: String,

    /// Captured stderr
    pub stderr: String,

    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(exit_code),
            duration_ms: 0,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, as kept in the step log
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}{}", self.stdout, self.stderr)
        }
    }
}
