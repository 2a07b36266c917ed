//! Subprocess runner - executes commands through the platform shell

use crate::runner::{
    CommandInvocation, CommandOutput, CommandRunner, OutputCallback, OutputStream, RunnerConfig,
    RunnerError,
};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs each command as a shell subprocess
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    config: RunnerConfig,
}

impl SubprocessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

#[async_trait]
impl CommandRunner for SubprocessRunner {
    /// Run the command and capture its output.
    ///
    /// The child is killed when the returned future is dropped, so an
    /// outer `tokio::time::timeout` terminates it.
    async fn run(
        &self,
        invocation: &CommandInvocation,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        let (program, args) = self.config.shell_invocation(&invocation.command);
        debug!("Spawning {} {:?}", program, args);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(&self.config.extra_env)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Internal("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Internal("stderr was not captured".to_string()))?;

        let (stdout, stderr) = tokio::try_join!(
            read_lines(stdout, OutputStream::Stdout, callback),
            read_lines(stderr, OutputStream::Stderr, callback),
        )?;

        let status = child.wait().await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if !status.success() {
            warn!(
                "Command exited with {:?}: {}",
                status.code(),
                invocation.command
            );
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code: status.code(),
            duration_ms,
        })
    }
}

async fn read_lines<R>(
    reader: R,
    stream: OutputStream,
    callback: Option<&dyn OutputCallback>,
) -> Result<String, RunnerError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut captured = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(cb) = callback {
            cb.on_line(stream, line);
        }
        captured.push_str(line);
        captured.push('\n');
    }

    Ok(captured)
}
