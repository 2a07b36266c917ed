//! Runner configuration

use std::collections::BTreeMap;

/// Configuration for the subprocess runner
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Shell used to interpret commands.
    ///
    /// Defaults to `sh` on unix and `cmd` on Windows.
    pub shell: Option<String>,

    /// Environment variables added to every command
    pub extra_env: BTreeMap<String, String>,
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }

    /// Program and leading arguments used to run `command`
    pub fn shell_invocation(&self, command: &str) -> (String, Vec<String>) {
        let shell = self.shell.clone().unwrap_or_else(|| {
            if cfg!(windows) {
                "cmd".to_string()
            } else {
                "sh".to_string()
            }
        });

        let flag = match shell.as_str() {
            "cmd" | "cmd.exe" => "/C",
            "pwsh" | "powershell" => "-Command",
            _ => "-c",
        };

        (shell, vec![flag.to_string(), command.to_string()])
    }
}
