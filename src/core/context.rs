//! Job context - variables and outputs visible to a running step

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Execution context for one job
///
/// Holds the template variables, the outputs of finished steps and the
/// process environment every command of the job inherits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobContext {
    /// Global, environment, matrix and event variables
    pub variables: HashMap<String, String>,

    /// Outputs from completed steps (step_id -> output)
    pub step_outputs: HashMap<String, String>,

    /// The current step being executed (if any)
    pub current_step_id: Option<String>,

    /// Working directory of the job
    pub workspace: Option<PathBuf>,

    /// Environment variables exported to every command
    pub env: BTreeMap<String, String>,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn set_step_output(&mut self, step_id: &str, output: String) {
        self.step_outputs.insert(step_id.to_string(), output);
    }

    pub fn get_step_output(&self, step_id: &str) -> Option<&String> {
        self.step_outputs.get(step_id)
    }

    /// Get all variables available for command rendering
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();

        for (step_id, output) in &self.step_outputs {
            vars.insert(format!("steps.{}.output", step_id), output.trim().to_string());
        }

        if let Some(ref current_step) = self.current_step_id {
            vars.insert("current_step".to_string(), current_step.clone());
        }

        if let Some(ref workspace) = self.workspace {
            vars.insert("workspace".to_string(), workspace.display().to_string());
        }

        vars
    }
}
