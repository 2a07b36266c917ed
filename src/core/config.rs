//! Workflow configuration from YAML

use crate::core::{
    matrix::{Matrix, MatrixConfig, MatrixInstance},
    trigger::{TriggerConfig, TriggerSet},
    Job,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Variable definition - can be a simple string or a file reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableDefinition {
    /// Simple string value
    String(String),
    /// File reference with validation flag
    File { path: String, validate_exists: bool },
}

impl VariableDefinition {
    /// Get the string representation used in command templates
    pub fn render_value(&self) -> String {
        match self {
            VariableDefinition::String(s) => s.clone(),
            VariableDefinition::File { path, .. } => path.clone(),
        }
    }
}

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Workflow version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Events that activate the workflow
    #[serde(rename = "on", default)]
    pub triggers: TriggerConfig,

    /// Matrix and scheduling policy
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Runtime environment every job provisions
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Global variables available to all steps
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Steps run in order inside every job
    pub steps: Vec<StepConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default, alias = "timeout-secs")]
    pub default_timeout_secs: Option<u64>,
}

/// `strategy:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Cancel sibling jobs once one fails
    #[serde(default = "default_fail_fast", alias = "fail-fast")]
    pub fail_fast: bool,

    /// Upper bound on concurrently running jobs
    #[serde(default, alias = "max-parallel")]
    pub max_parallel: Option<usize>,

    #[serde(default)]
    pub matrix: MatrixConfig,
}

fn default_fail_fast() -> bool {
    true
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            fail_fast: default_fail_fast(),
            max_parallel: None,
            matrix: MatrixConfig::default(),
        }
    }
}

/// `environment:` section describing the provisioned runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Name of the isolated environment
    #[serde(default = "default_environment_name")]
    pub name: String,

    /// Language runtime version
    #[serde(default = "default_python_version", alias = "python-version")]
    pub python_version: String,

    /// Package channel used for every install
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Path of the requirements listing, relative to the checkout
    #[serde(default = "default_requirements")]
    pub requirements: String,

    /// Supplementary packages installed after the requirements
    #[serde(default)]
    pub packages: Vec<String>,
}

fn default_environment_name() -> String {
    "test-environment".to_string()
}

fn default_python_version() -> String {
    "3.9".to_string()
}

fn default_channel() -> String {
    "conda-forge".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: default_environment_name(),
            python_version: default_python_version(),
            channel: default_channel(),
            requirements: default_requirements(),
            packages: Vec::new(),
        }
    }
}

/// Built-in actions a step can use instead of `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinAction {
    /// Clone the repository into the job workspace at the event revision
    Checkout,
    /// Create the named conda environment with the configured Python
    SetupConda,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    pub name: String,

    /// Optional step description
    #[serde(default)]
    pub description: Option<String>,

    /// Shell command template
    #[serde(default)]
    pub run: Option<String>,

    /// Built-in action
    #[serde(default)]
    pub uses: Option<BuiltinAction>,

    /// Parameters for the built-in action
    #[serde(default, rename = "with")]
    pub with: BTreeMap<String, String>,

    /// Failure of this step never fails the job
    #[serde(default, alias = "continue-on-error")]
    pub continue_on_error: bool,

    /// Timeout for this step (overrides global)
    #[serde(default, alias = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    /// Extra environment variables for the command
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Parse flake8 statistics from the output and report the findings
    #[serde(default, alias = "lint-report")]
    pub lint_report: bool,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded sdt-python workflow
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(crate::builtin::SDT_PYTHON_WORKFLOW)
            .context("Built-in workflow is invalid")
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            anyhow::bail!("Workflow '{}' has no steps", self.name);
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }

            match (&step.run, &step.uses) {
                (Some(_), Some(_)) => anyhow::bail!(
                    "Step '{}' sets both 'run' and 'uses'",
                    step.id
                ),
                (None, None) => anyhow::bail!(
                    "Step '{}' needs either 'run' or 'uses'",
                    step.id
                ),
                (Some(run), None) if run.trim().is_empty() => {
                    anyhow::bail!("Step '{}' has an empty command", step.id)
                }
                _ => {}
            }

            if step.timeout_secs == Some(0) {
                anyhow::bail!("Step '{}' has a zero timeout", step.id);
            }
        }

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("default_timeout_secs must be greater than zero");
        }

        if self.strategy.max_parallel == Some(0) {
            anyhow::bail!("strategy.max_parallel must be greater than zero");
        }

        if self.environment.name.trim().is_empty() {
            anyhow::bail!("environment.name must not be empty");
        }

        self.trigger_set()?;
        self.matrix()?;

        // Validate file existence for variables with validate_exists: true
        for (var_name, var_def) in self.get_variables() {
            if let VariableDefinition::File { path, validate_exists } = &var_def {
                if *validate_exists && !Path::new(path).exists() {
                    anyhow::bail!(
                        "Variable '{}' references file that doesn't exist: {}",
                        var_name,
                        path
                    );
                }
            }
        }

        Ok(())
    }

    /// Parsed trigger set
    pub fn trigger_set(&self) -> Result<TriggerSet> {
        TriggerSet::from_config(&self.triggers)
    }

    /// Parsed matrix
    pub fn matrix(&self) -> Result<Matrix> {
        Matrix::from_config(&self.strategy.matrix)
    }

    /// Get variables as parsed VariableDefinition enum
    pub fn get_variables(&self) -> HashMap<String, VariableDefinition> {
        let mut vars = HashMap::new();

        for (key, value) in &self.variables {
            let var_def = match value {
                Value::String(s) => VariableDefinition::String(s.clone()),
                Value::Number(n) => VariableDefinition::String(n.to_string()),
                Value::Bool(b) => VariableDefinition::String(b.to_string()),
                Value::Mapping(map) => {
                    // { path: "...", validate_exists: true/false }
                    let path = map
                        .get(&Value::String("path".to_string()))
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();

                    let validate_exists = map
                        .get(&Value::String("validate_exists".to_string()))
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);

                    VariableDefinition::File { path, validate_exists }
                }
                _ => VariableDefinition::String(
                    serde_yaml::to_string(value)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                ),
            };
            vars.insert(key.clone(), var_def);
        }

        vars
    }

    /// Get variables as string map
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        self.get_variables()
            .iter()
            .map(|(k, v)| (k.clone(), v.render_value()))
            .collect()
    }

    /// Build the job for one matrix instance
    pub fn to_job(&self, instance: &MatrixInstance) -> Job {
        Job::from_config(self, instance)
    }
}
