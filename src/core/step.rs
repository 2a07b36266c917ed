//! Step domain model

use crate::core::{
    config::{BuiltinAction, StepConfig},
    state::StepState,
};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// What a step executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Shell command template
    Run(String),
    /// Built-in action with its parameters
    Builtin {
        action: BuiltinAction,
        with: BTreeMap<String, String>,
    },
}

/// A single step in a job
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Command or built-in action
    pub action: StepAction,

    /// A failing command does not fail the job
    pub continue_on_error: bool,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Extra environment variables
    pub env: BTreeMap<String, String>,

    /// Parse lint statistics from the output
    pub lint_report: bool,

    /// Runtime state
    pub state: StepState,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        let action = match (&config.run, config.uses) {
            (_, Some(action)) => StepAction::Builtin {
                action,
                with: config.with.clone(),
            },
            (Some(run), None) => StepAction::Run(run.clone()),
            // rejected by validation
            (None, None) => StepAction::Run(String::new()),
        };

        Step {
            id: config.id.clone(),
            name: config.name.clone(),
            action,
            continue_on_error: config.continue_on_error,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            env: config.env.clone(),
            lint_report: config.lint_report,
            state: StepState::Pending,
        }
    }

    /// Render the command line with variable substitution
    pub fn render_command(&self, variables: &HashMap<String, String>) -> String {
        match &self.action {
            StepAction::Run(template) => render_template(template, variables),
            StepAction::Builtin { action, with } => {
                let mut vars = variables.clone();
                for (key, value) in with {
                    vars.insert(format!("with.{}", key), render_template(value, variables));
                }
                render_template(&builtin_template(*action, &vars), &vars)
            }
        }
    }
}

fn builtin_template(action: BuiltinAction, vars: &HashMap<String, String>) -> String {
    let has = |key: &str| vars.get(key).is_some_and(|v| !v.is_empty());

    match action {
        BuiltinAction::Checkout => {
            let source = if has("with.repository") {
                "{{ with.repository }}"
            } else {
                "{{ repository }}"
            };
            let mut command = format!("git clone --quiet {} .", source);
            if has("with.ref") {
                command.push_str(" && git checkout --quiet {{ with.ref }}");
            } else if has("event.sha") {
                command.push_str(" && git checkout --quiet {{ event.sha }}");
            } else if has("event.ref") {
                command.push_str(" && git checkout --quiet {{ event.ref }}");
            }
            command
        }
        BuiltinAction::SetupConda => {
            let name = if has("with.activate-environment") {
                "{{ with.activate-environment }}"
            } else {
                "{{ env.name }}"
            };
            let python = if has("with.python-version") {
                "{{ with.python-version }}"
            } else {
                "{{ env.python_version }}"
            };
            format!("conda create --yes --quiet --name {} python={}", name, python)
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Replace `{{ name }}` placeholders in a single pass.
///
/// Substituted values are never rendered again; unknown names are left as is.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholders that survived rendering
pub fn unresolved_placeholders(rendered: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(rendered)
        .map(|c| c[1].to_string())
        .collect()
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 3600, // 1 hour
        }
    }
}
