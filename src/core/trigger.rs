//! Trigger events and the decision whether a workflow runs for them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of repository event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Code pushed to a branch
    Push,
    /// Pull request opened or updated
    PullRequest,
    /// Manually dispatched run
    WorkflowDispatch,
    /// Scheduled run
    Schedule,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Push,
        EventKind::PullRequest,
        EventKind::WorkflowDispatch,
        EventKind::Schedule,
    ];

    /// Name as written in workflow files
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::WorkflowDispatch => "workflow_dispatch",
            EventKind::Schedule => "schedule",
        }
    }

    /// Parse a workflow-file event name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete event delivered to the runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,

    /// Branch the event refers to (`main` or `refs/heads/main`)
    pub git_ref: Option<String>,

    /// Revision to check out
    pub sha: Option<String>,
}

impl TriggerEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            git_ref: None,
            sha: None,
        }
    }

    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    /// Branch name with any `refs/heads/` prefix removed
    pub fn branch(&self) -> Option<&str> {
        self.git_ref
            .as_deref()
            .map(|r| r.strip_prefix("refs/heads/").unwrap_or(r))
    }
}

/// Per-event filter as written under `on.<event>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Branch patterns; empty means every branch
    #[serde(default)]
    pub branches: Vec<String>,
}

impl EventFilter {
    fn accepts(&self, event: &TriggerEvent) -> bool {
        if self.branches.is_empty() {
            return true;
        }
        match event.branch() {
            Some(branch) => self.branches.iter().any(|p| branch_matches(p, branch)),
            None => false,
        }
    }
}

fn branch_matches(pattern: &str, branch: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => branch.starts_with(prefix),
        None => pattern == branch,
    }
}

/// The `on:` section as it appears in YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerConfig {
    /// `on: push`
    Single(String),
    /// `on: [push, pull_request]`
    List(Vec<String>),
    /// `on: { push: { branches: [main] }, pull_request: }`
    Map(BTreeMap<String, Option<EventFilter>>),
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig::List(Vec::new())
    }
}

/// Validated set of events a workflow subscribes to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    entries: Vec<(EventKind, EventFilter)>,
}

impl TriggerSet {
    /// Build from the YAML form, rejecting unknown event names
    pub fn from_config(config: &TriggerConfig) -> anyhow::Result<Self> {
        let named: Vec<(String, EventFilter)> = match config {
            TriggerConfig::Single(name) => vec![(name.clone(), EventFilter::default())],
            TriggerConfig::List(names) => names
                .iter()
                .map(|n| (n.clone(), EventFilter::default()))
                .collect(),
            TriggerConfig::Map(map) => map
                .iter()
                .map(|(n, f)| (n.clone(), f.clone().unwrap_or_default()))
                .collect(),
        };

        let mut entries = Vec::with_capacity(named.len());
        for (name, filter) in named {
            let kind = EventKind::parse(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown trigger event '{}'", name))?;
            if entries.iter().any(|(k, _)| *k == kind) {
                anyhow::bail!("Trigger event '{}' listed twice", name);
            }
            entries.push((kind, filter));
        }

        Ok(Self { entries })
    }

    /// Event kinds in declaration order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    /// Whether the event activates the workflow
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        self.entries
            .iter()
            .any(|(kind, filter)| *kind == event.kind && filter.accepts(event))
    }
}
