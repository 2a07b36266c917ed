//! Parsing of flake8 findings from step output

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Findings reported by a lint step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    /// Total number of findings
    pub total: usize,

    /// Findings per error code (`E501`, `F821`, ...)
    pub by_code: BTreeMap<String, usize>,
}

fn violation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.+?:\d+:\d+: ([A-Z]+\d+) ").expect("violation regex is valid")
    })
}

fn statistics_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s+([A-Z]+\d+) ").expect("statistics regex is valid"))
}

impl LintReport {
    /// Parse output of `flake8 --count --statistics`.
    ///
    /// Statistics lines take precedence over individual violation lines;
    /// a trailing bare number (from `--count`) sets the total.
    pub fn parse(output: &str) -> Self {
        let mut from_violations: BTreeMap<String, usize> = BTreeMap::new();
        let mut from_statistics: BTreeMap<String, usize> = BTreeMap::new();
        let mut count_line: Option<usize> = None;

        for line in output.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if let Some(caps) = statistics_regex().captures(line) {
                let n: usize = caps[1].parse().unwrap_or(0);
                *from_statistics.entry(caps[2].to_string()).or_default() += n;
            } else if let Some(caps) = violation_regex().captures(line) {
                *from_violations.entry(caps[1].to_string()).or_default() += 1;
            } else if let Ok(n) = line.parse::<usize>() {
                count_line = Some(n);
            }
        }

        let by_code = if from_statistics.is_empty() {
            from_violations
        } else {
            from_statistics
        };
        let total = count_line.unwrap_or_else(|| by_code.values().sum());

        Self { total, by_code }
    }

    pub fn is_clean(&self) -> bool {
        self.total == 0
    }

    /// One-line summary such as `3 findings (E501: 2, F821: 1)`
    pub fn summary(&self) -> String {
        if self.by_code.is_empty() {
            return format!("{} findings", self.total);
        }
        let codes: Vec<String> = self
            .by_code
            .iter()
            .map(|(code, n)| format!("{}: {}", code, n))
            .collect();
        format!("{} findings ({})", self.total, codes.join(", "))
    }
}
