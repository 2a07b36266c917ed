//! Operating-system matrix and its expansion into job instances

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating-system family a matrix entry targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingSystem {
    Linux,
    MacOs,
    Windows,
}

impl OperatingSystem {
    /// Resolve a runner label such as `ubuntu-latest` or `windows-2022`
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_ascii_lowercase();
        let family = label.split('-').next().unwrap_or_default();
        match family {
            "ubuntu" | "linux" => Some(OperatingSystem::Linux),
            "macos" | "osx" => Some(OperatingSystem::MacOs),
            "windows" | "win" => Some(OperatingSystem::Windows),
            _ => None,
        }
    }

    /// Value exported as `RUNNER_OS`
    pub fn runner_os(&self) -> &'static str {
        match self {
            OperatingSystem::Linux => "Linux",
            OperatingSystem::MacOs => "macOS",
            OperatingSystem::Windows => "Windows",
        }
    }

    /// Family of the machine this process runs on
    pub fn host() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(OperatingSystem::Linux)
        } else if cfg!(target_os = "macos") {
            Some(OperatingSystem::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(OperatingSystem::Windows)
        } else {
            None
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.runner_os())
    }
}

/// `strategy.matrix` as written in YAML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Runner labels, one job instance each
    #[serde(default)]
    pub os: Vec<String>,
}

/// One expanded matrix entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixInstance {
    /// Position in the matrix
    pub index: usize,

    /// Runner label as configured (`ubuntu-latest`)
    pub label: String,

    /// Resolved family
    pub os: OperatingSystem,
}

/// Validated, ordered matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    instances: Vec<MatrixInstance>,
}

impl Matrix {
    pub fn from_config(config: &MatrixConfig) -> anyhow::Result<Self> {
        if config.os.is_empty() {
            anyhow::bail!("Matrix must list at least one operating system");
        }

        let mut instances: Vec<MatrixInstance> = Vec::with_capacity(config.os.len());
        for (index, label) in config.os.iter().enumerate() {
            let os = OperatingSystem::from_label(label)
                .ok_or_else(|| anyhow::anyhow!("Unknown operating system '{}' in matrix", label))?;
            if instances.iter().any(|i| i.label == *label) {
                anyhow::bail!("Operating system '{}' listed twice in matrix", label);
            }
            instances.push(MatrixInstance {
                index,
                label: label.clone(),
                os,
            });
        }

        Ok(Self { instances })
    }

    /// Expanded instances in declaration order
    pub fn expand(&self) -> &[MatrixInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Keep only the listed labels (or families); errors if nothing is left
    pub fn restrict(&self, selection: &[String]) -> anyhow::Result<Self> {
        if selection.is_empty() {
            return Ok(self.clone());
        }

        let instances: Vec<MatrixInstance> = self
            .instances
            .iter()
            .filter(|instance| {
                selection.iter().any(|wanted| {
                    *wanted == instance.label
                        || OperatingSystem::from_label(wanted) == Some(instance.os)
                })
            })
            .cloned()
            .collect();

        if instances.is_empty() {
            anyhow::bail!("No matrix entry matches {:?}", selection);
        }

        Ok(Self { instances })
    }
}
