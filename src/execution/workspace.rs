//! Per-job working directories

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Default parent directory for run workspaces
pub fn default_root() -> PathBuf {
    std::env::temp_dir().join("sdt-ci")
}

/// Directory a single job runs in: `<root>/<run_id>/<label>`
#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Create a fresh, empty workspace. Leftovers from an earlier run
    /// with the same id are removed first.
    pub async fn create(root: &Path, run_id: Uuid, label: &str, keep: bool) -> io::Result<Self> {
        let path = root.join(run_id.to_string()).join(label);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&path).await?;
        debug!("Created workspace {}", path.display());
        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_kept(&self) -> bool {
        self.keep
    }

    /// Remove the workspace unless it is kept
    pub async fn cleanup(&self) -> io::Result<()> {
        if self.keep {
            debug!("Keeping workspace {}", self.path.display());
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Remove the run directory if no job left anything behind
pub async fn remove_run_dir(root: &Path, run_id: Uuid) {
    let dir = root.join(run_id.to_string());
    // Fails while a kept workspace is still inside
    if let Err(e) = tokio::fs::remove_dir(&dir).await {
        if e.kind() != io::ErrorKind::NotFound {
            debug!("Run directory {} not removed: {}", dir.display(), e);
        }
    }
}

/// Remove a workspace, logging instead of failing
pub async fn cleanup_quietly(workspace: &Workspace) {
    if let Err(e) = workspace.cleanup().await {
        warn!("Failed to remove workspace {}: {}", workspace.path().display(), e);
    }
}
