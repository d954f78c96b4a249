// src/sync/invoker.rs

//! Package-manager sync invocation

use super::SyncFailure;
use crate::process::run_with_timeout;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for one `uv sync` (30 minutes; CUDA wheels are large)
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One resolve-and-install pass of the package manager
pub trait SyncInvoker {
    /// Run a sync against the target environment
    ///
    /// With `exclude_default_groups` set only the mandatory dependencies are
    /// installed; groups marked optional or default are skipped.
    fn sync(&mut self, exclude_default_groups: bool) -> Result<(), SyncFailure>;
}

/// Runs `uv sync` in a project directory
#[derive(Debug, Clone)]
pub struct UvSyncInvoker {
    uv: PathBuf,
    project_dir: PathBuf,
    venv: Option<PathBuf>,
    python: Option<String>,
    timeout: Duration,
}

impl UvSyncInvoker {
    pub fn new(uv: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            uv: uv.into(),
            project_dir: project_dir.into(),
            venv: None,
            python: None,
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    /// Install into this virtual environment instead of `<project>/.venv`
    pub fn with_venv(mut self, venv: PathBuf) -> Self {
        self.venv = Some(venv);
        self
    }

    /// Python version or interpreter uv should use
    pub fn with_python(mut self, python: String) -> Self {
        self.python = Some(python);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Arguments passed to uv for one sync
    pub fn args(&self, exclude_default_groups: bool) -> Vec<String> {
        let mut args = vec![
            "sync".to_string(),
            "--project".to_string(),
            self.project_dir.display().to_string(),
        ];
        if exclude_default_groups {
            args.push("--no-default-groups".to_string());
        }
        if let Some(python) = &self.python {
            args.push("--python".to_string());
            args.push(python.clone());
        }
        args
    }
}

impl SyncInvoker for UvSyncInvoker {
    fn sync(&mut self, exclude_default_groups: bool) -> Result<(), SyncFailure> {
        info!(
            "Running uv sync in {} (default groups {})",
            self.project_dir.display(),
            if exclude_default_groups { "excluded" } else { "included" }
        );

        let mut command = Command::new(&self.uv);
        command.args(self.args(exclude_default_groups));
        if let Some(venv) = &self.venv {
            command.env("UV_PROJECT_ENVIRONMENT", venv);
        }

        let output = run_with_timeout(&mut command, self.timeout)
            .map_err(|e| SyncFailure::new(e.to_string()))?;

        for line in output.stdout.lines() {
            debug!("[uv] {}", line);
        }

        if output.timed_out() {
            return Err(SyncFailure::new(format!(
                "uv sync timed out after {} seconds",
                self.timeout.as_secs()
            )));
        }

        if output.success() {
            info!("uv sync completed");
            return Ok(());
        }

        for line in output.stderr.lines() {
            warn!("[uv] {}", line);
        }
        let diagnostic = if output.stderr.trim().is_empty() {
            format!(
                "uv sync failed with exit code {}\n{}",
                output.code(),
                output.stdout
            )
        } else {
            output.stderr
        };
        Err(SyncFailure::new(diagnostic))
    }
}
