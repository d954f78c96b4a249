// src/sync/lockfile.rs

//! Resolution cache (lockfile) handling
//!
//! The package manager writes a lockfile with the exact resolution it last
//! produced. After a dependency group is dropped that snapshot is stale, so
//! the sync engine deletes it and forces a fresh resolve. The engine never
//! writes a lockfile itself.

use super::SyncError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lockfile name uv uses next to `pyproject.toml`
pub const UV_LOCKFILE_NAME: &str = "uv.lock";

/// Access to the package manager's resolution cache
pub trait LockfileStore {
    fn exists(&self) -> bool;

    /// Delete the lockfile; a missing lockfile is not an error
    fn delete(&mut self) -> Result<(), SyncError>;
}

/// Lockfile on the local filesystem
#[derive(Debug, Clone)]
pub struct FsLockfileStore {
    path: PathBuf,
}

impl FsLockfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `uv.lock` inside a project directory
    pub fn for_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join(UV_LOCKFILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LockfileStore for FsLockfileStore {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn delete(&mut self) -> Result<(), SyncError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed lockfile {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Lockfile(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
