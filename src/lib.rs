// src/lib.rs

//! comfyenv - ComfyUI environment migration
//!
//! Captures an existing ComfyUI installation (Python, CUDA/PyTorch, installed
//! packages, custom nodes) into a portable manifest and recreates an
//! equivalent environment from it on another machine.
//!
//! # Architecture
//!
//! - `detect`: probe an installation and build an [`EnvironmentManifest`]
//! - `manifest`: the portable TOML manifest
//! - `project`: the `pyproject.toml` uv syncs from, with dependency groups
//! - `sync`: the progressive sync engine that drops optional groups which
//!   fail to resolve and retries, bounded by [`MAX_RETRIES`]

pub mod config;
pub mod detect;
mod error;
pub mod manifest;
pub mod process;
pub mod project;
pub mod sync;

pub use config::ToolConfig;
pub use detect::EnvironmentDetector;
pub use error::{Error, Result};
pub use manifest::{CustomNode, EnvironmentManifest, ManifestError, PackageSpec};
pub use project::PyProject;
pub use sync::{
    Classification, DependencyGroup, DependencyGroupSet, DependencyGroups, FailureClassifier,
    FsLockfileStore, LockfileStore, ProgressiveSyncEngine, SyncError, SyncFailure, SyncInvoker,
    SyncOptions, SyncResult, UvSyncInvoker, MAX_RETRIES,
};
