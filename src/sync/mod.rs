// src/sync/mod.rs

//! Progressive dependency sync
//!
//! Recreating an environment on a new machine means asking the package
//! manager to resolve and install a project's dependencies. Hardware
//! acceleration extras (CUDA kernels, xformers, TensorRT, ...) routinely fail
//! to resolve on machines they were not built for, and a single failing extra
//! would otherwise sink the whole environment.
//!
//! The [`ProgressiveSyncEngine`] installs the base dependency set and, when
//! the package manager's diagnostic blames an optional dependency group,
//! drops that group, invalidates the lockfile and tries again. Required
//! groups and unattributable failures are never retried.
//!
//! # Pieces
//!
//! - [`DependencyGroupSet`]: the live set of named groups
//! - [`FailureClassifier`]: maps diagnostic text to a [`Classification`]
//! - [`SyncInvoker`]: one package-manager sync ([`UvSyncInvoker`] for `uv`)
//! - [`LockfileStore`]: the resolution cache ([`FsLockfileStore`] for `uv.lock`)
//! - [`SyncResult`]: what succeeded, what was dropped and why

mod classifier;
mod engine;
mod groups;
mod invoker;
mod lockfile;
mod result;

pub use classifier::{Classification, FailureClassifier, GROUP_MARKER_PATTERN};
pub use engine::{ProgressiveSyncEngine, SyncAttempt, SyncOptions, SyncState, MAX_RETRIES};
pub use groups::{normalize_group_name, DependencyGroup, DependencyGroupSet, DependencyGroups};
pub use invoker::{SyncInvoker, UvSyncInvoker};
pub use lockfile::{FsLockfileStore, LockfileStore, UV_LOCKFILE_NAME};
pub use result::{FailedGroup, SyncResult};

use thiserror::Error;

/// A single failed package-manager sync
///
/// Carries the diagnostic text the package manager printed. The text is
/// what the [`FailureClassifier`] inspects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency sync failed: {diagnostic}")]
pub struct SyncFailure {
    pub diagnostic: String,
}

impl SyncFailure {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }
}

/// Errors raised by the progressive sync engine and its collaborators
#[derive(Error, Debug)]
pub enum SyncError {
    /// The package manager failed and the failure could not be attributed
    /// to a removable optional group
    #[error(transparent)]
    Failure(#[from] SyncFailure),

    /// Every attempt failed on an optional group until the retry budget ran out
    #[error("dependency sync gave up after {attempts} attempts")]
    RetryExhausted { attempts: usize, last: SyncFailure },

    /// The lockfile could not be invalidated
    #[error("failed to invalidate lockfile: {0}")]
    Lockfile(String),

    /// A dependency group could not be removed from the project
    #[error("failed to remove dependency group '{name}': {reason}")]
    GroupRemoval { name: String, reason: String },

    /// Two groups with the same name were added to one set
    #[error("duplicate dependency group: {0}")]
    DuplicateGroup(String),
}
