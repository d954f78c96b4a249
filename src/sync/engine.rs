// src/sync/engine.rs

//! The progressive sync state machine
//!
//! ```text
//!            ┌──────────── retry (< MAX_RETRIES) ─────────────┐
//!            ▼                                                │
//!      Installing ──fail──▶ ClassifyingFailure ──optional──▶ RemovingGroup
//!            │                      │                         │
//!         success          required / unknown          budget spent
//!            ▼                      ▼                         ▼
//!        Succeeded             FatalFailure ◀─────────────────┘
//! ```
//!
//! One group is removed per failed attempt. A single sync may hide several
//! broken groups behind the first one uv reports, so each retry re-resolves
//! against the reduced set instead of trusting the earlier diagnosis.
//!
//! [`ProgressiveSyncEngine::run`] installs the base set only. The groups that
//! survive are installed afterwards by
//! [`ProgressiveSyncEngine::install_groups`], which runs the same loop with
//! default groups included and its own retry budget.
//! [`ProgressiveSyncEngine::sync_environment`] does both.

use super::classifier::{Classification, FailureClassifier};
use super::groups::DependencyGroups;
use super::invoker::SyncInvoker;
use super::lockfile::LockfileStore;
use super::result::SyncResult;
use super::{SyncError, SyncFailure};
use tracing::{debug, info, warn};

/// Maximum number of optional-group removals before giving up
pub const MAX_RETRIES: usize = 10;

/// Knobs for a sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Install only the mandatory dependency set on every attempt
    pub exclude_default_groups: bool,
    /// Retry budget; the session fails once this many groups were dropped
    pub max_retries: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            exclude_default_groups: true,
            max_retries: MAX_RETRIES,
        }
    }
}

/// States of the sync state machine
#[derive(Debug)]
pub enum SyncState {
    Installing,
    ClassifyingFailure(SyncFailure),
    RemovingGroup { name: String, failure: SyncFailure },
    Succeeded,
    FatalFailure(SyncError),
}

impl SyncState {
    fn label(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::ClassifyingFailure(_) => "classifying-failure",
            Self::RemovingGroup { .. } => "removing-group",
            Self::Succeeded => "succeeded",
            Self::FatalFailure(_) => "fatal-failure",
        }
    }
}

/// One pass through the `Installing` state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAttempt {
    /// 1-based
    pub number: usize,
    pub exclude_default_groups: bool,
}

/// Drives repeated syncs, dropping optional groups that break resolution
///
/// The engine owns its collaborators for the length of a session. Tests
/// substitute in-memory fakes for both.
pub struct ProgressiveSyncEngine<I, L> {
    invoker: I,
    lockfile: L,
    classifier: FailureClassifier,
    options: SyncOptions,
}

impl<I: SyncInvoker, L: LockfileStore> ProgressiveSyncEngine<I, L> {
    pub fn new(invoker: I, lockfile: L) -> Self {
        Self {
            invoker,
            lockfile,
            classifier: FailureClassifier::new(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    pub fn lockfile(&self) -> &L {
        &self.lockfile
    }

    pub fn into_parts(self) -> (I, L) {
        (self.invoker, self.lockfile)
    }

    /// Run a sync session
    ///
    /// Mutates `groups` (dropped optional groups are removed) and `result`,
    /// and hands `result` back on success. With `dry_run` nothing is invoked
    /// and the result is returned untouched.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Failure`] with the original failure when it cannot be
    ///   blamed on an optional group
    /// - [`SyncError::RetryExhausted`] when the retry budget runs out
    /// - [`SyncError::Lockfile`] / [`SyncError::GroupRemoval`] when a
    ///   collaborator cannot apply a removal
    pub fn run<'r, G>(
        &mut self,
        groups: &mut G,
        result: &'r mut SyncResult,
        dry_run: bool,
    ) -> Result<&'r mut SyncResult, SyncError>
    where
        G: DependencyGroups + ?Sized,
    {
        if dry_run {
            info!(
                "Dry run: would sync with {} dependency group(s), skipping",
                groups.group_set().len()
            );
            return Ok(result);
        }
        let exclude_default_groups = self.options.exclude_default_groups;
        self.drive(groups, result, exclude_default_groups)
    }

    /// Install the dependency groups left after a successful [`run`](Self::run)
    ///
    /// A group that resolved but fails once it is actually installed is
    /// dropped like in the base sync when optional. Nothing happens on a dry
    /// run, when the base sync already included the groups, or when no
    /// groups are left.
    pub fn install_groups<'r, G>(
        &mut self,
        groups: &mut G,
        result: &'r mut SyncResult,
        dry_run: bool,
    ) -> Result<&'r mut SyncResult, SyncError>
    where
        G: DependencyGroups + ?Sized,
    {
        if dry_run || result.groups_synced {
            return Ok(result);
        }
        if groups.group_set().is_empty() {
            result.groups_synced = true;
            return Ok(result);
        }
        info!(
            "Installing {} remaining dependency group(s)",
            groups.group_set().len()
        );
        self.drive(groups, result, false)
    }

    /// Base sync followed by installation of the surviving groups
    pub fn sync_environment<'r, G>(
        &mut self,
        groups: &mut G,
        result: &'r mut SyncResult,
        dry_run: bool,
    ) -> Result<&'r mut SyncResult, SyncError>
    where
        G: DependencyGroups + ?Sized,
    {
        self.run(groups, &mut *result, dry_run)?;
        self.install_groups(groups, result, dry_run)
    }

    fn drive<'r, G>(
        &mut self,
        groups: &mut G,
        result: &'r mut SyncResult,
        exclude_default_groups: bool,
    ) -> Result<&'r mut SyncResult, SyncError>
    where
        G: DependencyGroups + ?Sized,
    {
        let mut removed = 0usize;
        let mut state = SyncState::Installing;

        loop {
            debug!("Sync state: {}", state.label());
            state = match state {
                SyncState::Installing => {
                    let attempt = SyncAttempt {
                        number: removed + 1,
                        exclude_default_groups,
                    };
                    info!(
                        "Sync attempt {} ({} dependency group(s) remaining)",
                        attempt.number,
                        groups.group_set().len()
                    );
                    match self.invoker.sync(attempt.exclude_default_groups) {
                        Ok(()) => SyncState::Succeeded,
                        Err(failure) => {
                            debug!("Sync attempt {} failed", attempt.number);
                            SyncState::ClassifyingFailure(failure)
                        }
                    }
                }

                SyncState::ClassifyingFailure(failure) => {
                    match self
                        .classifier
                        .classify(&failure.diagnostic, groups.group_set())
                    {
                        Classification::OptionalGroupFailure(name) => {
                            SyncState::RemovingGroup { name, failure }
                        }
                        Classification::RequiredGroupFailure(name) => {
                            warn!("Required dependency group '{}' failed to sync", name);
                            SyncState::FatalFailure(SyncError::Failure(failure))
                        }
                        Classification::NoGroupIdentified => {
                            warn!("Sync failed and no dependency group could be blamed");
                            SyncState::FatalFailure(SyncError::Failure(failure))
                        }
                    }
                }

                SyncState::RemovingGroup { name, failure } => {
                    let reason = self
                        .classifier
                        .reason_line(&failure.diagnostic)
                        .unwrap_or(failure.diagnostic.as_str())
                        .to_string();
                    warn!("Dropping optional dependency group '{}': {}", name, reason);

                    groups.remove_group(&name)?;
                    result.record_failed_group(name, failure.diagnostic.clone());

                    if self.lockfile.exists() {
                        debug!("Invalidating lockfile after group removal");
                    }
                    self.lockfile.delete()?;

                    removed += 1;
                    if removed >= self.options.max_retries {
                        SyncState::FatalFailure(SyncError::RetryExhausted {
                            attempts: removed,
                            last: failure,
                        })
                    } else {
                        SyncState::Installing
                    }
                }

                SyncState::Succeeded => {
                    result.packages_synced = true;
                    if !exclude_default_groups {
                        result.groups_synced = true;
                    }
                    let what = if exclude_default_groups {
                        "Base dependencies"
                    } else {
                        "Dependencies and groups"
                    };
                    if result.has_warnings() {
                        info!(
                            "{} synced without optional group(s): {}",
                            what,
                            result.failed_group_names().join(", ")
                        );
                    } else {
                        info!("{} synced", what);
                    }
                    return Ok(result);
                }

                SyncState::FatalFailure(err) => return Err(err),
            };
        }
    }
}
