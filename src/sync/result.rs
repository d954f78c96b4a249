// src/sync/result.rs

//! Outcome of a progressive sync session

use serde::{Deserialize, Serialize};
use std::fmt;

/// An optional group the engine dropped, with the diagnostic that blamed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedGroup {
    pub name: String,
    pub reason: String,
}

/// Accumulated result of one sync session
///
/// Created empty by the caller and filled in by the engine. Even a successful
/// sync may carry dropped groups, which callers should surface as warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Whether the mandatory dependency set installed
    pub packages_synced: bool,
    /// Whether the dependency groups left after any removals installed too
    #[serde(default)]
    pub groups_synced: bool,
    /// Dropped optional groups, in the order they were discovered
    pub dependency_groups_failed: Vec<FailedGroup>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failed_group(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.dependency_groups_failed.push(FailedGroup {
            name: name.into(),
            reason: reason.into(),
        });
    }

    pub fn failed_group_names(&self) -> Vec<&str> {
        self.dependency_groups_failed
            .iter()
            .map(|g| g.name.as_str())
            .collect()
    }

    /// True when the environment works but lost optional features
    pub fn has_warnings(&self) -> bool {
        !self.dependency_groups_failed.is_empty()
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.packages_synced {
            "synced"
        } else {
            "not synced"
        };
        write!(f, "packages {status}")?;
        if self.packages_synced && !self.groups_synced {
            write!(f, " (dependency groups not installed)")?;
        }
        if !self.dependency_groups_failed.is_empty() {
            write!(
                f,
                ", dropped optional groups: {}",
                self.failed_group_names().join(", ")
            )?;
        }
        Ok(())
    }
}
