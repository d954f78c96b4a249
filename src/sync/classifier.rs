// src/sync/classifier.rs

//! Failure classification
//!
//! When a sync fails, uv explains the resolution conflict in terms of the
//! requirement chain that led to it. Requirements that come from a dependency
//! group are printed as `<project>:<group> depends on <package>`, e.g.
//!
//! ```text
//!   × No solution found when resolving dependencies:
//!   ╰─▶ Because flash-attn==2.6.3 has no wheels with a matching platform tag
//!       and comfyui-env:optional-cuda depends on flash-attn==2.6.3, we can
//!       conclude that comfyui-env:optional-cuda's requirements are unsatisfiable.
//! ```
//!
//! The first such marker names the group to blame. The exact wording depends
//! on the uv version, so the pattern can be overridden from configuration.

use super::groups::DependencyGroupSet;
use crate::error::{Error, Result};
use regex::Regex;
use tracing::debug;

/// Default marker grammar: `<project>:<group> depends on <package>`
///
/// uv wraps diagnostics at the terminal width, so any run of whitespace
/// (including a line break) may separate the tokens. Must define the named
/// capture `group`; `project` and `package` are informational.
pub const GROUP_MARKER_PATTERN: &str = r"(?P<project>[A-Za-z0-9][A-Za-z0-9._-]*):(?P<group>[A-Za-z0-9][A-Za-z0-9._-]*)\s+depends\s+on\s+(?P<package>\S+)";

/// Which dependency group, if any, a failed sync is attributable to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The diagnostic does not reference a group in the current set
    NoGroupIdentified,
    /// The failure traces to a group that must not be dropped
    RequiredGroupFailure(String),
    /// The failure traces to a group that may be dropped
    OptionalGroupFailure(String),
}

impl Classification {
    /// Name of the blamed group, if any
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::NoGroupIdentified => None,
            Self::RequiredGroupFailure(name) | Self::OptionalGroupFailure(name) => Some(name),
        }
    }

    pub fn is_removable(&self) -> bool {
        matches!(self, Self::OptionalGroupFailure(_))
    }
}

/// Maps package-manager diagnostics to a [`Classification`]
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    marker: Regex,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureClassifier {
    /// Classifier using [`GROUP_MARKER_PATTERN`]
    pub fn new() -> Self {
        Self {
            marker: Regex::new(GROUP_MARKER_PATTERN).expect("built-in marker pattern compiles"),
        }
    }

    /// Classifier with a custom marker grammar
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let marker = Regex::new(pattern)
            .map_err(|e| Error::ConfigError(format!("invalid group marker pattern: {e}")))?;
        if !marker.capture_names().any(|n| n == Some("group")) {
            return Err(Error::ConfigError(
                "group marker pattern must define a `group` capture".to_string(),
            ));
        }
        Ok(Self { marker })
    }

    /// Classify a diagnostic against the current group set
    ///
    /// Only the first marker in the text counts. If it names a group that is
    /// no longer in `groups`, the failure is not attributed to any group.
    pub fn classify(&self, diagnostic: &str, groups: &DependencyGroupSet) -> Classification {
        let Some(caps) = self.marker.captures(diagnostic) else {
            debug!("No dependency group marker in diagnostic");
            return Classification::NoGroupIdentified;
        };
        let Some(mention) = caps.name("group") else {
            return Classification::NoGroupIdentified;
        };

        match groups.get(mention.as_str()) {
            Some(group) if group.optional => {
                debug!("Diagnostic blames optional group '{}'", group.name);
                Classification::OptionalGroupFailure(group.name.clone())
            }
            Some(group) => {
                debug!("Diagnostic blames required group '{}'", group.name);
                Classification::RequiredGroupFailure(group.name.clone())
            }
            None => {
                debug!(
                    "Diagnostic names group '{}' which is not in the current set",
                    mention.as_str()
                );
                Classification::NoGroupIdentified
            }
        }
    }

    /// The line of the diagnostic holding the first marker, trimmed
    ///
    /// A marker wrapped across lines has no single line of its own; the
    /// matched text is returned instead.
    pub fn reason_line<'a>(&self, diagnostic: &'a str) -> Option<&'a str> {
        diagnostic
            .lines()
            .find(|line| self.marker.is_match(line))
            .map(str::trim)
            .or_else(|| self.marker.find(diagnostic).map(|m| m.as_str()))
    }
}
