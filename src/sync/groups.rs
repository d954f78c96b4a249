// src/sync/groups.rs

//! Dependency groups and the live group set

use super::SyncError;
use serde::{Deserialize, Serialize};

/// Prefix that marks a group as optional by naming convention
pub const OPTIONAL_PREFIX: &str = "optional-";

/// A named, separately toggleable subset of a project's dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGroup {
    pub name: String,
    /// Only optional groups may be dropped by the sync engine
    pub optional: bool,
    /// Package specifiers in declaration order
    pub packages: Vec<String>,
}

impl DependencyGroup {
    pub fn new(name: impl Into<String>, optional: bool, packages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            optional,
            packages,
        }
    }

    pub fn required(name: impl Into<String>, packages: Vec<String>) -> Self {
        Self::new(name, false, packages)
    }

    pub fn optional(name: impl Into<String>, packages: Vec<String>) -> Self {
        Self::new(name, true, packages)
    }

    /// Whether the name follows the `optional-*` convention
    pub fn has_optional_name(name: &str) -> bool {
        normalize_group_name(name).starts_with(OPTIONAL_PREFIX)
    }
}

/// Normalize a group name the way Python packaging tools print it
///
/// Lowercases and collapses runs of `-`, `_` and `.` into a single `-`.
pub fn normalize_group_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    out
}

/// The dependency groups of one project
///
/// Keeps declaration order. Names are unique after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGroupSet {
    groups: Vec<DependencyGroup>,
}

impl DependencyGroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from groups, rejecting duplicate names
    pub fn from_groups(
        groups: impl IntoIterator<Item = DependencyGroup>,
    ) -> Result<Self, SyncError> {
        let mut set = Self::new();
        for group in groups {
            set.insert(group)?;
        }
        Ok(set)
    }

    /// Add a group; fails if a group with the same normalized name exists
    pub fn insert(&mut self, group: DependencyGroup) -> Result<(), SyncError> {
        if self.position(&group.name).is_some() {
            return Err(SyncError::DuplicateGroup(group.name));
        }
        self.groups.push(group);
        Ok(())
    }

    /// Look up a group by (normalized) name
    pub fn get(&self, name: &str) -> Option<&DependencyGroup> {
        self.position(name).map(|idx| &self.groups[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a group, returning it if it was present
    pub fn remove_group(&mut self, name: &str) -> Option<DependencyGroup> {
        self.position(name).map(|idx| self.groups.remove(idx))
    }

    /// Group name to package list, in declaration order
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups
            .iter()
            .map(|g| (g.name.as_str(), g.packages.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyGroup> {
        self.groups.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn optional_groups(&self) -> impl Iterator<Item = &DependencyGroup> {
        self.groups.iter().filter(|g| g.optional)
    }

    pub fn required_groups(&self) -> impl Iterator<Item = &DependencyGroup> {
        self.groups.iter().filter(|g| !g.optional)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = normalize_group_name(name);
        self.groups
            .iter()
            .position(|g| normalize_group_name(&g.name) == wanted)
    }
}

/// Source of the live dependency groups during a sync session
///
/// The sync engine reads the current set to classify failures and calls
/// `remove_group` exactly once per dropped optional group. Implementations
/// that persist groups (a `pyproject.toml`) must make the removal visible to
/// the package manager before returning.
pub trait DependencyGroups {
    /// The groups as they stand right now
    fn group_set(&self) -> &DependencyGroupSet;

    /// Drop a group from the live set
    fn remove_group(&mut self, name: &str) -> Result<(), SyncError>;
}

impl DependencyGroups for DependencyGroupSet {
    fn group_set(&self) -> &DependencyGroupSet {
        self
    }

    fn remove_group(&mut self, name: &str) -> Result<(), SyncError> {
        DependencyGroupSet::remove_group(self, name)
            .map(|_| ())
            .ok_or_else(|| SyncError::GroupRemoval {
                name: name.to_string(),
                reason: "no such group".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_group_name() {
        assert_eq!(normalize_group_name("Optional_CUDA"), "optional-cuda");
        assert_eq!(normalize_group_name("optional--.tensorrt"), "optional-tensorrt");
        assert_eq!(normalize_group_name("node.impact-pack"), "node-impact-pack");
    }

    #[test]
    fn test_optional_name_convention() {
        assert!(DependencyGroup::has_optional_name("optional-cuda"));
        assert!(DependencyGroup::has_optional_name("Optional_xformers"));
        assert!(!DependencyGroup::has_optional_name("required-node-group"));
        assert!(!DependencyGroup::has_optional_name("cuda-optional"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = DependencyGroupSet::new();
        set.insert(DependencyGroup::optional("optional-cuda", pkgs(&["flash-attn"])))
            .unwrap();
        let err = set
            .insert(DependencyGroup::optional("Optional_CUDA", vec![]))
            .unwrap_err();
        assert!(matches!(err, SyncError::DuplicateGroup(name) if name == "Optional_CUDA"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut set = DependencyGroupSet::from_groups([
            DependencyGroup::required("node-a", pkgs(&["numpy"])),
            DependencyGroup::optional("optional-cuda", pkgs(&["flash-attn"])),
            DependencyGroup::optional("optional-xformers", pkgs(&["xformers"])),
        ])
        .unwrap();

        let removed = set.remove_group("optional-cuda").unwrap();
        assert_eq!(removed.packages, pkgs(&["flash-attn"]));
        assert_eq!(set.names(), vec!["node-a", "optional-xformers"]);
        assert!(set.remove_group("optional-cuda").is_none());
    }

    #[test]
    fn test_groups_mapping() {
        let set = DependencyGroupSet::from_groups([
            DependencyGroup::required("node-a", pkgs(&["numpy", "pillow"])),
            DependencyGroup::optional("optional-cuda", pkgs(&["flash-attn"])),
        ])
        .unwrap();

        let mapping: Vec<_> = set.groups().collect();
        assert_eq!(mapping[0].0, "node-a");
        assert_eq!(mapping[0].1, &["numpy".to_string(), "pillow".to_string()]);
        assert_eq!(set.optional_groups().count(), 1);
        assert_eq!(set.required_groups().count(), 1);
    }

    #[test]
    fn test_trait_remove_missing_group_errors() {
        let mut set = DependencyGroupSet::new();
        let err = DependencyGroups::remove_group(&mut set, "optional-cuda").unwrap_err();
        assert!(matches!(err, SyncError::GroupRemoval { .. }));
    }
}
