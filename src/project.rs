// src/project.rs

//! The `pyproject.toml` the package manager syncs from
//!
//! Dependency groups live in the PEP 735 `[dependency-groups]` table. Which
//! groups may be dropped is decided by name (`optional-*`) or by listing them
//! under `[tool.comfyenv] optional-groups`. Edits go through `toml_edit` so a
//! hand-maintained project keeps its comments and layout.

use crate::error::{Error, Result};
use crate::manifest::{EnvironmentManifest, TORCH_PACKAGES};
use crate::sync::{
    normalize_group_name, DependencyGroup, DependencyGroupSet, DependencyGroups, SyncError,
};
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{value, Array, ArrayOfTables, DocumentMut, InlineTable, Item, Table};
use tracing::{debug, info};

pub const PYPROJECT_NAME: &str = "pyproject.toml";

/// Project name used for generated environments
pub const DEFAULT_PROJECT_NAME: &str = "comfyui-env";

const TOOL_SECTION: &str = "comfyenv";

/// A loaded `pyproject.toml` and its dependency groups
#[derive(Debug, Clone)]
pub struct PyProject {
    path: PathBuf,
    doc: DocumentMut,
    name: String,
    dependencies: Vec<String>,
    groups: DependencyGroupSet,
}

impl PyProject {
    /// Load `pyproject.toml` from a project directory
    pub fn open(project_dir: &Path) -> Result<Self> {
        Self::load(&project_dir.join(PYPROJECT_NAME))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ProjectError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(path.to_path_buf(), &content)
    }

    fn parse(path: PathBuf, content: &str) -> Result<Self> {
        let doc: DocumentMut = content
            .parse()
            .map_err(|e| Error::ParseError(format!("{}: {}", path.display(), e)))?;

        let name = doc
            .get("project")
            .and_then(|p| p.get("name"))
            .and_then(Item::as_str)
            .ok_or_else(|| {
                Error::ProjectError(format!("{} has no [project].name", path.display()))
            })?
            .to_string();

        let dependencies = doc
            .get("project")
            .and_then(|p| p.get("dependencies"))
            .and_then(Item::as_array)
            .map(string_items)
            .unwrap_or_default();

        let declared_optional: Vec<String> = doc
            .get("tool")
            .and_then(|t| t.get(TOOL_SECTION))
            .and_then(|t| t.get("optional-groups"))
            .and_then(Item::as_array)
            .map(string_items)
            .unwrap_or_default()
            .into_iter()
            .map(|n| normalize_group_name(&n))
            .collect();

        let mut groups = DependencyGroupSet::new();
        if let Some(table) = doc.get("dependency-groups").and_then(Item::as_table_like) {
            for (group, item) in table.iter() {
                let Some(array) = item.as_array() else {
                    debug!("Skipping non-array dependency group '{}'", group);
                    continue;
                };
                let optional = DependencyGroup::has_optional_name(group)
                    || declared_optional.contains(&normalize_group_name(group));
                groups.insert(DependencyGroup::new(group, optional, string_items(array)))?;
            }
        }

        debug!(
            "Loaded project '{}' with {} base dependencies and {} group(s)",
            name,
            dependencies.len(),
            groups.len()
        );

        Ok(Self {
            path,
            doc,
            name,
            dependencies,
            groups,
        })
    }

    /// Write a fresh `pyproject.toml` for a manifest into `project_dir`
    pub fn write_from_manifest(project_dir: &Path, manifest: &EnvironmentManifest) -> Result<Self> {
        fs::create_dir_all(project_dir)?;
        let path = project_dir.join(PYPROJECT_NAME);
        let content = render_manifest(manifest);
        fs::write(&path, &content)?;
        info!("Wrote {}", path.display());
        Self::parse(path, &content)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `[project].dependencies`, the mandatory set
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn groups(&self) -> &DependencyGroupSet {
        &self.groups
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.doc.to_string())?;
        Ok(())
    }

    /// Remove a group from the document, save it, then drop it from the live set
    ///
    /// Also drops it from `[tool.uv].default-groups` and
    /// `[tool.comfyenv].optional-groups` so uv does not reference a group
    /// that no longer exists. If the file cannot be written the project is
    /// left as it was.
    pub fn remove_group(&mut self, name: &str) -> Result<DependencyGroup> {
        let group_name = self
            .groups
            .get(name)
            .map(|g| g.name.clone())
            .ok_or_else(|| Error::NotFound(format!("dependency group '{name}'")))?;

        let mut doc = self.doc.clone();
        if let Some(table) = doc
            .get_mut("dependency-groups")
            .and_then(Item::as_table_like_mut)
        {
            table.remove(&group_name);
        }
        for (tool, key) in [("uv", "default-groups"), (TOOL_SECTION, "optional-groups")] {
            if let Some(array) = doc
                .get_mut("tool")
                .and_then(|t| t.get_mut(tool))
                .and_then(|t| t.get_mut(key))
                .and_then(Item::as_array_mut)
            {
                array.retain(|v| {
                    v.as_str()
                        .is_none_or(|s| normalize_group_name(s) != normalize_group_name(&group_name))
                });
            }
        }

        fs::write(&self.path, doc.to_string())?;
        self.doc = doc;
        let group = self
            .groups
            .remove_group(&group_name)
            .ok_or_else(|| Error::NotFound(format!("dependency group '{group_name}'")))?;
        info!("Removed dependency group '{}' from {}", group.name, self.path.display());
        Ok(group)
    }
}

impl DependencyGroups for PyProject {
    fn group_set(&self) -> &DependencyGroupSet {
        &self.groups
    }

    fn remove_group(&mut self, name: &str) -> std::result::Result<(), SyncError> {
        PyProject::remove_group(self, name)
            .map(|_| ())
            .map_err(|e| SyncError::GroupRemoval {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

fn string_items(array: &Array) -> Vec<String> {
    array
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn string_array<'a>(items: impl IntoIterator<Item = &'a str>) -> Array {
    let mut array: Array = items.into_iter().collect();
    if array.len() > 1 {
        for item in array.iter_mut() {
            item.decor_mut().set_prefix("\n    ");
        }
        array.set_trailing("\n");
        array.set_trailing_comma(true);
    }
    array
}

/// Render the `pyproject.toml` for a manifest
pub fn render_manifest(manifest: &EnvironmentManifest) -> String {
    let plan = manifest.dependency_plan();
    let mut doc = DocumentMut::new();

    let mut project = Table::new();
    project.insert("name", value(DEFAULT_PROJECT_NAME));
    project.insert("version", value("0.1.0"));
    project.insert(
        "requires-python",
        value(format!("=={}.*", manifest.python_minor())),
    );
    project.insert(
        "dependencies",
        value(string_array(plan.base.iter().map(String::as_str))),
    );
    doc.insert("project", Item::Table(project));

    let mut groups = Table::new();
    for group in &plan.groups {
        groups.insert(
            &group.name,
            value(string_array(group.packages.iter().map(String::as_str))),
        );
    }
    doc.insert("dependency-groups", Item::Table(groups));

    let mut tool = Table::new();
    tool.set_implicit(true);

    let mut comfyenv = Table::new();
    let optional: Vec<&str> = plan
        .groups
        .iter()
        .filter(|g| g.optional)
        .map(|g| g.name.as_str())
        .collect();
    comfyenv.insert("optional-groups", value(string_array(optional)));
    tool.insert(TOOL_SECTION, Item::Table(comfyenv));

    let mut uv = Table::new();
    uv.insert(
        "default-groups",
        value(string_array(plan.groups.iter().map(|g| g.name.as_str()))),
    );

    if let Some(tag) = manifest.cuda_tag() {
        let index_name = format!("pytorch-{tag}");
        let mut index = Table::new();
        index.insert("name", value(index_name.as_str()));
        index.insert("url", value(format!("https://download.pytorch.org/whl/{tag}")));
        index.insert("explicit", value(true));
        let mut indexes = ArrayOfTables::new();
        indexes.push(index);
        uv.insert("index", Item::ArrayOfTables(indexes));

        let mut sources = Table::new();
        for pkg in &manifest.packages {
            if TORCH_PACKAGES.contains(&pkg.name.as_str()) {
                let mut source = InlineTable::new();
                source.insert("index", index_name.as_str().into());
                sources.insert(&pkg.name, value(source));
            }
        }
        if !sources.is_empty() {
            uv.insert("sources", Item::Table(sources));
        }
    }
    tool.insert("uv", Item::Table(uv));
    doc.insert("tool", Item::Table(tool));

    doc.to_string()
}
