// src/manifest.rs

//! Portable environment manifest
//!
//! A manifest captures what a ComfyUI installation runs on so the same
//! environment can be rebuilt on another machine.
//!
//! # Example comfyenv.toml
//!
//! ```toml
//! schema_version = 1
//! created = "2026-10-19T09:12:44Z"
//! python_version = "3.11.9"
//! cuda_version = "12.1"
//! torch_version = "2.3.1+cu121"
//!
//! [comfyui]
//! path = "/opt/ComfyUI"
//! commit = "9f4f1a3c..."
//!
//! [[packages]]
//! name = "torch"
//! version = "2.3.1+cu121"
//!
//! [[custom_nodes]]
//! name = "ComfyUI-Impact-Pack"
//! repository = "https://github.com/ltdrdata/ComfyUI-Impact-Pack"
//! commit = "1d6e2c0..."
//! requirements = ["segment-anything", "scikit-image"]
//! ```

use crate::sync::{normalize_group_name, DependencyGroup};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Current manifest schema version
pub const MANIFEST_VERSION: u32 = 1;

/// Default manifest file name
pub const MANIFEST_NAME: &str = "comfyenv.toml";

/// Packages that make up the PyTorch stack; pinned in the base set
pub const TORCH_PACKAGES: &[&str] = &["torch", "torchvision", "torchaudio"];

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize manifest: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Manifest version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Manifest validation failed: {0}")]
    ValidationError(String),
}

/// A pinned Python package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Direct reference (`name @ url`) when the package was not installed from an index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
            url: None,
        }
    }

    /// PEP 508 requirement string for this package
    pub fn requirement(&self) -> String {
        match (&self.url, &self.version) {
            (Some(url), _) => format!("{} @ {}", self.name, url),
            (None, Some(version)) => format!("{}=={}", self.name, version),
            (None, None) => self.name.clone(),
        }
    }
}

/// Where the ComfyUI checkout lived on the source machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComfyUiInfo {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// An installed custom node (plugin)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Requirement lines from the node's requirements.txt
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl CustomNode {
    /// Name of the dependency group holding this node's requirements
    pub fn group_name(&self) -> String {
        format!("node-{}", normalize_group_name(&self.name))
    }
}

/// Captured environment of one ComfyUI installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentManifest {
    pub schema_version: u32,
    pub created: DateTime<Utc>,
    pub python_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuda_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torch_version: Option<String>,
    #[serde(default)]
    pub comfyui: ComfyUiInfo,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    #[serde(default)]
    pub custom_nodes: Vec<CustomNode>,
}

/// Base requirements and groups derived from a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPlan {
    pub base: Vec<String>,
    pub groups: Vec<DependencyGroup>,
}

/// Optional group an accelerator package belongs in, if any
///
/// These packages ship compiler- or driver-specific wheels and routinely
/// fail to resolve on a different machine.
pub fn accelerator_group(package: &str) -> Option<&'static str> {
    let name = normalize_group_name(package);
    let group = match name.as_str() {
        "xformers" => "optional-xformers",
        "flash-attn" => "optional-flash-attn",
        "sageattention" => "optional-sageattention",
        "triton" | "triton-windows" => "optional-triton",
        "bitsandbytes" => "optional-bitsandbytes",
        "onnxruntime-gpu" => "optional-onnxruntime",
        n if n.starts_with("tensorrt") => "optional-tensorrt",
        n if n.starts_with("nvidia-") || n.starts_with("cupy-cuda") => "optional-cuda",
        _ => return None,
    };
    Some(group)
}

/// Package name of a requirement line (`numpy>=1.26; python_version>"3"` -> `numpy`)
pub fn requirement_name(requirement: &str) -> &str {
    let end = requirement
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(requirement.len());
    &requirement[..end]
}

impl EnvironmentManifest {
    /// Empty manifest stamped with the current time
    pub fn new(python_version: impl Into<String>) -> Self {
        Self {
            schema_version: MANIFEST_VERSION,
            created: Utc::now(),
            python_version: python_version.into(),
            cuda_version: None,
            torch_version: None,
            comfyui: ComfyUiInfo::default(),
            packages: Vec::new(),
            custom_nodes: Vec::new(),
        }
    }

    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn to_toml(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        self.validate()?;
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Check schema version and uniqueness of package and node names
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.schema_version != MANIFEST_VERSION {
            return Err(ManifestError::VersionMismatch {
                expected: MANIFEST_VERSION,
                found: self.schema_version,
            });
        }
        if self.python_version.trim().is_empty() {
            return Err(ManifestError::ValidationError(
                "python_version is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for pkg in &self.packages {
            if !seen.insert(normalize_group_name(&pkg.name)) {
                return Err(ManifestError::ValidationError(format!(
                    "package '{}' listed more than once",
                    pkg.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for node in &self.custom_nodes {
            if !seen.insert(node.group_name()) {
                return Err(ManifestError::ValidationError(format!(
                    "custom node '{}' listed more than once",
                    node.name
                )));
            }
        }
        Ok(())
    }

    /// `3.11.9` -> `3.11`
    pub fn python_minor(&self) -> &str {
        let v = self.python_version.trim();
        match v.match_indices('.').nth(1) {
            Some((idx, _)) => &v[..idx],
            None => v,
        }
    }

    /// PyTorch wheel tag for the CUDA version (`12.1` -> `cu121`)
    pub fn cuda_tag(&self) -> Option<String> {
        let cuda = self.cuda_version.as_deref()?;
        let mut parts = cuda.trim().split('.');
        let major = parts.next().filter(|p| p.chars().all(|c| c.is_ascii_digit()))?;
        let minor = parts.next().unwrap_or("0");
        if major.is_empty() || !minor.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(format!("cu{major}{minor}"))
    }

    /// Split the manifest's requirements into a base set and groups
    ///
    /// Accelerator packages go to optional groups, wherever they were found.
    /// Every custom node with remaining requirements gets a required
    /// `node-<name>` group.
    pub fn dependency_plan(&self) -> DependencyPlan {
        let mut base = Vec::new();
        let mut optional: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();

        for pkg in &self.packages {
            let requirement = pkg.requirement();
            match accelerator_group(&pkg.name) {
                Some(group) => optional.entry(group).or_default().push(requirement),
                None => base.push(requirement),
            }
        }

        let mut groups = Vec::new();
        for node in &self.custom_nodes {
            let mut reqs = Vec::new();
            for req in &node.requirements {
                match accelerator_group(requirement_name(req)) {
                    Some(group) => {
                        let entry = optional.entry(group).or_default();
                        if !entry.contains(req) {
                            entry.push(req.clone());
                        }
                    }
                    None => reqs.push(req.clone()),
                }
            }
            if !reqs.is_empty() {
                groups.push(DependencyGroup::required(node.group_name(), reqs));
            }
        }

        groups.extend(
            optional
                .into_iter()
                .map(|(name, packages)| DependencyGroup::optional(name, packages)),
        );

        DependencyPlan { base, groups }
    }
}
