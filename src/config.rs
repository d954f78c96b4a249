// src/config.rs

//! Tool configuration
//!
//! Read from `--config <file>` or `<config dir>/comfyenv/config.toml` when
//! present; every field has a default so the file is optional.
//!
//! ```toml
//! uv_path = "/usr/local/bin/uv"
//! python = "python3"
//! sync_timeout_secs = 1800
//! exclude_default_groups = true
//! # marker_pattern = '(?P<project>\S+):(?P<group>\S+) depends on (?P<package>\S+)'
//! ```

use crate::error::{Error, Result};
use crate::sync::{FailureClassifier, SyncOptions, MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "config.toml";

fn default_python() -> String {
    "python3".to_string()
}

fn default_sync_timeout() -> u64 {
    30 * 60
}

fn default_true() -> bool {
    true
}

/// Settings shared by all commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// uv binary; looked up on PATH when unset
    #[serde(default)]
    pub uv_path: Option<PathBuf>,

    /// Interpreter used for detection
    #[serde(default = "default_python")]
    pub python: String,

    /// Timeout for a single `uv sync`
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_secs: u64,

    /// Install only the mandatory dependency set
    #[serde(default = "default_true")]
    pub exclude_default_groups: bool,

    /// Override for the diagnostic marker grammar
    #[serde(default)]
    pub marker_pattern: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            uv_path: None,
            python: default_python(),
            sync_timeout_secs: default_sync_timeout(),
            exclude_default_groups: true,
            marker_pattern: None,
        }
    }
}

impl ToolConfig {
    /// `<config dir>/comfyenv/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("comfyenv").join(CONFIG_FILE_NAME))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Load an explicit config file, or the default one if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn with_uv_path(mut self, path: PathBuf) -> Self {
        self.uv_path = Some(path);
        self
    }

    pub fn with_python(mut self, python: String) -> Self {
        self.python = python;
        self
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// The uv binary to run
    pub fn resolve_uv(&self) -> Result<PathBuf> {
        match &self.uv_path {
            Some(path) if path.exists() => Ok(path.clone()),
            Some(path) => Err(Error::ToolNotFound(format!(
                "uv not found at {}",
                path.display()
            ))),
            None => which::which("uv")
                .map_err(|_| Error::ToolNotFound("uv not found in PATH".to_string())),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            exclude_default_groups: self.exclude_default_groups,
            max_retries: MAX_RETRIES,
        }
    }

    pub fn classifier(&self) -> Result<FailureClassifier> {
        match &self.marker_pattern {
            Some(pattern) => FailureClassifier::with_pattern(pattern),
            None => Ok(FailureClassifier::new()),
        }
    }
}
