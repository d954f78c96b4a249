// src/error.rs

//! Crate-wide error type

use crate::manifest::ManifestError;
use crate::sync::SyncError;
use thiserror::Error;

/// Errors surfaced by the comfyenv library
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Project error: {0}")]
    ProjectError(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
