// src/cli/mod.rs
//! CLI definitions for comfyenv
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `detect` - Capture an installation into a manifest
//! - `show` - Summarize a manifest
//! - `recreate` - Build a project from a manifest and sync it
//! - `sync` - Progressive sync of an existing project

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "comfyenv")]
#[command(author = "comfyenv Contributors")]
#[command(version)]
#[command(about = "Capture a ComfyUI environment and recreate it on another machine", long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/comfyenv/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture an existing ComfyUI installation into a manifest
    Detect {
        /// ComfyUI checkout directory
        #[arg(long, default_value = ".")]
        comfyui: PathBuf,

        /// Python interpreter of the installation (default: from config)
        #[arg(long)]
        python: Option<String>,

        /// Where to write the manifest
        #[arg(short, long, default_value = "comfyenv.toml")]
        output: PathBuf,
    },

    /// Print a summary of a manifest
    Show {
        /// Manifest file
        #[arg(default_value = "comfyenv.toml")]
        manifest: PathBuf,
    },

    /// Recreate an environment from a manifest
    Recreate {
        /// Manifest file
        manifest: PathBuf,

        /// Project directory to create
        #[arg(short, long)]
        project: PathBuf,

        /// Virtual environment to install into (default: <project>/.venv)
        #[arg(long)]
        venv: Option<PathBuf>,

        /// Write the project but do not install anything
        #[arg(long)]
        dry_run: bool,

        /// Print the sync result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Progressively sync an existing project
    Sync {
        /// Project directory containing pyproject.toml
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Virtual environment to install into (default: <project>/.venv)
        #[arg(long)]
        venv: Option<PathBuf>,

        /// Show what would be synced without installing
        #[arg(long)]
        dry_run: bool,

        /// Print the sync result as JSON
        #[arg(long)]
        json: bool,
    },
}
