// src/commands/detect.rs
//! Environment capture command

use anyhow::{Context, Result};
use comfyenv::{EnvironmentDetector, ToolConfig};
use std::path::Path;
use tracing::info;

/// Detect an installation and write its manifest
pub fn cmd_detect(
    config: &ToolConfig,
    comfyui: &Path,
    python: Option<&str>,
    output: &Path,
) -> Result<()> {
    let python = python.unwrap_or(config.python.as_str());
    info!("Detecting {} with {}", comfyui.display(), python);

    let manifest = EnvironmentDetector::new(comfyui, python)
        .detect()
        .with_context(|| format!("failed to detect environment in {}", comfyui.display()))?;
    manifest
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Wrote manifest: {}", output.display());
    println!("  Python: {}", manifest.python_version);
    if let Some(torch) = &manifest.torch_version {
        println!("  PyTorch: {}", torch);
    }
    println!(
        "  CUDA: {}",
        manifest.cuda_version.as_deref().unwrap_or("none")
    );
    println!("  Packages: {}", manifest.packages.len());
    println!("  Custom nodes: {}", manifest.custom_nodes.len());
    Ok(())
}
