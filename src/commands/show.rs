// src/commands/show.rs
//! Manifest summary command

use anyhow::{Context, Result};
use comfyenv::EnvironmentManifest;
use std::path::Path;

/// Print a manifest and the dependency groups it would produce
pub fn cmd_show(manifest_path: &Path) -> Result<()> {
    let manifest = EnvironmentManifest::load(manifest_path)
        .with_context(|| format!("failed to load {}", manifest_path.display()))?;

    println!("Manifest: {}", manifest_path.display());
    println!("  Created: {}", manifest.created.to_rfc3339());
    println!("  ComfyUI: {}", manifest.comfyui.path);
    if let Some(commit) = &manifest.comfyui.commit {
        println!("  ComfyUI commit: {}", commit);
    }
    println!("  Python: {}", manifest.python_version);
    println!(
        "  PyTorch: {}",
        manifest.torch_version.as_deref().unwrap_or("not installed")
    );
    println!(
        "  CUDA: {}",
        manifest.cuda_version.as_deref().unwrap_or("none")
    );
    println!("  Packages: {}", manifest.packages.len());

    if !manifest.custom_nodes.is_empty() {
        println!("Custom nodes:");
        for node in &manifest.custom_nodes {
            let commit = node
                .commit
                .as_deref()
                .map(|c| c.get(..12).unwrap_or(c))
                .unwrap_or("unknown");
            println!("  {} @ {}", node.name, commit);
            if let Some(repo) = &node.repository {
                println!("      {}", repo);
            }
        }
    }

    let plan = manifest.dependency_plan();
    println!("Base dependencies: {}", plan.base.len());
    if !plan.groups.is_empty() {
        println!("Dependency groups:");
        for group in &plan.groups {
            let kind = if group.optional { "optional" } else { "required" };
            println!("  {} ({}, {} packages)", group.name, kind, group.packages.len());
        }
    }
    Ok(())
}
