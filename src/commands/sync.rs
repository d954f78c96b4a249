// src/commands/sync.rs
//! Progressive sync and recreate commands

use anyhow::{Context, Result};
use comfyenv::{
    EnvironmentManifest, FsLockfileStore, ProgressiveSyncEngine, PyProject, SyncError,
    SyncResult, ToolConfig, UvSyncInvoker,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// JSON report printed with `--json`
#[derive(Debug, Serialize)]
struct SyncReport<'a> {
    project: &'a Path,
    dry_run: bool,
    #[serde(flatten)]
    result: &'a SyncResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Progressive sync of an existing project
pub fn cmd_sync(
    config: &ToolConfig,
    project_dir: &Path,
    venv: Option<PathBuf>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let mut project = PyProject::open(project_dir)
        .with_context(|| format!("failed to open project in {}", project_dir.display()))?;
    run_progressive_sync(config, &mut project, project_dir, venv, None, dry_run, json)
}

/// Write a project from a manifest, then sync it
pub fn cmd_recreate(
    config: &ToolConfig,
    manifest_path: &Path,
    project_dir: &Path,
    venv: Option<PathBuf>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let manifest = EnvironmentManifest::load(manifest_path)
        .with_context(|| format!("failed to load {}", manifest_path.display()))?;
    info!(
        "Recreating environment from {} (Python {}, CUDA {})",
        manifest_path.display(),
        manifest.python_version,
        manifest.cuda_version.as_deref().unwrap_or("none")
    );

    let mut project = PyProject::write_from_manifest(project_dir, &manifest)
        .with_context(|| format!("failed to write project in {}", project_dir.display()))?;
    if !json {
        println!("Wrote project: {}", project.path().display());
    }

    run_progressive_sync(
        config,
        &mut project,
        project_dir,
        venv,
        Some(manifest.python_minor().to_string()),
        dry_run,
        json,
    )?;

    if !json && !manifest.custom_nodes.is_empty() {
        println!("Custom nodes to check out into custom_nodes/:");
        for node in &manifest.custom_nodes {
            println!(
                "  {} {} @ {}",
                node.name,
                node.repository.as_deref().unwrap_or("(no remote)"),
                node.commit.as_deref().unwrap_or("HEAD")
            );
        }
    }
    Ok(())
}

fn run_progressive_sync(
    config: &ToolConfig,
    project: &mut PyProject,
    project_dir: &Path,
    venv: Option<PathBuf>,
    python: Option<String>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let uv = if dry_run {
        config.resolve_uv().unwrap_or_else(|_| PathBuf::from("uv"))
    } else {
        config.resolve_uv()?
    };

    let mut invoker = UvSyncInvoker::new(uv, project_dir).with_timeout(config.sync_timeout());
    if let Some(venv) = venv {
        invoker = invoker.with_venv(venv);
    }
    if let Some(python) = python {
        invoker = invoker.with_python(python);
    }

    let mut engine = ProgressiveSyncEngine::new(invoker, FsLockfileStore::for_project(project_dir))
        .with_classifier(config.classifier()?)
        .with_options(config.sync_options());

    let mut result = SyncResult::new();
    let outcome = engine
        .sync_environment(project, &mut result, dry_run)
        .map(|_| ());

    let error = outcome.as_ref().err().map(|e| e.to_string());
    let report = SyncReport {
        project: project_dir,
        dry_run,
        result: &result,
        error,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Err(SyncError::RetryExhausted { last, .. }) = &outcome {
        warn!("Last failure: {}", last.diagnostic);
    }
    outcome.context("dependency sync failed")
}

fn print_report(report: &SyncReport<'_>) {
    if report.dry_run {
        println!("Dry run: no packages installed");
        return;
    }
    if report.result.packages_synced {
        println!("Base dependencies installed");
    } else {
        println!("Base dependencies NOT installed");
    }
    if report.result.groups_synced {
        println!("Dependency groups installed");
    } else if report.result.packages_synced {
        println!("Dependency groups NOT installed");
    }
    for group in &report.result.dependency_groups_failed {
        let first_line = group.reason.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        println!("  warning: dropped optional group '{}'", group.name);
        println!("      {}", first_line.trim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_shape() {
        let mut result = SyncResult::new();
        result.packages_synced = true;
        result.groups_synced = true;
        result.record_failed_group("optional-cuda", "no wheels");
        let report = SyncReport {
            project: Path::new("/srv/env"),
            dry_run: false,
            result: &result,
            error: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["project"], "/srv/env");
        assert_eq!(json["packages_synced"], true);
        assert_eq!(json["groups_synced"], true);
        assert_eq!(json["dependency_groups_failed"][0]["name"], "optional-cuda");
        assert!(json.get("error").is_none());
    }
}
