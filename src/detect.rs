// src/detect.rs

//! Detect the configuration of an existing ComfyUI installation
//!
//! Asks the installation's Python interpreter for its version, installed
//! packages and PyTorch/CUDA build, and scans `custom_nodes/` for plugins.
//! Git metadata is read straight from `.git/` so detection works on
//! machines without a git binary.

use crate::error::{Error, Result};
use crate::manifest::{ComfyUiInfo, CustomNode, EnvironmentManifest, PackageSpec};
use crate::process::run_with_timeout;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for each interpreter probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

const CUSTOM_NODES_DIR: &str = "custom_nodes";

const TORCH_PROBE: &str = "import torch; print('torch=' + torch.__version__); print('cuda=' + str(torch.version.cuda))";

/// Parse `Python 3.11.9` into `3.11.9`
pub fn parse_python_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .skip_while(|w| !w.eq_ignore_ascii_case("python"))
        .nth(1)
        .filter(|v| v.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Parse `pip freeze` output
///
/// Editable installs (`-e`) and comments are skipped; `name @ url` lines keep
/// their URL.
pub fn parse_freeze(output: &str) -> Vec<PackageSpec> {
    let mut packages = Vec::new();
    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if let Some((name, url)) = line.split_once(" @ ") {
            let mut spec = PackageSpec::new(name.trim(), None);
            spec.url = Some(url.trim().to_string());
            packages.push(spec);
        } else if let Some((name, version)) = line.split_once("==") {
            packages.push(PackageSpec::new(name.trim(), Some(version.trim().to_string())));
        } else {
            debug!("Ignoring unrecognized freeze line: {}", line);
        }
    }
    packages
}

/// Parse the output of the torch probe into (torch version, CUDA version)
pub fn parse_torch_probe(output: &str) -> (Option<String>, Option<String>) {
    let mut torch = None;
    let mut cuda = None;
    for line in output.lines() {
        if let Some(v) = line.trim().strip_prefix("torch=") {
            torch = Some(v.to_string());
        } else if let Some(v) = line.trim().strip_prefix("cuda=") {
            if v != "None" && !v.is_empty() {
                cuda = Some(v.to_string());
            }
        }
    }
    (torch, cuda)
}

/// Requirement lines of a requirements.txt
///
/// Drops comments, blank lines, pip options (`-r`, `--extra-index-url`, ...)
/// and trailing `# comments`.
pub fn parse_requirements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| match line.find(" #") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .map(str::to_string)
        .collect()
}

/// Git directory of a working tree
///
/// Submodules and linked worktrees have a `.git` file holding
/// `gitdir: <path>` (relative to the working tree) instead of a directory.
pub fn resolve_git_dir(repo: &Path) -> Option<PathBuf> {
    let dot_git = repo.join(".git");
    if dot_git.is_dir() {
        return Some(dot_git);
    }
    let content = fs::read_to_string(&dot_git).ok()?;
    let target = content.trim().strip_prefix("gitdir:")?.trim();
    let git_dir = repo.join(target);
    git_dir.is_dir().then_some(git_dir)
}

/// Directory holding refs and config shared by all worktrees
fn common_git_dir(git_dir: &Path) -> PathBuf {
    match fs::read_to_string(git_dir.join("commondir")) {
        Ok(common) => git_dir.join(common.trim()),
        Err(_) => git_dir.to_path_buf(),
    }
}

/// Commit checked out in a git working tree, read from its git directory
pub fn read_git_head(repo: &Path) -> Option<String> {
    let git_dir = resolve_git_dir(repo)?;
    let head = fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();

    let Some(reference) = head.strip_prefix("ref: ") else {
        return Some(head.to_string());
    };

    let common_dir = common_git_dir(&git_dir);
    for dir in [&git_dir, &common_dir] {
        if let Ok(commit) = fs::read_to_string(dir.join(reference)) {
            return Some(commit.trim().to_string());
        }
    }

    // Ref may only exist in packed-refs
    let packed = fs::read_to_string(common_dir.join("packed-refs")).ok()?;
    packed.lines().find_map(|line| {
        let (commit, name) = line.split_once(' ')?;
        (name.trim() == reference).then(|| commit.to_string())
    })
}

/// URL of the `origin` remote, read from the repository config
pub fn read_git_origin(repo: &Path) -> Option<String> {
    let git_dir = resolve_git_dir(repo)?;
    let config = fs::read_to_string(common_git_dir(&git_dir).join("config")).ok()?;
    let mut in_origin = false;
    for line in config.lines().map(str::trim) {
        if line.starts_with('[') {
            in_origin = line == "[remote \"origin\"]";
        } else if in_origin {
            if let Some((key, url)) = line.split_once('=') {
                if key.trim() == "url" {
                    return Some(url.trim().to_string());
                }
            }
        }
    }
    None
}

/// Scan `<comfyui>/custom_nodes` for installed plugins
///
/// Directories ending in `.disabled` and Python caches are skipped. Results
/// are sorted by name.
pub fn scan_custom_nodes(comfyui_dir: &Path) -> Result<Vec<CustomNode>> {
    let nodes_dir = comfyui_dir.join(CUSTOM_NODES_DIR);
    if !nodes_dir.is_dir() {
        debug!("No custom_nodes directory in {}", comfyui_dir.display());
        return Ok(Vec::new());
    }

    let mut nodes = Vec::new();
    for entry in fs::read_dir(&nodes_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "__pycache__" || name.ends_with(".disabled") {
            debug!("Skipping custom node directory {}", name);
            continue;
        }

        let requirements = match fs::read_to_string(path.join("requirements.txt")) {
            Ok(content) => parse_requirements(&content),
            Err(_) => Vec::new(),
        };

        nodes.push(CustomNode {
            repository: read_git_origin(&path),
            commit: read_git_head(&path),
            name,
            requirements,
        });
    }
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(nodes)
}

/// Locates the interpreter of an installation and probes it
#[derive(Debug, Clone)]
pub struct EnvironmentDetector {
    comfyui_dir: PathBuf,
    python: PathBuf,
    timeout: Duration,
}

impl EnvironmentDetector {
    pub fn new(comfyui_dir: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        Self {
            comfyui_dir: comfyui_dir.into(),
            python: python.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn python_output(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new(&self.python);
        command.args(args).current_dir(&self.comfyui_dir);
        let output = run_with_timeout(&mut command, self.timeout)?;
        if output.timed_out() {
            return Err(Error::CommandFailed(format!(
                "{} {} timed out",
                self.python.display(),
                args.join(" ")
            )));
        }
        if !output.success() {
            return Err(Error::CommandFailed(format!(
                "{} {} exited with code {}: {}",
                self.python.display(),
                args.join(" "),
                output.code(),
                output.stderr.trim()
            )));
        }
        // Older interpreters print the version on stderr
        Ok(if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        })
    }

    /// Capture the installation into a manifest
    pub fn detect(&self) -> Result<EnvironmentManifest> {
        if !self.comfyui_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "ComfyUI directory {}",
                self.comfyui_dir.display()
            )));
        }
        info!("Detecting environment of {}", self.comfyui_dir.display());

        let version_output = self.python_output(&["--version"])?;
        let python_version = parse_python_version(&version_output).ok_or_else(|| {
            Error::ParseError(format!("unrecognized python version: {}", version_output.trim()))
        })?;
        info!("Python {}", python_version);

        let mut manifest = EnvironmentManifest::new(python_version);

        let freeze = self.python_output(&["-m", "pip", "freeze", "--all"])?;
        manifest.packages = parse_freeze(&freeze);
        info!("Found {} installed package(s)", manifest.packages.len());

        match self.python_output(&["-c", TORCH_PROBE]) {
            Ok(output) => {
                let (torch, cuda) = parse_torch_probe(&output);
                info!(
                    "PyTorch {} (CUDA {})",
                    torch.as_deref().unwrap_or("unknown"),
                    cuda.as_deref().unwrap_or("none")
                );
                manifest.torch_version = torch;
                manifest.cuda_version = cuda;
            }
            Err(e) => warn!("Could not probe PyTorch: {}", e),
        }

        manifest.comfyui = ComfyUiInfo {
            path: self.comfyui_dir.display().to_string(),
            commit: read_git_head(&self.comfyui_dir),
        };
        manifest.custom_nodes = scan_custom_nodes(&self.comfyui_dir)?;
        info!("Found {} custom node(s)", manifest.custom_nodes.len());

        manifest.validate()?;
        Ok(manifest)
    }
}
