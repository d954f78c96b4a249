// tests/project_sync.rs

//! Recreating a project from a manifest and syncing it with a stand-in `uv`.

mod common;

use common::write_fake_uv;
use comfyenv::manifest::{CustomNode, EnvironmentManifest, PackageSpec};
use comfyenv::sync::UV_LOCKFILE_NAME;
use comfyenv::{
    FsLockfileStore, ProgressiveSyncEngine, PyProject, SyncError, SyncResult, UvSyncInvoker,
};
use std::fs;

/// Fails while any group listed in `$BROKEN` is still declared in the
/// project, the way uv reports an unresolvable dependency group. Groups in
/// `$BUILD_BROKEN` only fail once default groups are installed. Every call is
/// appended to `calls.log` next to the script, and a lockfile is written
/// whenever it gets as far as resolving.
const FAKE_UV: &str = r#"
project="$3"
echo "$*" >> "$(dirname "$0")/calls.log"
blame() {
    echo "  x No solution found when resolving dependencies:" >&2
    echo "  Because pkg-$1 has no wheels and comfyui-env:$1" >&2
    echo "  depends on pkg-$1, we can conclude that the requirements are unsatisfiable." >&2
    exit 1
}
for group in $BROKEN; do
    if grep -q "^$group = " "$project/pyproject.toml"; then blame "$group"; fi
done
case " $* " in
    *" --no-default-groups "*) ;;
    *)
        for group in $BUILD_BROKEN; do
            if grep -q "^$group = " "$project/pyproject.toml"; then blame "$group"; fi
        done
        ;;
esac
echo "version = 1" > "$project/uv.lock"
echo "Installed 42 packages"
exit 0
"#;

fn manifest() -> EnvironmentManifest {
    let mut manifest = EnvironmentManifest::new("3.11.9");
    manifest.cuda_version = Some("12.1".into());
    manifest.torch_version = Some("2.3.1+cu121".into());
    manifest.packages = vec![
        PackageSpec::new("torch", Some("2.3.1+cu121".into())),
        PackageSpec::new("numpy", Some("1.26.4".into())),
        PackageSpec::new("xformers", Some("0.0.27".into())),
        PackageSpec::new("tensorrt", Some("10.0.1".into())),
    ];
    manifest.custom_nodes = vec![CustomNode {
        name: "ComfyUI-Impact-Pack".into(),
        repository: Some("https://github.com/ltdrdata/ComfyUI-Impact-Pack".into()),
        commit: Some("1d6e2c0".into()),
        requirements: vec!["scikit-image".into()],
    }];
    manifest
}

fn engine_for(
    dir: &std::path::Path,
    project_dir: &std::path::Path,
    broken: &str,
) -> ProgressiveSyncEngine<UvSyncInvoker, FsLockfileStore> {
    engine_with_build_failures(dir, project_dir, broken, "")
}

fn engine_with_build_failures(
    dir: &std::path::Path,
    project_dir: &std::path::Path,
    broken: &str,
    build_broken: &str,
) -> ProgressiveSyncEngine<UvSyncInvoker, FsLockfileStore> {
    let script = format!("BROKEN=\"{broken}\"\nBUILD_BROKEN=\"{build_broken}\"\n{FAKE_UV}");
    let uv = write_fake_uv(dir, &script);
    ProgressiveSyncEngine::new(
        UvSyncInvoker::new(uv, project_dir),
        FsLockfileStore::for_project(project_dir),
    )
}

/// Arguments of every fake uv call, in order
fn uv_calls(dir: &std::path::Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_recreate_drops_broken_accelerators() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let project_dir = work.path().join("env");

    let mut project = PyProject::write_from_manifest(&project_dir, &manifest()).unwrap();
    fs::write(project_dir.join(UV_LOCKFILE_NAME), "stale").unwrap();

    let mut engine = engine_for(
        tools.path(),
        &project_dir,
        "optional-xformers optional-tensorrt",
    );
    let mut result = SyncResult::new();
    engine
        .sync_environment(&mut project, &mut result, false)
        .unwrap();

    assert!(result.packages_synced);
    assert!(result.groups_synced);
    assert_eq!(
        result.failed_group_names(),
        vec!["optional-xformers", "optional-tensorrt"]
    );

    // Three base attempts, then the surviving node group is installed
    let calls = uv_calls(tools.path());
    assert_eq!(calls.len(), 4);
    assert!(calls[..3].iter().all(|c| c.contains("--no-default-groups")));
    assert!(!calls[3].contains("--no-default-groups"));
    // uv wraps its diagnostic between the group and "depends on"
    let reason = &result.dependency_groups_failed[1].reason;
    assert!(reason.contains("comfyui-env:optional-tensorrt\n"));
    assert!(reason.contains("depends on pkg-optional-tensorrt"));

    // Removals are persisted and the lockfile was regenerated by the tool
    let reloaded = PyProject::open(&project_dir).unwrap();
    assert_eq!(reloaded.groups().names(), vec!["node-comfyui-impact-pack"]);
    assert_eq!(
        fs::read_to_string(project_dir.join(UV_LOCKFILE_NAME)).unwrap().trim(),
        "version = 1"
    );
}

#[test]
fn test_required_node_group_failure_is_fatal() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let project_dir = work.path().join("env");

    let mut project = PyProject::write_from_manifest(&project_dir, &manifest()).unwrap();
    fs::write(project_dir.join(UV_LOCKFILE_NAME), "stale").unwrap();
    let before = fs::read_to_string(project.path()).unwrap();

    let mut engine = engine_for(tools.path(), &project_dir, "node-comfyui-impact-pack");
    let mut result = SyncResult::new();
    let err = engine.run(&mut project, &mut result, false).unwrap_err();

    match err {
        SyncError::Failure(failure) => {
            assert!(failure
                .diagnostic
                .contains("comfyui-env:node-comfyui-impact-pack"));
            assert!(failure
                .diagnostic
                .contains("depends on pkg-node-comfyui-impact-pack"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!result.packages_synced);
    assert_eq!(fs::read_to_string(project.path()).unwrap(), before);
    assert_eq!(
        fs::read_to_string(project_dir.join(UV_LOCKFILE_NAME)).unwrap(),
        "stale"
    );
}

#[test]
fn test_hand_written_project_with_declared_optional_group() {
    let tools = tempfile::tempdir().unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    fs::write(
        project_dir.path().join("pyproject.toml"),
        r#"[project]
name = "comfyui-env"
version = "0.1.0"
dependencies = ["numpy"]

[dependency-groups]
accel = ["sageattention==2.2.0"]
video = ["av"]

[tool.comfyenv]
optional-groups = ["accel"]
"#,
    )
    .unwrap();

    let mut project = PyProject::open(project_dir.path()).unwrap();
    let mut engine = engine_for(tools.path(), project_dir.path(), "accel");
    let mut result = SyncResult::new();
    engine
        .sync_environment(&mut project, &mut result, false)
        .unwrap();

    assert_eq!(result.failed_group_names(), vec!["accel"]);
    let text = fs::read_to_string(project_dir.path().join("pyproject.toml")).unwrap();
    assert!(!text.contains("sageattention"));
    assert!(text.contains("video = [\"av\"]"));
}

#[test]
fn test_group_failing_only_on_install_is_dropped() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let project_dir = work.path().join("env");
    let mut project = PyProject::write_from_manifest(&project_dir, &manifest()).unwrap();

    let mut engine =
        engine_with_build_failures(tools.path(), &project_dir, "", "optional-tensorrt");
    let mut result = SyncResult::new();
    engine
        .sync_environment(&mut project, &mut result, false)
        .unwrap();

    assert!(result.groups_synced);
    assert_eq!(result.failed_group_names(), vec!["optional-tensorrt"]);
    assert!(result.dependency_groups_failed[0]
        .reason
        .contains("depends on pkg-optional-tensorrt"));

    let calls = uv_calls(tools.path());
    assert_eq!(calls.len(), 3);
    assert!(calls[0].contains("--no-default-groups"));
    assert!(!calls[1].contains("--no-default-groups"));
    assert!(!calls[2].contains("--no-default-groups"));

    let reloaded = PyProject::open(&project_dir).unwrap();
    assert_eq!(
        reloaded.groups().names(),
        vec!["node-comfyui-impact-pack", "optional-xformers"]
    );
}

#[test]
fn test_dry_run_leaves_project_alone() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let project_dir = work.path().join("env");
    let mut project = PyProject::write_from_manifest(&project_dir, &manifest()).unwrap();
    let before = fs::read_to_string(project.path()).unwrap();

    let mut engine = engine_for(tools.path(), &project_dir, "optional-xformers");
    let mut result = SyncResult::new();
    engine
        .sync_environment(&mut project, &mut result, true)
        .unwrap();

    assert!(!result.packages_synced);
    assert!(uv_calls(tools.path()).is_empty());
    assert_eq!(fs::read_to_string(project.path()).unwrap(), before);
    assert!(!project_dir.join(UV_LOCKFILE_NAME).exists());
}
