// tests/common/mod.rs

//! Shared fakes and helpers for integration tests.

#![allow(dead_code)]

use comfyenv::{
    DependencyGroup, DependencyGroupSet, LockfileStore, SyncError, SyncFailure, SyncInvoker,
};
use std::collections::VecDeque;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What the fake package manager saw when it was called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCall {
    pub exclude_default_groups: bool,
    pub lockfile_present: bool,
}

#[derive(Debug, Default)]
struct FakeWorld {
    outcomes: VecDeque<Result<(), SyncFailure>>,
    calls: Vec<SyncCall>,
    lockfile_present: bool,
    lockfile_deletes: usize,
    writes_lockfile: bool,
}

/// A fake package manager and its lockfile sharing one state
///
/// Hand `invoker()` and `lockfile()` to the engine, keep the `FakeUv` to
/// inspect what happened afterwards.
#[derive(Debug, Clone, Default)]
pub struct FakeUv {
    world: Arc<Mutex<FakeWorld>>,
}

impl FakeUv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a lockfile on disk
    pub fn with_lockfile(self) -> Self {
        self.world.lock().unwrap().lockfile_present = true;
        self
    }

    /// Every sync call (re)writes the lockfile, whatever its outcome
    pub fn writes_lockfile(self) -> Self {
        self.world.lock().unwrap().writes_lockfile = true;
        self
    }

    /// Queue the outcome of the next sync call
    pub fn then(self, outcome: Result<(), SyncFailure>) -> Self {
        self.world.lock().unwrap().outcomes.push_back(outcome);
        self
    }

    /// Queue a failure blaming `group`
    pub fn then_blame(self, group: &str) -> Self {
        self.then(Err(blame(group)))
    }

    pub fn then_succeed(self) -> Self {
        self.then(Ok(()))
    }

    pub fn invoker(&self) -> FakeInvoker {
        FakeInvoker {
            world: Arc::clone(&self.world),
        }
    }

    pub fn lockfile(&self) -> FakeLockfile {
        FakeLockfile {
            world: Arc::clone(&self.world),
        }
    }

    pub fn calls(&self) -> Vec<SyncCall> {
        self.world.lock().unwrap().calls.clone()
    }

    pub fn lockfile_present(&self) -> bool {
        self.world.lock().unwrap().lockfile_present
    }

    pub fn lockfile_deletes(&self) -> usize {
        self.world.lock().unwrap().lockfile_deletes
    }
}

pub struct FakeInvoker {
    world: Arc<Mutex<FakeWorld>>,
}

impl SyncInvoker for FakeInvoker {
    fn sync(&mut self, exclude_default_groups: bool) -> Result<(), SyncFailure> {
        let mut world = self.world.lock().unwrap();
        let call = SyncCall {
            exclude_default_groups,
            lockfile_present: world.lockfile_present,
        };
        world.calls.push(call);
        if world.writes_lockfile {
            world.lockfile_present = true;
        }
        let outcome = world
            .outcomes
            .pop_front()
            .expect("sync called more times than scripted");
        if outcome.is_ok() {
            world.lockfile_present = true;
        }
        outcome
    }
}

pub struct FakeLockfile {
    world: Arc<Mutex<FakeWorld>>,
}

impl LockfileStore for FakeLockfile {
    fn exists(&self) -> bool {
        self.world.lock().unwrap().lockfile_present
    }

    fn delete(&mut self) -> Result<(), SyncError> {
        let mut world = self.world.lock().unwrap();
        world.lockfile_present = false;
        world.lockfile_deletes += 1;
        Ok(())
    }
}

/// A uv-style diagnostic blaming a dependency group
pub fn blame(group: &str) -> SyncFailure {
    SyncFailure::new(format!(
        "  × No solution found when resolving dependencies:\n  ╰─▶ Because pkg-{group}==1.0 has no wheels with a matching platform tag\n      and comfyui-env:{group} depends on pkg-{group}==1.0, we can conclude that\n      comfyui-env:{group}'s requirements are unsatisfiable."
    ))
}

/// Optional groups named `optional-0`, `optional-1`, ...
pub fn numbered_optional_groups(count: usize) -> DependencyGroupSet {
    DependencyGroupSet::from_groups(
        (0..count).map(|i| DependencyGroup::optional(format!("optional-{i}"), vec![format!("pkg-{i}")])),
    )
    .unwrap()
}

/// Write an executable stand-in for `uv` into `dir`
pub fn write_fake_uv(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("uv");
    fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
