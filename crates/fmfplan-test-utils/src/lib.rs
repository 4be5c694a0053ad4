//! Shared test utilities for fmfplan integration tests.
//!
//! Provides the podman-py reference documents and a builder for fmf
//! directory trees on disk. Every tree lives in its own temporary
//! directory, removed when the builder is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// The podman-py plan document: root prepare steps, `/upstream`,
/// `/distro` and `/downstream` plan groups.
pub const PODMAN_PY_PLANS: &str = include_str!("../../../fixtures/podman-py/plans.fmf");

/// A test catalog matching the podman-py plans' filters.
pub const PODMAN_PY_TESTS: &str = include_str!("../../../fixtures/podman-py/tests.fmf");

/// An fmf tree written to a temporary directory.
pub struct FmfTree {
    dir: TempDir,
}

impl FmfTree {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        Self { dir }
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn file(self, relative: &str, contents: &str) -> Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture directory");
        }
        fs::write(&path, contents).expect("failed to write fixture file");
        self
    }

    /// Create an empty directory at `relative`.
    pub fn dir(self, relative: &str) -> Self {
        fs::create_dir_all(self.dir.path().join(relative))
            .expect("failed to create fixture directory");
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }
}

/// The podman-py plans and tests written as single-file documents.
///
/// Returns the owning tree plus the plan and test document paths.
pub fn podman_py_files() -> (FmfTree, PathBuf, PathBuf) {
    let tree = FmfTree::new()
        .file("plans.fmf", PODMAN_PY_PLANS)
        .file("tests.fmf", PODMAN_PY_TESTS);
    let plans = tree.join("plans.fmf");
    let tests = tree.join("tests.fmf");
    (tree, plans, tests)
}
