//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use hpcprereqs::config::defaults::INSTALLED_STAMP;
use hpcprereqs::core::driver::DriverConfig;
use hpcprereqs::core::repository::Repository;
use hpcprereqs::core::resolver::{BuildPlan, Concretizer, SpecRequest};
use hpcprereqs::core::spec::{Compiler, Platform, Prefix};

/// Packages the built-in recipes need but do not build
pub const EXTERNALS: [&str; 5] = ["bzip2", "intel-tbb", "libpfm4", "papi", "xerces-c"];

/// Test workspace
///
/// Creates a temporary directory holding an install root, a source mirror,
/// a patch directory and a stage root.
pub struct TestWorkspace {
    /// Temporary directory for the workspace
    pub dir: TempDir,
}

impl TestWorkspace {
    /// Create a new workspace in a temporary directory
    pub fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        for sub in ["opt", "mirror", "patches", "stage", "externals"] {
            std::fs::create_dir_all(ws.path().join(sub)).expect("Failed to create directory");
        }
        ws
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn install_root(&self) -> PathBuf {
        self.path().join("opt")
    }

    pub fn mirror(&self) -> PathBuf {
        self.path().join("mirror")
    }

    pub fn patches(&self) -> PathBuf {
        self.path().join("patches")
    }

    pub fn stage_root(&self) -> PathBuf {
        self.path().join("stage")
    }

    /// External prefixes for every package the recipes do not build
    pub fn externals(&self) -> BTreeMap<String, PathBuf> {
        EXTERNALS
            .iter()
            .map(|name| (name.to_string(), self.path().join("externals").join(name)))
            .collect()
    }

    /// Add an unpacked source tree `<name>-<version>` to the mirror
    pub fn mirror_tree(&self, key: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = self.mirror().join(key);
        std::fs::create_dir_all(&root).expect("Failed to create mirror tree");
        for (rel, content) in files {
            write_file(&root.join(rel), content);
        }
        root
    }

    /// Add a patch file for a recipe
    pub fn add_patch(&self, recipe: &str, patch: &str) {
        write_file(&self.patches().join(recipe).join(patch), "--- a\n+++ b\n");
    }

    /// Driver configuration pointing into this workspace
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::new(self.mirror(), self.patches(), self.stage_root()).with_jobs(4)
    }

    /// Concretize `spec` for linux-x86_64 with gcc
    pub fn plan(&self, repo: &Repository, spec: &str) -> BuildPlan {
        self.plan_for(repo, spec, &linux("x86_64"))
    }

    /// Concretize `spec` for a given platform
    pub fn plan_for(&self, repo: &Repository, spec: &str, platform: &Platform) -> BuildPlan {
        Concretizer::new(repo, platform.clone(), gcc(), self.install_root())
            .with_externals(self.externals())
            .concretize(&SpecRequest::parse(spec).expect("Failed to parse spec"))
            .expect("Failed to concretize")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

pub fn linux(arch: &str) -> Platform {
    Platform::new("linux", arch)
}

pub fn gcc() -> Compiler {
    Compiler::new("gcc", "/usr/bin/gcc", "/usr/bin/g++")
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(path, content).expect("Failed to write file");
}

/// Mark a prefix as already installed
pub fn stamp(prefix: &Prefix) {
    write_file(&prefix.join(INSTALLED_STAMP), "preinstalled\n");
}

/// Sample settings file for CLI tests
pub const SAMPLE_SETTINGS: &str = r#"
jobs = 2

[compiler]
name = "gcc"
cc = "/usr/bin/gcc"
cxx = "/usr/bin/g++"

[platform]
os = "linux"
arch = "x86_64"

[externals]
bzip2 = "/usr"
intel-tbb = "/opt/tbb"
libpfm4 = "/opt/libpfm4"
papi = "/opt/papi"
xerces-c = "/opt/xerces"
"#;
