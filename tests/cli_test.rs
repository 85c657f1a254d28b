//! Integration tests for the `hpcprereqs` command line
//!
//! Each test runs the binary with its config, data and cache directories
//! pointed into a fresh temporary directory.

mod common;

use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::{Command, Output};

use common::SAMPLE_SETTINGS;

/// Helper to run hpcprereqs with isolated directories
fn run_hpcprereqs(dir: &assert_fs::TempDir, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hpcprereqs"));
    cmd.current_dir(dir.path())
        .env("HPCPREREQS_CONFIG_DIR", dir.child("config").path())
        .env("HPCPREREQS_DATA_DIR", dir.child("data").path())
        .env("HPCPREREQS_CACHE_DIR", dir.child("cache").path())
        .env_remove("RUST_LOG");
    for arg in args {
        cmd.arg(arg);
    }
    cmd.output().expect("Failed to execute hpcprereqs")
}

/// Temp dir with the sample settings in the default config location
fn setup() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("config/hpcprereqs.toml")
        .write_str(SAMPLE_SETTINGS)
        .unwrap();
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================
// list / info
// ============================================

#[test]
fn test_list_shows_every_recipe() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    for name in [
        "binutils",
        "boost",
        "dyninst",
        "elfutils",
        "hpctoolkit",
        "hpctoolkit-prereqs",
        "intel-xed",
        "libdwarf",
        "libiberty",
        "libmonitor",
        "libunwind",
        "xz",
        "zlib",
    ] {
        assert!(predicate::str::contains(name).eval(&text), "missing {name}");
    }
}

#[test]
fn test_list_json() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["list", "--json"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let recipes = value.as_array().unwrap();
    assert_eq!(recipes.len(), 13);
    assert!(recipes.iter().any(|r| r["name"] == "libdwarf"));
}

#[test]
fn test_info_shows_variants_and_dependencies() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["info", "dyninst"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(predicate::str::contains("master (default)").eval(&text));
    assert!(predicate::str::contains("openmp").eval(&text));
    assert!(predicate::str::contains("intel-tbb (link) when @parallel").eval(&text));
}

#[test]
fn test_info_unknown_recipe_fails() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["info", "cuda"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("No recipe named 'cuda'").eval(&stderr(&output)));
}

// ============================================
// order / flags
// ============================================

#[test]
fn test_order_lists_dependencies_first() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["order", "libdwarf"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let elfutils = text.find("elfutils@").unwrap();
    let libdwarf = text.find("libdwarf@").unwrap();
    assert!(elfutils < libdwarf);
    assert!(predicate::str::contains("bzip2  /usr").eval(&text));
}

#[test]
fn test_flags_shows_placement() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["flags", "zlib", "--category", "cflags", "--flags=-O3"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(predicate::str::contains("cflags: environment (CFLAGS)").eval(&text));
    assert!(predicate::str::contains("-O3 -g").eval(&text));
}

#[test]
fn test_flags_other_category_goes_to_wrapper() {
    let dir = setup();
    let output = run_hpcprereqs(
        &dir,
        &["flags", "zlib", "--category", "ldflags", "--flags=-L/x", "--json"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["placement"], "inject");
    assert_eq!(value["flags"][0], "-L/x");
}

#[test]
fn test_flags_unknown_category_fails() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["flags", "zlib", "--category", "rustflags"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("Unknown flag category").eval(&stderr(&output)));
}

// ============================================
// install
// ============================================

#[test]
fn test_install_dry_run_builds_nothing() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["install", "hpctoolkit-prereqs", "--dry-run", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let builds = value["builds"].as_array().unwrap();
    let binutils = builds.iter().find(|b| b["name"] == "binutils").unwrap();
    assert_eq!(binutils["installed"], false);
    assert_eq!(binutils["missing_patches"].as_array().unwrap().len(), 2);
    let meta = builds.last().unwrap();
    assert_eq!(meta["steps"][0], "install:write-manifest");

    dir.child("data/opt").assert(predicate::path::missing());
    dir.child("cache/stage").assert(predicate::path::missing());
}

#[test]
fn test_install_invalid_variant_fails_before_building() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["install", "boost+singlethreaded"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("taggedlayout").eval(&stderr(&output)));
    dir.child("cache/stage").assert(predicate::path::missing());
}

// ============================================
// Settings
// ============================================

#[test]
fn test_malformed_settings_fail() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("config/hpcprereqs.toml")
        .write_str("jobs = [[[")
        .unwrap();
    let output = run_hpcprereqs(&dir, &["list"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("Failed to load settings").eval(&stderr(&output)));
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["--config", "nope.toml", "list"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("does not exist").eval(&stderr(&output)));
}

#[test]
fn test_explicit_config_overrides_default_location() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("custom.toml")
        .write_str("[externals]\nbzip2 = \"/custom/bzip2\"\n")
        .unwrap();
    let output = run_hpcprereqs(&dir, &["--config", "custom.toml", "order", "elfutils"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(predicate::str::contains("/custom/bzip2").eval(&stdout(&output)));
}

#[test]
fn test_version_flag() {
    let dir = setup();
    let output = run_hpcprereqs(&dir, &["--version"]);
    assert!(output.status.success());
    assert!(predicate::str::starts_with("hpcprereqs ").eval(&stdout(&output)));
}
