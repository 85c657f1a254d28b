//! Integration tests for the local build driver
//!
//! Builds real recipes against a temporary mirror, with a
//! `RecordingRunner` standing in for the build tools.

mod common;

use common::{stamp, TestWorkspace};
use hpcprereqs::config::defaults::{INSTALLED_STAMP, MANIFEST_PATH};
use hpcprereqs::core::driver::{is_installed, Driver, InstallEvent};
use hpcprereqs::core::flags::FlagCategory;
use hpcprereqs::core::manifest::PrereqManifest;
use hpcprereqs::core::repository::Repository;
use hpcprereqs::error::{BuildError, HpcPrereqsError};
use hpcprereqs::infra::process::RecordingRunner;

// ============================================
// Autotools recipes
// ============================================

#[test]
fn test_install_xz_runs_configure_make_install() {
    let ws = TestWorkspace::new();
    ws.mirror_tree("xz-5.2.3", &[("configure", "#!/bin/sh\n")]);
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "xz");
    let runner = RecordingRunner::new();
    let driver = Driver::new(&repo, ws.driver_config(), &runner);

    let report = driver.install(&plan).unwrap();

    let prefix = &plan.builds[0].prefix;
    assert_eq!(report.installed, vec![("xz".to_string(), prefix.clone())]);
    assert!(prefix.join(INSTALLED_STAMP).is_file());

    let invocations = runner.invocations();
    assert_eq!(invocations.len(), 3);
    let configure = &invocations[0];
    assert!(configure.program.ends_with("configure"));
    assert_eq!(configure.args[0], format!("--prefix={prefix}"));
    assert!(configure.args.contains(&"--enable-threads=yes".to_string()));
    assert!(configure.args.contains(&"CFLAGS=-g -O2".to_string()));
    assert_eq!(invocations[1].program, "make");
    assert_eq!(invocations[1].args, vec!["-j4"]);
    assert_eq!(invocations[2].args, vec!["-j4", "install"]);
}

#[test]
fn test_host_flags_reach_environment_for_zlib() {
    let ws = TestWorkspace::new();
    ws.mirror_tree("zlib-1.2.11", &[("configure", "#!/bin/sh\n")]);
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "zlib");
    let runner = RecordingRunner::new();
    let config = ws
        .driver_config()
        .with_host_flags(FlagCategory::CFlags, vec!["-O3".to_string()]);
    let driver = Driver::new(&repo, config, &runner);

    driver.install(&plan).unwrap();

    let configure = &runner.invocations()[0];
    assert_eq!(configure.env.get("CFLAGS").map(String::as_str), Some("-O3 -g"));
    assert!(!configure.args.iter().any(|a| a.starts_with("CFLAGS=")));
}

#[test]
fn test_injected_host_flags_reach_cmake_for_dyninst() {
    let ws = TestWorkspace::new();
    ws.mirror_tree(
        "dyninst-master",
        &[
            ("cmake/shared.cmake", "set(USE_COTIRE true)\n"),
            ("CMakeLists.txt", "project(Dyninst)\n"),
        ],
    );
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "dyninst+openmp");
    for build in &plan.builds {
        if build.spec.name != "dyninst" {
            stamp(&build.prefix);
        }
    }
    let runner = RecordingRunner::new();
    let config = ws
        .driver_config()
        .with_host_flags(FlagCategory::CxxFlags, vec!["-O3".to_string()]);

    Driver::new(&repo, config, &runner).install(&plan).unwrap();

    let cmake = &runner.invocations()[0];
    assert_eq!(cmake.program, "cmake");
    assert!(cmake.args.contains(&"-DCMAKE_CXX_FLAGS=-fopenmp -O3".to_string()));
    assert!(cmake.args.contains(&"-DCMAKE_C_FLAGS=-fopenmp".to_string()));
    assert_eq!(cmake.env.get("HPCPREREQS_CXXFLAGS").map(String::as_str), Some("-O3"));
}

#[test]
fn test_installed_prefix_is_skipped() {
    let ws = TestWorkspace::new();
    ws.mirror_tree("xz-5.2.3", &[("configure", "#!/bin/sh\n")]);
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "xz");

    let first = RecordingRunner::new();
    Driver::new(&repo, ws.driver_config(), &first)
        .install(&plan)
        .unwrap();

    let second = RecordingRunner::new();
    let mut events = Vec::new();
    let report = Driver::new(&repo, ws.driver_config(), &second)
        .install_with(&plan, &mut |e| events.push(e))
        .unwrap();

    assert!(report.installed.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(second.invocations().is_empty());
    assert!(matches!(events[0], InstallEvent::Skipped { .. }));
}

// ============================================
// Failure handling
// ============================================

#[test]
fn test_failure_stops_dependents() {
    let ws = TestWorkspace::new();
    ws.mirror_tree("xz-5.2.3", &[("configure", "#!/bin/sh\n")]);
    ws.mirror_tree("libunwind-2018.01.17", &[("configure.ac", "AC_INIT\n")]);
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "libunwind");
    assert_eq!(plan.order(), vec!["xz", "libunwind"]);

    let runner = RecordingRunner::new().fail_on("make");
    let err = Driver::new(&repo, ws.driver_config(), &runner)
        .install(&plan)
        .unwrap_err();

    match err {
        HpcPrereqsError::Build { package, .. } => assert_eq!(package, "xz"),
        other => panic!("unexpected error: {other}"),
    }
    for build in &plan.builds {
        assert!(!is_installed(&build.prefix));
    }
    assert!(!runner
        .invocations()
        .iter()
        .any(|inv| inv.program == "autoreconf"));
}

#[test]
fn test_corrupted_archive_is_rejected() {
    let ws = TestWorkspace::new();
    common::write_file(&ws.mirror().join("xz-5.2.3.tar.bz2"), "truncated download");
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "xz");
    let runner = RecordingRunner::new();

    let err = Driver::new(&repo, ws.driver_config(), &runner)
        .install(&plan)
        .unwrap_err();

    match err {
        HpcPrereqsError::Build {
            source: BuildError::ChecksumMismatch { expected, .. },
            ..
        } => assert_eq!(expected, "1592e7ca3eece099b03b35f4d9179e7c"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(runner.invocations().is_empty());
    assert!(!is_installed(&plan.builds[0].prefix));
}

#[test]
fn test_autoreconf_without_configure_is_a_configuration_error() {
    let ws = TestWorkspace::new();
    ws.mirror_tree("xz-5.2.3", &[("configure", "#!/bin/sh\n")]);
    ws.mirror_tree("libunwind-2018.01.17", &[("configure.ac", "AC_INIT\n")]);
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "libunwind");
    let runner = RecordingRunner::new();

    let err = Driver::new(&repo, ws.driver_config(), &runner)
        .install(&plan)
        .unwrap_err();

    assert!(err.to_string().contains("configure script not found"));
    assert!(is_installed(&plan.builds[0].prefix));
    assert!(!is_installed(&plan.builds[1].prefix));
}

#[test]
fn test_missing_source_reports_searched_paths() {
    let ws = TestWorkspace::new();
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "zlib");
    let runner = RecordingRunner::new();

    let err = Driver::new(&repo, ws.driver_config(), &runner)
        .install(&plan)
        .unwrap_err();

    match err {
        HpcPrereqsError::Build {
            source: BuildError::SourceNotFound { searched, .. },
            ..
        } => {
            assert!(searched.contains(&ws.mirror().join("zlib-1.2.11.tar.gz")));
            assert!(searched.contains(&ws.mirror().join("zlib-1.2.11")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_patch_fails_before_configure() {
    let ws = TestWorkspace::new();
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "binutils");
    for build in &plan.builds {
        if build.spec.name != "binutils" {
            stamp(&build.prefix);
        }
    }
    let binutils = plan.get("binutils").unwrap();
    ws.mirror_tree(
        &format!("binutils-{}", binutils.spec.version),
        &[("configure", "#!/bin/sh\n")],
    );
    ws.add_patch("binutils", "basename.patch");

    let runner = RecordingRunner::new();
    let driver = Driver::new(&repo, ws.driver_config(), &runner);
    assert_eq!(
        driver.missing_patches("binutils").unwrap(),
        vec![ws.patches().join("binutils").join("config.patch")]
    );

    let err = driver.install(&plan).unwrap_err();
    assert!(matches!(
        err,
        HpcPrereqsError::Build {
            source: BuildError::PatchNotFound { .. },
            ..
        }
    ));
    assert!(!runner
        .invocations()
        .iter()
        .any(|inv| inv.program.ends_with("configure")));
}

// ============================================
// Post-install normalization
// ============================================

#[test]
fn test_elfutils_installs_elf_header() {
    let ws = TestWorkspace::new();
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "elfutils");
    for build in &plan.builds {
        if build.spec.name != "elfutils" {
            stamp(&build.prefix);
        }
    }
    let elfutils = plan.get("elfutils").unwrap();
    ws.mirror_tree(
        &format!("elfutils-{}", elfutils.spec.version),
        &[("configure", "#!/bin/sh\n"), ("libelf/elf.h", "/* elf */\n")],
    );

    let runner = RecordingRunner::new();
    Driver::new(&repo, ws.driver_config(), &runner)
        .install(&plan)
        .unwrap();

    let header = elfutils.prefix.include().join("elf.h");
    assert_eq!(std::fs::read_to_string(header).unwrap(), "/* elf */\n");
    let configure = &runner.invocations()[0];
    assert!(configure
        .args
        .contains(&"CFLAGS=-g -O2 -Wno-error".to_string()));
}

// ============================================
// Meta recipe
// ============================================

#[test]
fn test_prereqs_manifest_lists_every_prerequisite() {
    let ws = TestWorkspace::new();
    let repo = Repository::builtin();
    let plan = ws.plan(&repo, "hpctoolkit-prereqs");
    for build in &plan.builds {
        if build.spec.name != "hpctoolkit-prereqs" {
            stamp(&build.prefix);
        }
    }

    let runner = RecordingRunner::new();
    let report = Driver::new(&repo, ws.driver_config(), &runner)
        .install(&plan)
        .unwrap();
    assert_eq!(report.installed.len(), 1);
    assert!(runner.invocations().is_empty());

    let root = plan.get("hpctoolkit-prereqs").unwrap();
    let content = std::fs::read_to_string(root.prefix.join(MANIFEST_PATH)).unwrap();
    let manifest = PrereqManifest::parse(&content).unwrap();
    for dep in &root.spec.dependencies {
        assert_eq!(manifest.get(&dep.name), Some(dep.prefix.path()));
    }
    assert!(manifest.get("intel-xed").is_some());
    assert_eq!(
        manifest.get("intel-tbb"),
        Some(ws.path().join("externals/intel-tbb").as_path())
    );
}
