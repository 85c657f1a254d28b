//! Source staging
//!
//! Locates a version's source in the local mirror, verifies its integrity
//! token, unpacks or copies it into the build context's source directory,
//! and applies patch files. Also provides the line-oriented regex edit
//! recipes use for small source fixes.

use md5::Md5;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::core::recipe::SourceLocator;
use crate::error::{BuildError, FilesystemError};
use crate::infra::filesystem;
use crate::infra::process::{ToolInvocation, ToolRunner};

/// Integrity check outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    /// Digest matched
    Verified,
    /// Token is not a digest we know how to check
    Unverified,
}

/// Verify a file against an integrity token
///
/// 64-hex-digit tokens are SHA-256 digests and 32-hex-digit tokens are
/// MD5 digests. Anything else is reported as unverified.
pub fn verify_checksum(path: &Path, token: &str) -> Result<Integrity, BuildError> {
    let token = token.trim().to_ascii_lowercase();
    if !token.chars().all(|c| c.is_ascii_hexdigit()) {
        tracing::warn!(
            "Integrity token for {} is not a hex digest; skipping verification",
            path.display()
        );
        return Ok(Integrity::Unverified);
    }
    let actual = match token.len() {
        64 => hash_file::<Sha256>(path)?,
        32 => hash_file::<Md5>(path)?,
        _ => {
            tracing::warn!(
                "Integrity token for {} has unknown length; skipping verification",
                path.display()
            );
            return Ok(Integrity::Unverified);
        }
    };

    if actual == token {
        tracing::debug!("Verified {}", path.display());
        Ok(Integrity::Verified)
    } else {
        Err(BuildError::ChecksumMismatch {
            file: path.display().to_string(),
            expected: token,
            actual,
        })
    }
}

/// Hex digest of a file's contents
fn hash_file<D: Digest>(path: &Path) -> Result<String, BuildError> {
    let mut file = File::open(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| FilesystemError::ReadFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `tar` arguments for an archive, based on its extension
fn tar_flags(archive: &Path) -> Option<&'static str> {
    let name = archive.file_name()?.to_str()?;
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some("-xzf")
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Some("-xjf")
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some("-xJf")
    } else if name.ends_with(".tar") {
        Some("-xf")
    } else {
        None
    }
}

/// Unpack an archive into `dest`, dropping its top-level directory
pub fn extract_archive(
    runner: &dyn ToolRunner,
    archive: &Path,
    dest: &Path,
) -> Result<(), BuildError> {
    let flags = tar_flags(archive).ok_or_else(|| BuildError::ToolFailed {
        program: "tar".to_string(),
        status: "not run".to_string(),
        stderr: format!("unknown archive format: {}", archive.display()),
    })?;
    filesystem::create_dir_all(dest)?;
    runner.run(&ToolInvocation::new("tar", dest).args([
        flags.to_string(),
        archive.display().to_string(),
        "--strip-components=1".to_string(),
        "-C".to_string(),
        dest.display().to_string(),
    ]))
}

/// Where a source lives in the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEntry {
    /// Archive file to unpack
    Archive(PathBuf),
    /// Directory (checkout or unpacked tree) to copy
    Tree(PathBuf),
}

/// Candidate mirror paths for a source, in lookup order
pub fn mirror_candidates(mirror: &Path, key: &str, source: &SourceLocator) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(name) = source.archive_filename() {
        candidates.push(mirror.join(name));
    }
    candidates.push(mirror.join(key));
    candidates
}

/// Find a source in the mirror
pub fn locate(
    recipe: &str,
    mirror: &Path,
    key: &str,
    source: &SourceLocator,
) -> Result<MirrorEntry, BuildError> {
    let candidates = mirror_candidates(mirror, key, source);
    for candidate in &candidates {
        if candidate.is_dir() {
            return Ok(MirrorEntry::Tree(candidate.clone()));
        }
        if candidate.is_file() {
            return Ok(MirrorEntry::Archive(candidate.clone()));
        }
    }
    Err(BuildError::SourceNotFound {
        recipe: recipe.to_string(),
        searched: candidates,
    })
}

/// Stage one source into `dest`
pub fn stage_source(
    runner: &dyn ToolRunner,
    recipe: &str,
    mirror: &Path,
    key: &str,
    source: &SourceLocator,
    dest: &Path,
) -> Result<(), BuildError> {
    if *source == SourceLocator::Bundle {
        filesystem::create_dir_all(dest)?;
        return Ok(());
    }
    match locate(recipe, mirror, key, source)? {
        MirrorEntry::Tree(dir) => {
            tracing::info!("{recipe}: copying source from {}", dir.display());
            filesystem::copy_tree(&dir, dest)?;
        }
        MirrorEntry::Archive(archive) => {
            if let SourceLocator::Archive { checksum, .. } = source {
                verify_checksum(&archive, checksum)?;
            }
            tracing::info!("{recipe}: extracting {}", archive.display());
            extract_archive(runner, &archive, dest)?;
        }
    }
    Ok(())
}

/// Apply a patch file with `patch -p1`
pub fn apply_patch(
    runner: &dyn ToolRunner,
    source_dir: &Path,
    patch: &Path,
) -> Result<(), BuildError> {
    let name = patch
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    runner
        .run(&ToolInvocation::new("patch", source_dir).args([
            "-s".to_string(),
            "-p1".to_string(),
            "-i".to_string(),
            patch.display().to_string(),
        ]))
        .map_err(|e| BuildError::PatchFailed {
            patch: name,
            error: e.to_string(),
        })
}

/// Replace every line matching `pattern` in place
///
/// The replacement may use `$1`-style group references. Returns the number
/// of lines changed.
pub fn filter_file(path: &Path, pattern: &str, replacement: &str) -> Result<usize, BuildError> {
    let re = Regex::new(pattern).map_err(|e| BuildError::PatchFailed {
        patch: format!("filter {}", path.display()),
        error: e.to_string(),
    })?;
    let content = filesystem::read_file(path)?;

    let mut changed = 0;
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if re.is_match(body) {
            let replaced = re.replace_all(body, replacement);
            if replaced != body {
                changed += 1;
            }
            out.push_str(&replaced);
        } else {
            out.push_str(body);
        }
        out.push_str(newline);
    }

    if changed > 0 {
        filesystem::write_file(path, &out)?;
    }
    Ok(changed)
}

/// Build an include directory that mirrors `include` minus `hidden`
///
/// Each top-level entry is symlinked into `dest`, so the original prefix
/// is left untouched.
pub fn shadow_include_dir(
    include: &Path,
    dest: &Path,
    hidden: &[&str],
) -> Result<PathBuf, FilesystemError> {
    filesystem::create_dir_all(dest)?;
    let entries = std::fs::read_dir(include).map_err(|e| FilesystemError::ReadFile {
        path: include.to_path_buf(),
        error: e.to_string(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| FilesystemError::ReadFile {
            path: include.to_path_buf(),
            error: e.to_string(),
        })?;
        let name = entry.file_name();
        if hidden.iter().any(|h| name.to_str() == Some(*h)) {
            continue;
        }
        let link = dest.join(&name);
        if link.symlink_metadata().is_err() {
            filesystem::symlink(&entry.path(), &link)?;
        }
    }
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::process::RecordingRunner;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_shadow_include_hides_header() {
        let dir = TempDir::new().unwrap();
        let include = dir.path().join("elfutils/include");
        filesystem::write_file(&include.join("dwarf.h"), "elfutils dwarf").unwrap();
        filesystem::write_file(&include.join("libelf.h"), "libelf").unwrap();
        filesystem::write_file(&include.join("elfutils/libdw.h"), "libdw").unwrap();

        let shadow =
            shadow_include_dir(&include, &dir.path().join("stage/include"), &["dwarf.h"]).unwrap();

        assert!(!shadow.join("dwarf.h").exists());
        assert_eq!(filesystem::read_file(&shadow.join("libelf.h")).unwrap(), "libelf");
        assert!(shadow.join("elfutils/libdw.h").is_file());
        assert!(include.join("dwarf.h").is_file());
    }

    #[test]
    fn test_filter_file_with_groups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.cmake");
        filesystem::write_file(&path, "  SET(USE_COTIRE true)\nother\n").unwrap();

        let n = filter_file(&path, r"^(.*)[sS][eE][tT].*USE_COTIRE.*", "${1}set(USE_COTIRE false)")
            .unwrap();

        assert_eq!(n, 1);
        assert_eq!(
            filesystem::read_file(&path).unwrap(),
            "  set(USE_COTIRE false)\nother\n"
        );
    }

    #[test]
    fn test_filter_file_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CMakeLists.txt");
        filesystem::write_file(&path, "add_subdirectory(testsuite)\n").unwrap();

        filter_file(&path, r"^.*add_subdirectory.*testsuite.*", "# disable testsuite").unwrap();
        let second =
            filter_file(&path, r"^.*add_subdirectory.*testsuite.*", "# disable testsuite").unwrap();

        assert_eq!(second, 0);
        assert_eq!(filesystem::read_file(&path).unwrap(), "# disable testsuite\n");
    }

    #[test]
    fn test_verify_sha256() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.tar.gz");
        filesystem::write_file(&path, "").unwrap();

        let ok = verify_checksum(
            &path,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        )
        .unwrap();
        assert_eq!(ok, Integrity::Verified);

        let err = verify_checksum(&path, &"0".repeat(64)).unwrap_err();
        assert!(matches!(err, BuildError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_verify_md5() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.tar.gz");
        filesystem::write_file(&path, "").unwrap();
        assert_eq!(
            verify_checksum(&path, "D41D8CD98F00B204E9800998ECF8427E").unwrap(),
            Integrity::Verified
        );
    }

    #[test]
    fn test_corrupted_archive_fails_md5() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("xz-5.2.3.tar.bz2");
        filesystem::write_file(&path, "not an archive").unwrap();
        let err = verify_checksum(&path, "1592e7ca3eece099b03b35f4d9179e7c").unwrap_err();
        match err {
            BuildError::ChecksumMismatch { expected, .. } => {
                assert_eq!(expected, "1592e7ca3eece099b03b35f4d9179e7c");
            }
            other => panic!("Expected ChecksumMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_odd_token_is_unverified() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zlib-1.2.11.tar.gz");
        filesystem::write_file(&path, "data").unwrap();
        assert_eq!(verify_checksum(&path, "abc").unwrap(), Integrity::Unverified);
    }

    #[test]
    fn test_stage_archive_runs_tar() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("mirror");
        filesystem::write_file(&mirror.join("xz-5.2.3.tar.bz2"), "").unwrap();
        let source = SourceLocator::archive("http://tukaani.org/xz/xz-5.2.3.tar.bz2", "abc");
        let runner = RecordingRunner::new();

        stage_source(&runner, "xz", &mirror, "xz-5.2.3", &source, &dir.path().join("src")).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("tar -xjf "));
        assert!(lines[0].contains("--strip-components=1"));
    }

    #[test]
    fn test_stage_tree_copies() {
        let dir = TempDir::new().unwrap();
        let mirror = dir.path().join("mirror");
        filesystem::write_file(&mirror.join("libmonitor-2017.12.06/configure"), "#!/bin/sh\n")
            .unwrap();
        let source = SourceLocator::git(
            "https://github.com/hpctoolkit/libmonitor",
            crate::core::recipe::GitRef::Commit("6be9bc85ff756198b9c7".to_string()),
        );
        let runner = RecordingRunner::new();
        let dest = dir.path().join("src");

        stage_source(&runner, "libmonitor", &mirror, "libmonitor-2017.12.06", &source, &dest)
            .unwrap();

        assert!(dest.join("configure").is_file());
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_missing_source_lists_candidates() {
        let dir = TempDir::new().unwrap();
        let source = SourceLocator::archive("http://zlib.net/fossils/zlib-1.2.11.tar.gz", "x");
        let err = locate("zlib", dir.path(), "zlib-1.2.11", &source).unwrap_err();
        match err {
            BuildError::SourceNotFound { searched, .. } => assert_eq!(searched.len(), 2),
            other => panic!("Expected SourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_patch_failure_is_patch_error() {
        let runner = RecordingRunner::new().fail_on("patch");
        let err = apply_patch(&runner, Path::new("/src"), Path::new("/patches/config.patch"))
            .unwrap_err();
        match err {
            BuildError::PatchFailed { patch, .. } => assert_eq!(patch, "config.patch"),
            other => panic!("Expected PatchFailed, got {other:?}"),
        }
    }
}
