//! Prerequisite manifest (`<prefix>/etc/prereqs.txt`)
//!
//! Plain text, one `name: prefix` pair per line, in the order the
//! dependencies were declared. Downstream build scripts read it to find
//! each prerequisite without knowing how prefixes were resolved.

use std::path::{Path, PathBuf};

use crate::config::defaults::MANIFEST_PATH;
use crate::core::spec::Prefix;
use crate::error::{FilesystemError, RecipeError};
use crate::infra::filesystem;

/// One manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub prefix: PathBuf,
}

/// Ordered prerequisite listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrereqManifest {
    entries: Vec<ManifestEntry>,
}

impl PrereqManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&mut self, name: &str, prefix: impl Into<PathBuf>) {
        self.entries.push(ManifestEntry {
            name: name.to_string(),
            prefix: prefix.into(),
        });
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Prefix listed for `name`
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.prefix.as_path())
    }

    /// File contents
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {}\n", e.name, e.prefix.display()))
            .collect()
    }

    /// Parse file contents; blank lines are skipped
    pub fn parse(content: &str) -> Result<Self, RecipeError> {
        let mut manifest = Self::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let (name, prefix) = line.split_once(": ").ok_or_else(|| RecipeError::InvalidSpec {
                spec: line.to_string(),
                reason: "expected 'name: prefix'".to_string(),
            })?;
            manifest.push(name.trim(), prefix.trim());
        }
        Ok(manifest)
    }

    /// Write to `<prefix>/etc/prereqs.txt`, returning the path
    pub fn write(&self, prefix: &Prefix) -> Result<PathBuf, FilesystemError> {
        let path = prefix.join(MANIFEST_PATH);
        filesystem::write_file(&path, &self.render())?;
        Ok(path)
    }
}
