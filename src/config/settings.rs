//! Host settings (`hpcprereqs.toml`)
//!
//! Every field is optional. Values from the command line win over the
//! file, and the file wins over built-in defaults (platform directories,
//! `num_cpus` job count, compiler detection on `PATH`, host platform).
//!
//! ```toml
//! install_root = "/opt/hpctoolkit-prereqs"
//! mirror = "/srv/mirror"
//! jobs = 16
//!
//! [compiler]
//! name = "gcc"
//! cc = "/usr/bin/gcc-7"
//! cxx = "/usr/bin/g++-7"
//!
//! [flags]
//! cflags = "-O3"
//!
//! [externals]
//! bzip2 = "/usr"
//! intel-tbb = "/opt/tbb"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::driver::DriverConfig;
use crate::core::flags::{split_flags, FlagCategory};
use crate::core::spec::{Compiler, Platform};
use crate::infra::dirs::HpcPrereqsDirs;

/// Settings error types
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read settings file
    #[error("Failed to read settings file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse settings file
    #[error("Failed to parse settings file '{path}': {error}")]
    ParseError { path: String, error: String },

    /// Unknown key in the `[flags]` table
    #[error("Unknown flag category '{0}' in [flags]")]
    UnknownFlagCategory(String),
}

/// Compiler overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// Compiler family (gcc, clang, intel, ...)
    pub name: Option<String>,
    pub cc: Option<PathBuf>,
    pub cxx: Option<PathBuf>,
}

/// Target platform overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub os: Option<String>,
    pub arch: Option<String>,
}

/// Contents of `hpcprereqs.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Root under which prefixes are created
    pub install_root: Option<PathBuf>,
    /// Root for per-build scratch directories
    pub stage_root: Option<PathBuf>,
    /// Directory of pre-fetched archives and checkouts
    pub mirror: Option<PathBuf>,
    /// Directory of `<recipe>/<patch>` files
    pub patches: Option<PathBuf>,
    pub jobs: Option<usize>,
    /// Keep stage directories after successful builds
    pub keep_stage: Option<bool>,

    #[serde(default)]
    pub compiler: CompilerSettings,

    #[serde(default)]
    pub platform: PlatformSettings,

    /// Host flags per category, space separated
    #[serde(default)]
    pub flags: BTreeMap<String, String>,

    /// Packages installed outside this tool: name to prefix
    #[serde(default)]
    pub externals: BTreeMap<String, PathBuf>,
}

impl Settings {
    /// Settings file to read: `explicit` if given, otherwise the one in the
    /// config directory
    pub fn locate(explicit: Option<&Path>, dirs: &HpcPrereqsDirs) -> PathBuf {
        explicit.map_or_else(|| dirs.settings_path(), Path::to_path_buf)
    }

    /// Load settings from the config directory
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an
    /// error.
    pub fn load(dirs: &HpcPrereqsDirs) -> Result<Self, SettingsError> {
        Self::load_from_path(&dirs.settings_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| SettingsError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    #[must_use]
    pub fn install_root(&self, dirs: &HpcPrereqsDirs) -> PathBuf {
        self.install_root.clone().unwrap_or_else(|| dirs.install_root())
    }

    #[must_use]
    pub fn stage_root(&self, dirs: &HpcPrereqsDirs) -> PathBuf {
        self.stage_root.clone().unwrap_or_else(|| dirs.stage_root())
    }

    #[must_use]
    pub fn mirror(&self, dirs: &HpcPrereqsDirs) -> PathBuf {
        self.mirror.clone().unwrap_or_else(|| dirs.mirror_dir())
    }

    #[must_use]
    pub fn patches(&self, dirs: &HpcPrereqsDirs) -> PathBuf {
        self.patches.clone().unwrap_or_else(|| dirs.patches_dir())
    }

    /// Effective job count
    #[must_use]
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Effective compiler; unset fields come from detection
    #[must_use]
    pub fn compiler(&self) -> Compiler {
        let c = &self.compiler;
        if let (Some(name), Some(cc), Some(cxx)) = (&c.name, &c.cc, &c.cxx) {
            return Compiler::new(name, cc, cxx);
        }
        let mut detected = Compiler::detect();
        if let Some(name) = &c.name {
            detected.name.clone_from(name);
        }
        if let Some(cc) = &c.cc {
            detected.cc.clone_from(cc);
        }
        if let Some(cxx) = &c.cxx {
            detected.cxx.clone_from(cxx);
        }
        detected
    }

    /// Effective target platform
    #[must_use]
    pub fn platform(&self) -> Platform {
        let host = Platform::host();
        Platform::new(
            self.platform.os.as_deref().unwrap_or(&host.os),
            self.platform.arch.as_deref().unwrap_or(&host.arch),
        )
    }

    /// `[flags]` parsed into categories
    pub fn host_flags(&self) -> Result<BTreeMap<FlagCategory, Vec<String>>, SettingsError> {
        self.flags
            .iter()
            .map(|(key, value)| {
                let category = key
                    .parse::<FlagCategory>()
                    .map_err(|_| SettingsError::UnknownFlagCategory(key.clone()))?;
                Ok((category, split_flags(value)))
            })
            .collect()
    }

    /// Driver configuration from these settings
    pub fn driver_config(&self, dirs: &HpcPrereqsDirs) -> Result<DriverConfig, SettingsError> {
        let mut config = DriverConfig::new(self.mirror(dirs), self.patches(dirs), self.stage_root(dirs))
            .with_jobs(self.jobs());
        for (category, flags) in self.host_flags()? {
            config = config.with_host_flags(category, flags);
        }
        config.keep_stage = self.keep_stage.unwrap_or(false);
        Ok(config)
    }
}
