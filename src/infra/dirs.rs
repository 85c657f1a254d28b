//! Platform-specific directory management
//!
//! Provides the default locations for settings, installed prefixes, build
//! stages and the source mirror. Follows XDG on Linux and the standard
//! locations on macOS.
//!
//! Environment variables can override the base directories:
//! - `HPCPREREQS_CACHE_DIR` - Override cache directory (build stages)
//! - `HPCPREREQS_CONFIG_DIR` - Override config directory (settings file)
//! - `HPCPREREQS_DATA_DIR` - Override data directory (prefixes, mirror)

use std::env;
use std::path::PathBuf;

use crate::config::defaults::SETTINGS_FILE;

/// Environment variable names for directory overrides
pub const ENV_CACHE_DIR: &str = "HPCPREREQS_CACHE_DIR";
pub const ENV_CONFIG_DIR: &str = "HPCPREREQS_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "HPCPREREQS_DATA_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "hpcprereqs";

/// Subdirectory names
const INSTALL_SUBDIR: &str = "opt";
const MIRROR_SUBDIR: &str = "mirror";
const PATCHES_SUBDIR: &str = "patches";
const STAGE_SUBDIR: &str = "stage";

/// Platform-specific directory provider
#[derive(Debug, Clone)]
pub struct HpcPrereqsDirs {
    cache_dir: PathBuf,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl HpcPrereqsDirs {
    /// Resolve directories, checking environment overrides first
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: resolve(ENV_CACHE_DIR, dirs::cache_dir, &[".cache"]),
            config_dir: resolve(ENV_CONFIG_DIR, dirs::config_dir, &[".config"]),
            data_dir: resolve(ENV_DATA_DIR, dirs::data_dir, &[".local", "share"]),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Default root for installation prefixes
    #[must_use]
    pub fn install_root(&self) -> PathBuf {
        self.data_dir.join(INSTALL_SUBDIR)
    }

    /// Default source mirror
    #[must_use]
    pub fn mirror_dir(&self) -> PathBuf {
        self.data_dir.join(MIRROR_SUBDIR)
    }

    /// Default patch file directory
    #[must_use]
    pub fn patches_dir(&self) -> PathBuf {
        self.data_dir.join(PATCHES_SUBDIR)
    }

    /// Default root for per-build scratch directories
    #[must_use]
    pub fn stage_root(&self) -> PathBuf {
        self.cache_dir.join(STAGE_SUBDIR)
    }

    /// Settings file path
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }
}

impl Default for HpcPrereqsDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(var: &str, platform: fn() -> Option<PathBuf>, home_fallback: &[&str]) -> PathBuf {
    if let Ok(path) = env::var(var) {
        return PathBuf::from(path);
    }
    platform().map(|p| p.join(APP_NAME)).unwrap_or_else(|| {
        let mut base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        for part in home_fallback {
            base.push(part);
        }
        base.join(APP_NAME)
    })
}
