//! Default configuration values

/// Settings file name in the config directory
pub const SETTINGS_FILE: &str = "hpcprereqs.toml";

/// Manifest location relative to a prefix
pub const MANIFEST_PATH: &str = "etc/prereqs.txt";

/// Marker written into a prefix once its install completed
pub const INSTALLED_STAMP: &str = ".hpcprereqs-installed";

/// Default C flags for autotools recipes that fill empty flags
pub const DEFAULT_CFLAGS: [&str; 2] = ["-g", "-O2"];

/// Optimisation level appended when none is present
pub const DEFAULT_OPT_LEVEL: &str = "-O2";

/// Job cap for old Boost.Build releases
pub const BOOST_LEGACY_MAX_JOBS: usize = 64;
