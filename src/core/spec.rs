//! Concrete specs
//!
//! A [`ConcreteSpec`] is one recipe pinned to a version, a resolved variant
//! selection, a platform, a compiler and the installation prefix of every
//! dependency. Recipes read everything they need from it; prefix lookups
//! fail fast when a declared dependency was not resolved.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::recipe::UsageKind;
use crate::core::variants::VariantSelection;
use crate::core::version::{RecipeVersion, VersionRange};
use crate::error::{RecipeError, VariantError};

/// Target platform tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system (`linux`, `darwin`, ...)
    pub os: String,
    /// Target architecture (`x86_64`, `ppc64le`, `aarch64`, ...)
    pub arch: String,
}

impl Platform {
    /// Create a platform tag
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Platform this binary runs on
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        Self::new(os, std::env::consts::ARCH)
    }

    /// Whether the OS is Darwin
    pub fn is_darwin(&self) -> bool {
        self.os == "darwin"
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Compiler selection provided by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compiler {
    /// Identifying name (`gcc`, `clang`, `intel`, `pgi`, `xl`)
    pub name: String,
    /// C compiler path
    pub cc: PathBuf,
    /// C++ compiler path
    pub cxx: PathBuf,
}

impl Compiler {
    /// Create a compiler selection
    pub fn new(name: &str, cc: impl Into<PathBuf>, cxx: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            cc: cc.into(),
            cxx: cxx.into(),
        }
    }

    /// Pick the first toolchain found on `PATH`, falling back to `cc`/`c++`
    pub fn detect() -> Self {
        const CANDIDATES: [(&str, &str, &str); 3] = [
            ("gcc", "gcc", "g++"),
            ("clang", "clang", "clang++"),
            ("intel", "icc", "icpc"),
        ];
        for (name, cc, cxx) in CANDIDATES {
            if let (Ok(cc), Ok(cxx)) = (which::which(cc), which::which(cxx)) {
                return Self::new(name, cc, cxx);
            }
        }
        Self::new("gcc", "cc", "c++")
    }

    /// File name of the C++ compiler (`g++`, `clang++`, ...)
    pub fn cxx_name(&self) -> String {
        self.cxx
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Flag producing position-independent code
    pub fn pic_flag(&self) -> &'static str {
        match self.name.as_str() {
            "pgi" => "-fpic",
            "xl" => "-qpic",
            _ => "-fPIC",
        }
    }

    /// Flag enabling `OpenMP`
    pub fn openmp_flag(&self) -> &'static str {
        match self.name.as_str() {
            "intel" => "-qopenmp",
            "pgi" => "-mp",
            "xl" => "-qsmp=omp",
            _ => "-fopenmp",
        }
    }
}

/// An installation prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prefix(PathBuf);

impl Prefix {
    /// Wrap a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Prefix root
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// `<prefix>/<rel>`
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.0.join(rel)
    }

    pub fn bin(&self) -> PathBuf {
        self.join("bin")
    }

    pub fn include(&self) -> PathBuf {
        self.join("include")
    }

    pub fn lib(&self) -> PathBuf {
        self.join("lib")
    }

    pub fn lib64(&self) -> PathBuf {
        self.join("lib64")
    }

    pub fn etc(&self) -> PathBuf {
        self.join("etc")
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A dependency with its installed prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub kind: UsageKind,
    pub prefix: Prefix,
    /// Hash of the dependency's own spec (or of its prefix path for externals)
    pub hash: String,
}

/// Fully resolved spec for one recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteSpec {
    pub name: String,
    pub version: RecipeVersion,
    pub variants: VariantSelection,
    pub platform: Platform,
    pub compiler: Compiler,
    /// Dependencies in declaration order
    pub dependencies: Vec<ResolvedDependency>,
}

impl ConcreteSpec {
    /// Prefix of a dependency
    pub fn prefix_of(&self, dependency: &str) -> Result<&Prefix, RecipeError> {
        self.dependencies
            .iter()
            .find(|d| d.name == dependency)
            .map(|d| &d.prefix)
            .ok_or_else(|| RecipeError::MissingPrefix {
                recipe: self.name.clone(),
                dependency: dependency.to_string(),
            })
    }

    /// Whether a boolean variant is on
    pub fn enabled(&self, variant: &str) -> Result<bool, VariantError> {
        self.variants.enabled(variant)
    }

    /// Whether the version lies in `range`
    pub fn version_in(&self, range: &VersionRange) -> bool {
        range.contains(&self.version)
    }

    /// Short content hash over the spec and its dependency hashes
    pub fn dag_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        for dep in &self.dependencies {
            hasher.update(b"\0");
            hasher.update(dep.name.as_bytes());
            hasher.update(b"/");
            hasher.update(dep.hash.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        digest[..8].to_string()
    }

    /// Directory name for this spec's prefix: `name-version-hash`
    pub fn prefix_dir_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.dag_hash())
    }
}

impl fmt::Display for ConcreteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}{} %{} arch={}",
            self.name, self.version, self.variants, self.compiler.name, self.platform
        )
    }
}
