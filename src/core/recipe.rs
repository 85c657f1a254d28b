//! Recipe definitions
//!
//! A recipe has a static, declarative half ([`RecipeDefinition`]: versions,
//! sources, dependency edges, variants, patches) and a behavioural half
//! (the [`Recipe`] trait: flag handling, validation and the lifecycle
//! callbacks the host runs in order).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::flags::{FlagCategory, FlagPlacement};
use crate::core::lifecycle::Lifecycle;
use crate::core::spec::{Compiler, ConcreteSpec, Platform};
use crate::core::variants::{VariantDef, VariantGroup, VariantRequest, VariantSelection};
use crate::core::version::{RecipeVersion, VersionRange};
use crate::error::{RecipeError, VariantError};

/// How a dependency is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    /// Needed only while building (tools)
    Build,
    /// Linked into this package
    Link,
    /// Needed only by consumers at run time
    Run,
}

impl UsageKind {
    /// Whether the dependency must be installed before this build starts
    pub fn orders_build(self) -> bool {
        matches!(self, Self::Build | Self::Link)
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Build => "build",
            Self::Link => "link",
            Self::Run => "run",
        })
    }
}

/// When a dependency edge applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Boolean variant is on
    VariantEnabled(String),
    /// Boolean variant is off
    VariantDisabled(String),
    /// Version falls in a range
    Version(VersionRange),
    /// Target architecture matches
    TargetArch(String),
}

impl Condition {
    /// Evaluate against the dependent's resolved state
    pub fn holds(
        &self,
        version: &RecipeVersion,
        variants: &VariantSelection,
        platform: &Platform,
    ) -> Result<bool, VariantError> {
        Ok(match self {
            Self::Always => true,
            Self::VariantEnabled(name) => variants.enabled(name)?,
            Self::VariantDisabled(name) => !variants.enabled(name)?,
            Self::Version(range) => range.contains(version),
            Self::TargetArch(arch) => &platform.arch == arch,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => Ok(()),
            Self::VariantEnabled(v) => write!(f, "when +{v}"),
            Self::VariantDisabled(v) => write!(f, "when ~{v}"),
            Self::Version(range) => write!(f, "when @{range}"),
            Self::TargetArch(arch) => write!(f, "when target={arch}"),
        }
    }
}

/// A dependency edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Target recipe name
    pub name: String,
    pub kind: UsageKind,
    pub when: Condition,
    /// Variants the dependency must be built with
    pub variants: Vec<VariantRequest>,
}

/// Source-control reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitRef {
    Branch(String),
    Commit(String),
    Tag(String),
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(b) => write!(f, "branch {b}"),
            Self::Commit(c) => write!(f, "commit {c}"),
            Self::Tag(t) => write!(f, "tag {t}"),
        }
    }
}

/// Where a version's source comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceLocator {
    /// Archive with an integrity token
    Archive { url: String, checksum: String },
    /// Checkout, no integrity token
    Git {
        git: String,
        #[serde(flatten)]
        git_ref: GitRef,
    },
    /// Nothing to fetch (meta packages)
    Bundle,
}

impl SourceLocator {
    /// Archive source
    pub fn archive(url: &str, checksum: &str) -> Self {
        Self::Archive {
            url: url.to_string(),
            checksum: checksum.to_string(),
        }
    }

    /// Git source
    pub fn git(url: &str, git_ref: GitRef) -> Self {
        Self::Git {
            git: url.to_string(),
            git_ref,
        }
    }

    /// Archive file name, if this is an archive
    pub fn archive_filename(&self) -> Option<&str> {
        match self {
            Self::Archive { url, .. } => url.rsplit('/').next(),
            Self::Git { .. } | Self::Bundle => None,
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive { url, .. } => f.write_str(url),
            Self::Git { git, git_ref } => write!(f, "{git} ({git_ref})"),
            Self::Bundle => f.write_str("(no source)"),
        }
    }
}

/// A declared version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecl {
    pub version: RecipeVersion,
    pub source: SourceLocator,
    pub preferred: bool,
}

/// Extra source tree staged alongside the main one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub source: SourceLocator,
    /// Directory under the stage root; the resource lands in
    /// `<destination>/<name>`, next to the main source tree when empty
    pub destination: String,
}

/// Declarative half of a recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDefinition {
    pub name: String,
    pub description: String,
    pub homepage: String,
    /// Versions in declaration order
    pub versions: Vec<VersionDecl>,
    /// Dependency edges in declaration order
    pub dependencies: Vec<Dependency>,
    pub variants: BTreeMap<String, VariantDef>,
    pub variant_groups: Vec<VariantGroup>,
    /// Patch file names, applied in order before any build step
    pub patches: Vec<String>,
    pub resources: Vec<Resource>,
    /// Whether the build tool may run parallel jobs
    pub parallel: bool,
}

impl RecipeDefinition {
    /// Start a definition
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            homepage: String::new(),
            versions: Vec::new(),
            dependencies: Vec::new(),
            variants: BTreeMap::new(),
            variant_groups: Vec::new(),
            patches: Vec::new(),
            resources: Vec::new(),
            parallel: true,
        }
    }

    #[must_use]
    pub fn homepage(mut self, url: &str) -> Self {
        self.homepage = url.to_string();
        self
    }

    /// Archive version with checksum
    #[must_use]
    pub fn version(mut self, version: &str, url: &str, checksum: &str) -> Self {
        self.versions.push(VersionDecl {
            version: RecipeVersion::new(version),
            source: SourceLocator::archive(url, checksum),
            preferred: false,
        });
        self
    }

    /// Source-control version
    #[must_use]
    pub fn git_version(mut self, version: &str, url: &str, git_ref: GitRef) -> Self {
        self.versions.push(VersionDecl {
            version: RecipeVersion::new(version),
            source: SourceLocator::git(url, git_ref),
            preferred: false,
        });
        self
    }

    /// Version with no source to stage
    #[must_use]
    pub fn bundle_version(mut self, version: &str) -> Self {
        self.versions.push(VersionDecl {
            version: RecipeVersion::new(version),
            source: SourceLocator::Bundle,
            preferred: false,
        });
        self
    }

    /// Mark the most recently declared version as preferred
    #[must_use]
    pub fn preferred(mut self) -> Self {
        if let Some(last) = self.versions.last_mut() {
            last.preferred = true;
        }
        self
    }

    /// Unconditional dependency
    #[must_use]
    pub fn depends_on(self, name: &str, kind: UsageKind) -> Self {
        self.depends_on_when(name, kind, Condition::Always)
    }

    /// Conditional dependency
    #[must_use]
    pub fn depends_on_when(mut self, name: &str, kind: UsageKind, when: Condition) -> Self {
        self.dependencies.push(Dependency {
            name: name.to_string(),
            kind,
            when,
            variants: Vec::new(),
        });
        self
    }

    /// Require variants on the most recently declared dependency
    #[must_use]
    pub fn with_dependency_variants(mut self, variants: &[VariantRequest]) -> Self {
        if let Some(last) = self.dependencies.last_mut() {
            last.variants.extend_from_slice(variants);
        }
        self
    }

    #[must_use]
    pub fn variant(mut self, name: &str, def: VariantDef) -> Self {
        self.variants.insert(name.to_string(), def);
        self
    }

    #[must_use]
    pub fn variant_group(mut self, group: VariantGroup) -> Self {
        self.variant_groups.push(group);
        self
    }

    #[must_use]
    pub fn patch(mut self, file: &str) -> Self {
        self.patches.push(file.to_string());
        self
    }

    #[must_use]
    pub fn resource(mut self, name: &str, source: SourceLocator, destination: &str) -> Self {
        self.resources.push(Resource {
            name: name.to_string(),
            source,
            destination: destination.to_string(),
        });
        self
    }

    /// Build serially
    #[must_use]
    pub fn serial(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Look up a declared version
    pub fn find_version(&self, version: &str) -> Result<&VersionDecl, RecipeError> {
        let wanted = RecipeVersion::new(version);
        self.versions
            .iter()
            .find(|v| v.version == wanted)
            .ok_or_else(|| RecipeError::UnknownVersion {
                recipe: self.name.clone(),
                version: version.to_string(),
            })
    }

    /// Version used when none is requested
    ///
    /// A version marked preferred wins; otherwise the highest numeric
    /// version; otherwise the first declared.
    pub fn default_version(&self) -> Result<&VersionDecl, RecipeError> {
        if let Some(v) = self.versions.iter().find(|v| v.preferred) {
            return Ok(v);
        }
        self.versions
            .iter()
            .filter(|v| v.version.is_numeric())
            .max_by(|a, b| a.version.cmp(&b.version))
            .or_else(|| self.versions.first())
            .ok_or_else(|| RecipeError::NoVersions {
                recipe: self.name.clone(),
            })
    }
}

/// Behaviour of a recipe
pub trait Recipe: Send + Sync {
    /// Static definition
    fn definition(&self) -> &RecipeDefinition;

    /// Recipe name
    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Decide placement of one flag category
    ///
    /// The default hands everything to the compiler wrapper unchanged.
    fn flag_handler(
        &self,
        _category: FlagCategory,
        flags: Vec<String>,
        _compiler: &Compiler,
    ) -> FlagPlacement {
        FlagPlacement::Inject(flags)
    }

    /// Validate the resolved variant combination before building
    fn validate(&self, spec: &ConcreteSpec) -> Result<(), VariantError> {
        for group in &self.definition().variant_groups {
            group.check(&spec.variants)?;
        }
        Ok(())
    }

    /// Ordered build phases
    fn lifecycle(&self) -> Lifecycle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variants::VariantDef;

    fn sample() -> RecipeDefinition {
        RecipeDefinition::new("dyninst", "Instrumentation library")
            .git_version(
                "master",
                "https://github.com/dyninst/dyninst.git",
                GitRef::Branch("master".to_string()),
            )
            .preferred()
            .git_version(
                "parallel",
                "https://github.com/dyninst/dyninst.git",
                GitRef::Branch("new-parallel-parsing".to_string()),
            )
            .depends_on("boost", UsageKind::Link)
            .depends_on_when(
                "intel-tbb",
                UsageKind::Link,
                Condition::Version(VersionRange::exactly("parallel")),
            )
            .variant("openmp", VariantDef::boolean(false, "Enable OpenMP support"))
    }

    #[test]
    fn test_preferred_version_wins() {
        assert_eq!(sample().default_version().unwrap().version.as_str(), "master");
    }

    #[test]
    fn test_highest_numeric_version_without_preference() {
        let def = RecipeDefinition::new("xz", "lzma")
            .version("5.2.2", "https://example.com/xz-5.2.2.tar.bz2", "0")
            .version("5.2.3", "https://example.com/xz-5.2.3.tar.bz2", "1")
            .version("5.0", "https://example.com/xz-5.0.tar.bz2", "2");
        assert_eq!(def.default_version().unwrap().version.as_str(), "5.2.3");
    }

    #[test]
    fn test_no_versions_is_error() {
        let def = RecipeDefinition::new("empty", "nothing");
        assert!(matches!(
            def.default_version(),
            Err(RecipeError::NoVersions { .. })
        ));
    }

    #[test]
    fn test_unknown_version() {
        assert!(matches!(
            sample().find_version("johnmc"),
            Err(RecipeError::UnknownVersion { .. })
        ));
        assert!(sample().find_version("parallel").is_ok());
    }

    #[test]
    fn test_conditions() {
        let def = sample();
        let variants = VariantSelection::resolve("dyninst", &def.variants, &[], &[]).unwrap();
        let platform = Platform::new("linux", "x86_64");
        let tbb = &def.dependencies[1];

        assert!(!tbb
            .when
            .holds(&RecipeVersion::new("master"), &variants, &platform)
            .unwrap());
        assert!(tbb
            .when
            .holds(&RecipeVersion::new("parallel"), &variants, &platform)
            .unwrap());
        assert!(Condition::TargetArch("x86_64".to_string())
            .holds(&RecipeVersion::new("master"), &variants, &platform)
            .unwrap());
        assert!(Condition::VariantDisabled("openmp".to_string())
            .holds(&RecipeVersion::new("master"), &variants, &platform)
            .unwrap());
    }

    #[test]
    fn test_archive_filename() {
        let src = SourceLocator::archive("http://zlib.net/fossils/zlib-1.2.11.tar.gz", "x");
        assert_eq!(src.archive_filename(), Some("zlib-1.2.11.tar.gz"));
    }

    #[test]
    fn test_usage_kind_ordering() {
        assert!(UsageKind::Link.orders_build());
        assert!(UsageKind::Build.orders_build());
        assert!(!UsageKind::Run.orders_build());
    }
}
