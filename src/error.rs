//! Error types for hpcprereqs
//!
//! Domain-specific error types using thiserror. Configuration errors
//! ([`VariantError`], [`RecipeError`]) are raised before any build tool
//! runs; [`BuildError`] covers everything that happens once a build
//! context exists.

use std::path::PathBuf;
use thiserror::Error;

/// Variant declaration and selection errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariantError {
    /// Variant is not declared by the recipe
    #[error("Recipe '{recipe}' has no variant named '{name}'")]
    Unknown { recipe: String, name: String },

    /// Value has the wrong kind (bool vs. choice)
    #[error("Variant '{name}' has invalid type: expected {expected}, got '{got}'")]
    InvalidType {
        name: String,
        expected: String,
        got: String,
    },

    /// Value outside the closed domain
    #[error("Variant '{name}' has invalid value '{value}': must be one of {choices:?}")]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },

    /// Nothing selected from a required-at-least-one group
    #[error("At least one of {{{}}} must be enabled", members.join(", "))]
    EmptyGroup { group: String, members: Vec<String> },

    /// Combination cannot be installed under one layout
    #[error("Cannot build {} together: {reason}", selected.join(" and "))]
    UnsupportedCombination {
        group: String,
        selected: Vec<String>,
        reason: String,
    },

    /// Malformed variant request
    #[error("Invalid variant request '{0}'")]
    ParseError(String),
}

/// Recipe configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecipeError {
    /// Recipe not present in the repository
    #[error("No recipe named '{name}'")]
    UnknownRecipe { name: String },

    /// Requested version not declared
    #[error("Recipe '{recipe}' has no version '{version}'")]
    UnknownVersion { recipe: String, version: String },

    /// Recipe declares no versions at all
    #[error("Recipe '{recipe}' declares no versions")]
    NoVersions { recipe: String },

    /// A declared dependency edge has no resolved prefix
    #[error("Recipe '{recipe}' requires '{dependency}' but no prefix was resolved for it")]
    MissingPrefix { recipe: String, dependency: String },

    /// A file expected after installation is absent everywhere
    #[error("Required file '{}' not found (searched: {})", path.display(), searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    RequiredFileMissing { path: PathBuf, searched: Vec<PathBuf> },

    /// Autoreconf ran but left no configure script
    #[error("configure script not found in {}", dir.display())]
    ConfigureScriptMissing { dir: PathBuf },

    /// Malformed spec string
    #[error("Invalid spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// Unknown flag category name
    #[error("Unknown flag category '{0}'")]
    UnknownFlagCategory(String),

    /// Variant error
    #[error(transparent)]
    Variant(#[from] VariantError),
}

/// Dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    /// Circular dependency detected
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// Dependency conflict
    #[error("Dependency conflict: {message}")]
    Conflict { message: String },

    /// Missing dependency
    #[error("Missing dependency: '{dependency}' required by '{package}'")]
    MissingDependency { package: String, dependency: String },
}

/// Filesystem errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to copy file
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },

    /// Failed to create symlink
    #[error("Failed to link '{link}' -> '{target}': {error}")]
    Symlink {
        link: PathBuf,
        target: PathBuf,
        error: String,
    },
}

/// Build errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Wrapped build tool exited with failure
    #[error("{program} failed ({status}): {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// Build tool could not be started
    #[error("Failed to run {program}: {error}")]
    ToolSpawn { program: String, error: String },

    /// Patch file missing
    #[error("Patch '{patch}' for '{recipe}' not found at {}", path.display())]
    PatchNotFound {
        recipe: String,
        patch: String,
        path: PathBuf,
    },

    /// Patch did not apply
    #[error("Patch '{patch}' failed to apply: {error}")]
    PatchFailed { patch: String, error: String },

    /// Source could not be located in the mirror
    #[error("No source for '{recipe}' (searched: {})", searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    SourceNotFound {
        recipe: String,
        searched: Vec<PathBuf>,
    },

    /// Archive checksum mismatch
    #[error("Checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// Configuration error surfaced during the build
    #[error("Configuration error: {0}")]
    Config(#[from] RecipeError),

    /// Filesystem error
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

impl From<VariantError> for BuildError {
    fn from(e: VariantError) -> Self {
        Self::Config(RecipeError::Variant(e))
    }
}

/// Top-level hpcprereqs error type
#[derive(Error, Debug)]
pub enum HpcPrereqsError {
    /// Recipe error
    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    /// Resolver error
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// Build error for one package
    #[error("Build of '{package}' failed: {source}")]
    Build { package: String, source: BuildError },

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}

impl From<VariantError> for HpcPrereqsError {
    fn from(e: VariantError) -> Self {
        Self::Recipe(RecipeError::Variant(e))
    }
}
