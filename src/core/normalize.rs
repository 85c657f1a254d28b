//! Post-install normalization
//!
//! Some packages install headers or libraries in places their consumers do
//! not look (`include/libiberty/`, `lib64/`). A [`NormalizeStep`] puts a
//! file at the expected path, taking it from the first existing candidate.
//! Steps never overwrite or delete: a target that already exists is left
//! alone, so running a step twice is harmless.

use std::path::{Path, PathBuf};

use crate::error::{BuildError, RecipeError};
use crate::infra::filesystem;

/// Result of applying a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was placed from the given candidate
    Applied(PathBuf),
    /// Target already present; nothing done
    AlreadyPresent,
}

/// One normalization action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeStep {
    /// Copy the first existing candidate to `target`
    CopyIfMissing {
        target: PathBuf,
        candidates: Vec<PathBuf>,
    },
    /// Link `target` to the first existing candidate
    SymlinkIfMissing {
        target: PathBuf,
        candidates: Vec<PathBuf>,
    },
}

impl NormalizeStep {
    /// Copy from a single source
    pub fn copy(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::CopyIfMissing {
            target: target.into(),
            candidates: vec![source.into()],
        }
    }

    /// Copy from the first of several sources
    pub fn copy_first(candidates: Vec<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::CopyIfMissing {
            target: target.into(),
            candidates,
        }
    }

    /// Symlink to a single source
    pub fn link(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::SymlinkIfMissing {
            target: target.into(),
            candidates: vec![source.into()],
        }
    }

    pub fn target(&self) -> &Path {
        match self {
            Self::CopyIfMissing { target, .. } | Self::SymlinkIfMissing { target, .. } => target,
        }
    }

    fn candidates(&self) -> &[PathBuf] {
        match self {
            Self::CopyIfMissing { candidates, .. } | Self::SymlinkIfMissing { candidates, .. } => {
                candidates
            }
        }
    }

    /// Apply the step
    ///
    /// Fails with [`RecipeError::RequiredFileMissing`] when the target is
    /// absent and no candidate exists.
    pub fn apply(&self) -> Result<Outcome, BuildError> {
        let target = self.target();
        if target.symlink_metadata().is_ok() {
            tracing::debug!("{} already present", target.display());
            return Ok(Outcome::AlreadyPresent);
        }

        let source = self
            .candidates()
            .iter()
            .find(|c| c.exists())
            .ok_or_else(|| RecipeError::RequiredFileMissing {
                path: target.to_path_buf(),
                searched: self.candidates().to_vec(),
            })?;

        match self {
            Self::CopyIfMissing { .. } => filesystem::copy_file(source, target)?,
            Self::SymlinkIfMissing { .. } => {
                if let Some(parent) = target.parent() {
                    filesystem::create_dir_all(parent)?;
                }
                filesystem::symlink(source, target)?;
            }
        }
        tracing::info!("Placed {} from {}", target.display(), source.display());
        Ok(Outcome::Applied(source.clone()))
    }
}

/// Apply steps in order, stopping at the first failure
pub fn apply_all(steps: &[NormalizeStep]) -> Result<Vec<Outcome>, BuildError> {
    steps.iter().map(NormalizeStep::apply).collect()
}
