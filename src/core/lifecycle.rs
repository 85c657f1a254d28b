//! Lifecycle phases
//!
//! A recipe registers typed callbacks against named phases. The host runs
//! staging and patch files itself, then every registered callback in
//! phase order; callbacks for the same phase run in registration order.

use std::fmt;

use crate::core::context::BuildContext;
use crate::error::BuildError;

/// Build phase, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Source edits after patch files are applied
    Patch,
    /// Regenerate the build system
    Autoreconf,
    /// Configure or generate
    Configure,
    /// Compile
    Build,
    /// Install into the prefix
    Install,
    /// Normalise the installed tree
    PostInstall,
}

impl Phase {
    /// All phases in order
    pub const ALL: [Phase; 6] = [
        Self::Patch,
        Self::Autoreconf,
        Self::Configure,
        Self::Build,
        Self::Install,
        Self::PostInstall,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Patch => "patch",
            Self::Autoreconf => "autoreconf",
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Install => "install",
            Self::PostInstall => "post-install",
        })
    }
}

/// Phase callback
pub type PhaseFn = Box<dyn Fn(&mut BuildContext<'_>) -> Result<(), BuildError> + Send + Sync>;

/// A registered callback
pub struct Step {
    pub phase: Phase,
    pub name: String,
    pub run: PhaseFn,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("phase", &self.phase)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered set of phase callbacks
#[derive(Debug, Default)]
pub struct Lifecycle {
    steps: Vec<Step>,
}

impl Lifecycle {
    /// Empty lifecycle
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    #[must_use]
    pub fn on<F>(mut self, phase: Phase, name: &str, run: F) -> Self
    where
        F: Fn(&mut BuildContext<'_>) -> Result<(), BuildError> + Send + Sync + 'static,
    {
        self.steps.push(Step {
            phase,
            name: name.to_string(),
            run: Box::new(run),
        });
        // Stable: keeps registration order within a phase
        self.steps.sort_by_key(|s| s.phase);
        self
    }

    /// Drop every callback registered for `phase`
    #[must_use]
    pub fn without(mut self, phase: Phase) -> Self {
        self.steps.retain(|s| s.phase != phase);
        self
    }

    /// Callbacks in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// `phase:name` labels in execution order
    pub fn labels(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|s| format!("{}:{}", s.phase, s.name))
            .collect()
    }

    /// Run every callback in order, stopping at the first failure
    pub fn run(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
        for step in &self.steps {
            tracing::info!("{}: {} ({})", ctx.spec.name, step.phase, step.name);
            (step.run)(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut BuildContext<'_>) -> Result<(), BuildError> {
        Ok(())
    }

    #[test]
    fn test_steps_sorted_by_phase() {
        let lifecycle = Lifecycle::new()
            .on(Phase::PostInstall, "copy-headers", noop)
            .on(Phase::Configure, "configure", noop)
            .on(Phase::Install, "install", noop)
            .on(Phase::PostInstall, "copy-libs", noop)
            .on(Phase::Patch, "filter", noop);

        assert_eq!(
            lifecycle.labels(),
            vec![
                "patch:filter",
                "configure:configure",
                "install:install",
                "post-install:copy-headers",
                "post-install:copy-libs",
            ]
        );
    }

    #[test]
    fn test_without_removes_phase() {
        let lifecycle = Lifecycle::new()
            .on(Phase::Configure, "configure", noop)
            .on(Phase::Build, "make", noop)
            .without(Phase::Configure);
        assert_eq!(lifecycle.labels(), vec!["build:make"]);
    }

    #[test]
    fn test_phase_order() {
        let mut sorted = Phase::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Phase::ALL.to_vec());
    }
}
