//! Local build driver
//!
//! Runs a [`BuildPlan`] package by package, in order:
//!
//! 1. Skip packages whose prefix carries the installed stamp
//! 2. Stage the source (and resources) from the mirror into a fresh stage
//! 3. Apply the recipe's patch files
//! 4. Route host flags through the recipe's flag hook
//! 5. Run the recipe lifecycle, then stamp the prefix
//!
//! The first failure stops the run, so nothing that depends on a failed
//! package is attempted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::INSTALLED_STAMP;
use crate::core::context::BuildContext;
use crate::core::flags::{FlagCategory, FlagPlacement};
use crate::core::recipe::Recipe;
use crate::core::repository::Repository;
use crate::core::resolver::{BuildPlan, PlannedBuild};
use crate::core::spec::{ConcreteSpec, Prefix};
use crate::error::{BuildError, HpcPrereqsError};
use crate::infra::filesystem;
use crate::infra::process::ToolRunner;
use crate::infra::stage;

/// Driver settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Directory holding pre-fetched archives and checkouts
    pub mirror: PathBuf,
    /// Directory holding `<recipe>/<patch>` files
    pub patches: PathBuf,
    /// Root for per-build scratch directories
    pub stage_root: PathBuf,
    pub jobs: usize,
    /// Flags the host wants, per category
    ///
    /// Categories a recipe leaves to the compiler wrapper are exported as
    /// `HPCPREREQS_<VAR>` and merged into cmake's `CMAKE_<LANG>_FLAGS`.
    /// Autotools and plain make builds only see them when the host's `CC`
    /// and `CXX` are wrappers that read those variables.
    pub host_flags: BTreeMap<FlagCategory, Vec<String>>,
    /// Keep stage directories after a successful build
    pub keep_stage: bool,
}

impl DriverConfig {
    pub fn new(mirror: impl Into<PathBuf>, patches: impl Into<PathBuf>, stage_root: impl Into<PathBuf>) -> Self {
        Self {
            mirror: mirror.into(),
            patches: patches.into(),
            stage_root: stage_root.into(),
            jobs: num_cpus::get(),
            host_flags: BTreeMap::new(),
            keep_stage: false,
        }
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    #[must_use]
    pub fn with_host_flags(mut self, category: FlagCategory, flags: Vec<String>) -> Self {
        self.host_flags.insert(category, flags);
        self
    }
}

/// Progress notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    /// Prefix already complete
    Skipped { name: String, prefix: Prefix },
    Started { name: String },
    Installed { name: String, prefix: Prefix },
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<(String, Prefix)>,
    pub skipped: Vec<(String, Prefix)>,
}

/// Route every category of host flags through a recipe's flag hook
pub fn flag_placements(
    recipe: &dyn Recipe,
    spec: &ConcreteSpec,
    host_flags: &BTreeMap<FlagCategory, Vec<String>>,
) -> Vec<(FlagCategory, FlagPlacement)> {
    FlagCategory::ALL
        .into_iter()
        .map(|category| {
            let flags = host_flags.get(&category).cloned().unwrap_or_default();
            (category, recipe.flag_handler(category, flags, &spec.compiler))
        })
        .collect()
}

/// Whether `prefix` holds a completed install
pub fn is_installed(prefix: &Prefix) -> bool {
    prefix.join(INSTALLED_STAMP).is_file()
}

/// Runs build plans
pub struct Driver<'a> {
    repo: &'a Repository,
    config: DriverConfig,
    runner: &'a dyn ToolRunner,
}

impl<'a> Driver<'a> {
    pub fn new(repo: &'a Repository, config: DriverConfig, runner: &'a dyn ToolRunner) -> Self {
        Self {
            repo,
            config,
            runner,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run a plan
    pub fn install(&self, plan: &BuildPlan) -> Result<InstallReport, HpcPrereqsError> {
        self.install_with(plan, &mut |_| {})
    }

    /// Run a plan, reporting progress to `observer`
    pub fn install_with(
        &self,
        plan: &BuildPlan,
        observer: &mut dyn FnMut(InstallEvent),
    ) -> Result<InstallReport, HpcPrereqsError> {
        let mut report = InstallReport::default();

        for planned in &plan.builds {
            let name = planned.spec.name.clone();
            if is_installed(&planned.prefix) {
                tracing::info!("{name} already installed in {}", planned.prefix);
                observer(InstallEvent::Skipped {
                    name: name.clone(),
                    prefix: planned.prefix.clone(),
                });
                report.skipped.push((name, planned.prefix.clone()));
                continue;
            }

            observer(InstallEvent::Started { name: name.clone() });
            self.build(planned).map_err(|source| {
                tracing::error!("{name} failed: {source}");
                HpcPrereqsError::Build {
                    package: name.clone(),
                    source,
                }
            })?;
            observer(InstallEvent::Installed {
                name: name.clone(),
                prefix: planned.prefix.clone(),
            });
            report.installed.push((name, planned.prefix.clone()));
        }

        Ok(report)
    }

    /// Build and install one package
    pub fn build(&self, planned: &PlannedBuild) -> Result<(), BuildError> {
        let spec = &planned.spec;
        let recipe = self.repo.get(&spec.name)?;
        let def = recipe.definition();
        tracing::info!("Building {spec}");

        let stage_dir = self.config.stage_root.join(spec.prefix_dir_name());
        filesystem::remove_dir_all(&stage_dir)?;
        filesystem::create_dir_all(&stage_dir)?;

        if planned.prefix.path().exists() {
            tracing::warn!("Removing incomplete prefix {}", planned.prefix);
            filesystem::remove_dir_all(planned.prefix.path())?;
        }
        filesystem::create_dir_all(planned.prefix.path())?;

        let mut ctx = BuildContext::new(spec, planned.prefix.clone(), stage_dir.clone(), self.runner)
            .with_jobs(self.config.jobs, def.parallel);

        // Source and resources
        let decl = def.find_version(spec.version.as_str())?;
        stage::stage_source(
            self.runner,
            &spec.name,
            &self.config.mirror,
            &format!("{}-{}", spec.name, spec.version),
            &decl.source,
            &ctx.source_dir,
        )?;
        for resource in &def.resources {
            let dest = stage_dir.join(&resource.destination).join(&resource.name);
            stage::stage_source(
                self.runner,
                &spec.name,
                &self.config.mirror,
                &resource.name,
                &resource.source,
                &dest,
            )?;
        }

        // Patch files
        for patch in &def.patches {
            let path = self.patch_path(&spec.name, patch);
            if !path.is_file() {
                return Err(BuildError::PatchNotFound {
                    recipe: spec.name.clone(),
                    patch: patch.clone(),
                    path,
                });
            }
            tracing::info!("{}: applying {patch}", spec.name);
            stage::apply_patch(self.runner, &ctx.source_dir, &path)?;
        }

        // Flags
        for (category, placement) in flag_placements(recipe, spec, &self.config.host_flags) {
            tracing::debug!("{}: {category} -> {placement:?}", spec.name);
            match placement {
                FlagPlacement::Inject(flags) => ctx.inject_flags(category, flags),
                FlagPlacement::Environment(flags) => ctx.env.append_flags(category.env_var(), &flags),
                FlagPlacement::BuildSystem(flags) => ctx.add_build_system_flags(category, flags),
            }
        }

        // Dependency tools first on PATH, in declaration order
        for dep in spec.dependencies.iter().rev() {
            let bin = dep.prefix.bin();
            if bin.is_dir() {
                ctx.env.prepend_path("PATH", &bin);
            }
        }

        recipe.lifecycle().run(&mut ctx)?;

        filesystem::write_file(&planned.prefix.join(INSTALLED_STAMP), &format!("{spec}\n"))?;
        if !self.config.keep_stage {
            filesystem::remove_dir_all(&stage_dir)?;
        }
        tracing::info!("Installed {} into {}", spec.name, planned.prefix);
        Ok(())
    }

    fn patch_path(&self, recipe: &str, patch: &str) -> PathBuf {
        self.config.patches.join(recipe).join(patch)
    }

    /// Patch files a recipe needs that are missing
    pub fn missing_patches(&self, recipe: &str) -> Result<Vec<PathBuf>, HpcPrereqsError> {
        let def = self.repo.get(recipe)?.definition();
        Ok(def
            .patches
            .iter()
            .map(|p| self.patch_path(recipe, p))
            .filter(|p| !Path::is_file(p))
            .collect())
    }
}
