//! Build context
//!
//! The [`BuildContext`] is what every lifecycle callback receives: the
//! concrete spec, its prefix, the staged source tree, an environment
//! overlay and the flags bound for the build tool's command line. All
//! external programs run through the context's [`ToolRunner`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::flags::FlagCategory;
use crate::core::spec::{ConcreteSpec, Prefix};
use crate::error::{BuildError, RecipeError};
use crate::infra::process::{ToolInvocation, ToolRunner};
use crate::infra::stage;

/// Environment variables set on top of the inherited environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    /// Empty overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Append space-separated flags to a variable
    pub fn append_flags(&mut self, key: &str, flags: &[String]) {
        if flags.is_empty() {
            return;
        }
        let joined = flags.join(" ");
        match self.vars.get_mut(key) {
            Some(existing) if !existing.is_empty() => {
                existing.push(' ');
                existing.push_str(&joined);
            }
            _ => {
                self.vars.insert(key.to_string(), joined);
            }
        }
    }

    /// Prepend a directory to a search-path variable
    ///
    /// The first prepend to a variable starts from the inherited value.
    pub fn prepend_path(&mut self, key: &str, dir: &Path) {
        let base = self
            .vars
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
            .unwrap_or_default();
        let value = if base.is_empty() {
            dir.display().to_string()
        } else {
            format!("{}:{base}", dir.display())
        };
        self.vars.insert(key.to_string(), value);
    }

    /// Snapshot for a process invocation
    pub fn to_env_map(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }
}

/// State shared by the lifecycle callbacks of one build
pub struct BuildContext<'a> {
    pub spec: &'a ConcreteSpec,
    /// Installation prefix of the package being built
    pub prefix: Prefix,
    /// Per-build scratch directory
    pub stage_dir: PathBuf,
    /// Root of the staged source tree
    pub source_dir: PathBuf,
    pub env: EnvOverlay,
    /// Parallel job count from the host
    pub jobs: usize,
    /// Whether the recipe allows parallel make
    pub parallel: bool,
    build_flags: Vec<(FlagCategory, Vec<String>)>,
    injected: Vec<(FlagCategory, Vec<String>)>,
    runner: &'a dyn ToolRunner,
}

impl std::fmt::Debug for BuildContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("spec", &self.spec.name)
            .field("prefix", &self.prefix)
            .field("source_dir", &self.source_dir)
            .field("env", &self.env)
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl<'a> BuildContext<'a> {
    /// Context with `CC`/`CXX` set from the spec's compiler
    pub fn new(
        spec: &'a ConcreteSpec,
        prefix: Prefix,
        stage_dir: PathBuf,
        runner: &'a dyn ToolRunner,
    ) -> Self {
        let mut env = EnvOverlay::new();
        env.set("CC", spec.compiler.cc.display().to_string());
        env.set("CXX", spec.compiler.cxx.display().to_string());
        Self {
            spec,
            prefix,
            source_dir: stage_dir.join("src"),
            stage_dir,
            env,
            jobs: 1,
            parallel: true,
            build_flags: Vec::new(),
            injected: Vec::new(),
            runner,
        }
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize, parallel: bool) -> Self {
        self.jobs = jobs.max(1);
        self.parallel = parallel;
        self
    }

    /// Queue flags for the build tool's command line
    pub fn add_build_system_flags(&mut self, category: FlagCategory, flags: Vec<String>) {
        if flags.is_empty() {
            return;
        }
        match self.build_flags.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => existing.extend(flags),
            None => self.build_flags.push((category, flags)),
        }
    }

    /// Queued flags as `VAR=flags` arguments
    pub fn build_system_flags(&self) -> Vec<String> {
        self.build_flags
            .iter()
            .map(|(category, flags)| format!("{}={}", category.env_var(), flags.join(" ")))
            .collect()
    }

    /// Record flags meant for the compiler wrapper
    ///
    /// They are exported as `HPCPREREQS_<VAR>` for a host wrapper to pick
    /// up, and [`cmake`](Self::cmake) folds them into the matching
    /// `CMAKE_<LANG>_FLAGS` cache entries. Autotools builds see them only
    /// through a wrapper.
    pub fn inject_flags(&mut self, category: FlagCategory, flags: Vec<String>) {
        if flags.is_empty() {
            return;
        }
        self.env.append_flags(&category.wrapper_var(), &flags);
        match self.injected.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => existing.extend(flags),
            None => self.injected.push((category, flags)),
        }
    }

    /// Jobs for make-like tools: 1 when the recipe builds serially
    pub fn make_jobs(&self) -> usize {
        if self.parallel {
            self.jobs
        } else {
            1
        }
    }

    /// Prefix of a resolved dependency
    pub fn dep(&self, name: &str) -> Result<&'a Prefix, RecipeError> {
        self.spec.prefix_of(name)
    }

    /// Run a program in the source root
    pub fn run<I, S>(&self, program: &str, args: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_in(&self.source_dir, program, args)
    }

    /// Run a program in `dir`
    pub fn run_in<I, S>(&self, dir: &Path, program: &str, args: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = ToolInvocation::new(program, dir)
            .args(args)
            .envs(self.env.to_env_map());
        self.runner.run(&invocation)
    }

    /// Run `<dir>/configure --prefix=<prefix> <args> <build-system flags>`
    pub fn configure_in(&self, dir: &Path, args: &[String]) -> Result<(), BuildError> {
        let mut all = vec![format!("--prefix={}", self.prefix)];
        all.extend(args.iter().cloned());
        all.extend(self.build_system_flags());
        self.run_in(dir, &dir.join("configure").display().to_string(), all)
    }

    /// `make -jN <targets>` in the source root
    pub fn make(&self, targets: &[&str]) -> Result<(), BuildError> {
        self.make_in(&self.source_dir, targets)
    }

    /// `make -jN <targets>` in `dir`
    pub fn make_in(&self, dir: &Path, targets: &[&str]) -> Result<(), BuildError> {
        let mut args = vec![format!("-j{}", self.make_jobs())];
        args.extend(targets.iter().map(ToString::to_string));
        self.run_in(dir, "make", args)
    }

    /// `cmake <args>` in the source root, with injected flags merged in
    pub fn cmake(&self, args: &[String]) -> Result<(), BuildError> {
        let mut args = args.to_vec();
        for (category, flags) in &self.injected {
            for var in cmake_flag_vars(*category) {
                merge_cache_entry(&mut args, var, &flags.join(" "));
            }
        }
        self.run("cmake", args)
    }

    /// Regex-edit a file relative to the source root
    pub fn filter_file(&self, rel: &str, pattern: &str, replacement: &str) -> Result<usize, BuildError> {
        stage::filter_file(&self.source_dir.join(rel), pattern, replacement)
    }
}

/// CMake cache entries a flag category feeds
fn cmake_flag_vars(category: FlagCategory) -> &'static [&'static str] {
    match category {
        FlagCategory::CFlags => &["CMAKE_C_FLAGS"],
        FlagCategory::CxxFlags => &["CMAKE_CXX_FLAGS"],
        FlagCategory::FFlags => &["CMAKE_Fortran_FLAGS"],
        FlagCategory::CppFlags => &["CMAKE_C_FLAGS", "CMAKE_CXX_FLAGS"],
        FlagCategory::LdFlags => &["CMAKE_EXE_LINKER_FLAGS", "CMAKE_SHARED_LINKER_FLAGS"],
        FlagCategory::LdLibs => &["CMAKE_C_STANDARD_LIBRARIES", "CMAKE_CXX_STANDARD_LIBRARIES"],
    }
}

/// Append `flags` to `-D<var>=...`, adding the entry if absent
fn merge_cache_entry(args: &mut Vec<String>, var: &str, flags: &str) {
    let key = format!("-D{var}=");
    match args.iter_mut().find(|a| a.starts_with(&key)) {
        Some(arg) if arg.len() > key.len() => {
            arg.push(' ');
            arg.push_str(flags);
        }
        Some(arg) => arg.push_str(flags),
        None => args.push(format!("{key}{flags}")),
    }
}
