//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod flags;
pub mod info;
pub mod install;
pub mod list;
pub mod order;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

use crate::cli::output::OutputConfig;
use crate::config::settings::Settings;
use crate::core::repository::Repository;
use crate::core::resolver::{BuildPlan, Concretizer, SpecRequest};
use crate::infra::dirs::HpcPrereqsDirs;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available recipes
    List,

    /// Show versions, variants and dependencies of a recipe
    Info {
        /// Recipe name
        name: String,
    },

    /// Show the concretized build order for a spec
    Order {
        /// Spec, e.g. `dyninst@parallel+openmp`
        spec: String,
    },

    /// Show where a recipe places flags of one category
    Flags {
        /// Spec of the recipe to ask
        spec: String,

        /// Flag category (cflags, cxxflags, fflags, cppflags, ldflags, ldlibs)
        #[arg(short, long)]
        category: String,

        /// Flags the host would pass, space separated
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        flags: String,
    },

    /// Build and install a spec and its dependencies
    Install {
        /// Spec to install
        spec: String,

        /// Number of parallel make jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Print the plan without building anything
        #[arg(long)]
        dry_run: bool,
    },
}

impl Commands {
    /// Execute the command
    pub fn run(self, session: &Session) -> Result<()> {
        match self {
            Self::List => list::execute(session),
            Self::Info { name } => info::execute(session, &name),
            Self::Order { spec } => order::execute(session, &spec),
            Self::Flags {
                spec,
                category,
                flags,
            } => flags::execute(session, &spec, &category, &flags),
            Self::Install { spec, jobs, dry_run } => {
                install::execute(session, &spec, install::InstallOptions { jobs, dry_run })
            }
        }
    }
}

/// Everything a command needs: settings, directories and recipes
pub struct Session {
    pub dirs: HpcPrereqsDirs,
    pub settings: Settings,
    pub repo: Repository,
    pub output: OutputConfig,
}

impl Session {
    /// Load settings from `config` (or the default location)
    pub fn open(config: Option<&Path>, output: OutputConfig) -> Result<Self> {
        let dirs = HpcPrereqsDirs::new();
        let path = Settings::locate(config, &dirs);
        if config.is_some() && !path.exists() {
            anyhow::bail!("Settings file {} does not exist", path.display());
        }
        let settings = Settings::load_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        Ok(Self {
            dirs,
            settings,
            repo: Repository::builtin(),
            output,
        })
    }

    /// Concretize a spec string into a build plan
    pub fn plan(&self, spec: &str) -> Result<BuildPlan> {
        let request = SpecRequest::parse(spec).with_context(|| format!("Invalid spec '{spec}'"))?;
        let concretizer = Concretizer::new(
            &self.repo,
            self.settings.platform(),
            self.settings.compiler(),
            self.settings.install_root(&self.dirs),
        )
        .with_externals(self.settings.externals.clone());
        concretizer
            .concretize(&request)
            .with_context(|| format!("Failed to concretize '{spec}'"))
    }
}
