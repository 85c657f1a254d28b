//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use commands::{Commands, Session};
use output::OutputConfig;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ", built ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    " for ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
    ")"
);

/// hpcprereqs - build the HPCToolkit prerequisite stack
///
/// Resolves recipe specs into build plans and installs each package into
/// its own prefix.
#[derive(Parser, Debug)]
#[command(name = "hpcprereqs")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (defaults to hpcprereqs.toml in the config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn output(&self) -> OutputConfig {
        OutputConfig::new(self.quiet, self.json, self.verbose)
    }

    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = self.output();
        if let Some(cmd) = self.command {
            let session = Session::open(self.config.as_deref(), output)?;
            cmd.run(&session)
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["hpcprereqs", "list", "-vv", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::List)));
    }

    #[test]
    fn test_parse_install_options() {
        let cli = Cli::try_parse_from([
            "hpcprereqs",
            "--config",
            "/tmp/s.toml",
            "install",
            "boost@1.66.0+taggedlayout",
            "--jobs",
            "8",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.toml")));
        match cli.command {
            Some(Commands::Install { spec, jobs, dry_run }) => {
                assert_eq!(spec, "boost@1.66.0+taggedlayout");
                assert_eq!(jobs, Some(8));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_flags_requires_category() {
        assert!(Cli::try_parse_from(["hpcprereqs", "flags", "zlib"]).is_err());
    }
}
