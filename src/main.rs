//! hpcprereqs CLI - build the HPCToolkit prerequisite stack
//!
//! Entry point for the hpcprereqs command-line application.

use anyhow::Result;
use clap::Parser;

use hpcprereqs::cli::output::display_error;
use hpcprereqs::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = cli.output();

    // RUST_LOG wins over the verbosity flags
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.run() {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
