//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars,
//! status prefixes, and error reports to the user.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// How results are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Only errors are printed
    pub quiet: bool,
    /// Machine-readable JSON instead of text
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Log filter matching the verbosity flags
    pub fn log_directive(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, _) => "debug",
        }
    }

    /// Progress bars only make sense for interactive text output
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Print a line of text unless quiet or in JSON mode
    pub fn line(&self, text: impl AsRef<str>) {
        if !self.quiet && !self.json {
            println!("{}", text.as_ref());
        }
    }

    /// Print `value` as pretty JSON
    pub fn emit_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Create a progress bar for build steps
pub fn create_build_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} packages ({msg})")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("█▓▒░"));
    pb.set_style(style);
    pb
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Skipped or already present
    pub const SKIPPED: &str = "•";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directive_follows_flags() {
        assert_eq!(OutputConfig::new(false, false, 0).log_directive(), "warn");
        assert_eq!(OutputConfig::new(false, false, 1).log_directive(), "info");
        assert_eq!(OutputConfig::new(false, false, 3).log_directive(), "debug");
        assert_eq!(OutputConfig::new(true, false, 2).log_directive(), "error");
    }

    #[test]
    fn test_progress_hidden_for_json() {
        assert!(OutputConfig::new(false, false, 0).show_progress());
        assert!(!OutputConfig::new(false, true, 0).show_progress());
        assert!(!OutputConfig::new(true, false, 0).show_progress());
    }
}
