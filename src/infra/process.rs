//! Build tool execution
//!
//! Every external program a recipe runs (configure, make, cmake, b2, tar,
//! patch, ...) goes through a [`ToolRunner`]. The environment overlay is
//! passed per invocation; the process environment is never modified.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;

use crate::error::BuildError;

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables set on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl ToolInvocation {
    /// Create an invocation with no arguments
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    /// Append arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the environment overlay
    #[must_use]
    pub fn envs(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Runs build tools
pub trait ToolRunner: Send + Sync {
    /// Run to completion; non-zero exit is a [`BuildError::ToolFailed`]
    fn run(&self, invocation: &ToolInvocation) -> Result<(), BuildError>;
}

/// Runs tools as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), BuildError> {
        tracing::debug!("[{}] {}", invocation.cwd.display(), invocation);

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(&invocation.cwd)
            .output()
            .map_err(|e| BuildError::ToolSpawn {
                program: invocation.program.clone(),
                error: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(BuildError::ToolFailed {
                program: invocation.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            })
        }
    }
}

/// Records invocations instead of running them
///
/// Used for dry runs and by embedding hosts that want to inspect what a
/// recipe would execute. Programs registered with [`fail_on`] report a
/// tool failure.
///
/// [`fail_on`]: RecordingRunner::fail_on
#[derive(Debug, Default)]
pub struct RecordingRunner {
    invocations: Mutex<Vec<ToolInvocation>>,
    failing: Vec<String>,
}

impl RecordingRunner {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every invocation whose program ends with `program`
    #[must_use]
    pub fn fail_on(mut self, program: &str) -> Self {
        self.failing.push(program.to_string());
        self
    }

    /// Invocations recorded so far
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Recorded invocations rendered as command lines
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations().iter().map(ToString::to_string).collect()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), BuildError> {
        tracing::debug!("[dry-run] {}", invocation);
        if let Ok(mut recorded) = self.invocations.lock() {
            recorded.push(invocation.clone());
        }

        if self.failing.iter().any(|p| invocation.program.ends_with(p.as_str())) {
            return Err(BuildError::ToolFailed {
                program: invocation.program.clone(),
                status: "exit status: 1".to_string(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let inv = ToolInvocation::new("./configure", "/tmp")
            .args(["--prefix=/opt/x", "CFLAGS=-g -O2"]);
        assert_eq!(inv.to_string(), "./configure --prefix=/opt/x 'CFLAGS=-g -O2'");
    }

    #[test]
    fn test_recording_runner_records_in_order() {
        let runner = RecordingRunner::new();
        runner.run(&ToolInvocation::new("make", "/src")).unwrap();
        runner
            .run(&ToolInvocation::new("make", "/src").args(["install"]))
            .unwrap();
        assert_eq!(runner.command_lines(), vec!["make", "make install"]);
    }

    #[test]
    fn test_recording_runner_simulated_failure() {
        let runner = RecordingRunner::new().fail_on("configure");
        let err = runner
            .run(&ToolInvocation::new("./configure", "/src"))
            .unwrap_err();
        assert!(matches!(err, BuildError::ToolFailed { .. }));
        assert_eq!(runner.invocations().len(), 1);
    }

    #[test]
    fn test_system_runner_reports_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SystemRunner
            .run(&ToolInvocation::new("sh", dir.path()).args(["-c", "echo oops >&2; exit 3"]))
            .unwrap_err();
        match err {
            BuildError::ToolFailed { program, stderr, .. } => {
                assert_eq!(program, "sh");
                assert_eq!(stderr, "oops");
            }
            other => panic!("Expected ToolFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_system_runner_passes_overlay() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut env = BTreeMap::new();
        env.insert("HPCPREREQS_TEST_VAR".to_string(), "yes".to_string());
        SystemRunner
            .run(
                &ToolInvocation::new("sh", dir.path())
                    .args(["-c", "test \"$HPCPREREQS_TEST_VAR\" = yes"])
                    .envs(env),
            )
            .unwrap();
        assert!(std::env::var("HPCPREREQS_TEST_VAR").is_err());
    }

    #[test]
    fn test_system_runner_missing_program() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SystemRunner
            .run(&ToolInvocation::new("hpcprereqs-no-such-tool", dir.path()))
            .unwrap_err();
        assert!(matches!(err, BuildError::ToolSpawn { .. }));
    }
}
