//! libunwind call-chain unwinder

use crate::config::defaults::DEFAULT_CFLAGS;
use crate::core::context::BuildContext;
use crate::core::flags::{FlagCategory, FlagPlacement, FlagPolicy, FlagTarget};
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::core::recipe::{GitRef, Recipe, RecipeDefinition, UsageKind};
use crate::core::spec::Compiler;
use crate::error::{BuildError, RecipeError};
use crate::recipes::build_system::{autotools, strings};

pub struct Libunwind {
    def: RecipeDefinition,
    cflags: FlagPolicy,
}

impl Libunwind {
    pub fn new() -> Self {
        let def = RecipeDefinition::new(
            "libunwind",
            "A library for unwinding the call stack of a running program",
        )
        .homepage("http://www.nongnu.org/libunwind/")
        .git_version(
            "2018.01.17",
            "https://github.com/libunwind/libunwind",
            GitRef::Commit("7d6cc6696ab8a808da3d".to_string()),
        )
        .depends_on("xz", UsageKind::Link);

        let cflags = FlagPolicy::new(FlagCategory::CFlags, FlagTarget::BuildSystem)
            .with_defaults(&DEFAULT_CFLAGS);

        Self { def, cflags }
    }
}

impl Default for Libunwind {
    fn default() -> Self {
        Self::new()
    }
}

/// Regenerate the build system from the checkout
///
/// Runs autoreconf directly so the host needs no perl or m4 recipes.
fn autoreconf(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    ctx.run("autoreconf", ["-f", "-i"])?;
    if !ctx.source_dir.join("configure").is_file() {
        return Err(RecipeError::ConfigureScriptMissing {
            dir: ctx.source_dir.clone(),
        }
        .into());
    }
    Ok(())
}

fn configure_args(_: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    Ok(strings(&[
        "--enable-shared",
        "--enable-static",
        "--enable-minidebuginfo",
        "--disable-coredump",
        "--disable-ptrace",
        "--disable-setjmp",
        "--disable-tests",
    ]))
}

impl Recipe for Libunwind {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn flag_handler(&self, category: FlagCategory, flags: Vec<String>, _: &Compiler) -> FlagPlacement {
        self.cflags.apply(category, flags, &[])
    }

    fn lifecycle(&self) -> Lifecycle {
        autotools(configure_args).on(Phase::Autoreconf, "autoreconf", autoreconf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::Prefix;
    use crate::infra::process::RecordingRunner;
    use crate::recipes::testing::spec_for;
    use tempfile::TempDir;

    #[test]
    fn test_autoreconf_runs_before_configure() {
        let stage = TempDir::new().unwrap();
        std::fs::create_dir_all(stage.path().join("src")).unwrap();
        std::fs::write(stage.path().join("src/configure"), "#!/bin/sh\n").unwrap();

        let spec = spec_for("libunwind", &[]);
        let runner = RecordingRunner::new();
        let mut ctx = BuildContext::new(&spec, Prefix::new("/opt/u"), stage.path().to_path_buf(), &runner);
        Libunwind::new().lifecycle().run(&mut ctx).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines[0], "autoreconf -f -i");
        assert!(lines[1].ends_with(
            "configure --prefix=/opt/u --enable-shared --enable-static --enable-minidebuginfo \
             --disable-coredump --disable-ptrace --disable-setjmp --disable-tests"
        ));
    }

    #[test]
    fn test_missing_configure_is_configuration_error() {
        let stage = TempDir::new().unwrap();
        let spec = spec_for("libunwind", &[]);
        let runner = RecordingRunner::new();
        let mut ctx = BuildContext::new(&spec, Prefix::new("/opt/u"), stage.path().to_path_buf(), &runner);

        let err = Libunwind::new().lifecycle().run(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Config(RecipeError::ConfigureScriptMissing { .. })
        ));
        // configure never ran
        assert_eq!(runner.invocations().len(), 1);
    }

    #[test]
    fn test_lifecycle_labels() {
        assert_eq!(
            Libunwind::new().lifecycle().labels(),
            vec![
                "autoreconf:autoreconf",
                "configure:configure",
                "build:make",
                "install:make-install"
            ]
        );
    }
}
