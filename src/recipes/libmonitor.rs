//! libmonitor process-control library

use crate::config::defaults::DEFAULT_CFLAGS;
use crate::core::context::BuildContext;
use crate::core::flags::{FlagCategory, FlagPlacement, FlagPolicy, FlagTarget};
use crate::core::lifecycle::Lifecycle;
use crate::core::recipe::{GitRef, Recipe, RecipeDefinition};
use crate::core::spec::Compiler;
use crate::core::variants::VariantDef;
use crate::error::BuildError;
use crate::recipes::build_system::autotools;

/// Signals libmonitor forwards to its client instead of handling itself
pub const CLIENT_SIGNALS: &str = "SIGBUS, SIGSEGV, SIGPROF, 36, 37, 38";

pub struct Libmonitor {
    def: RecipeDefinition,
    cflags: FlagPolicy,
}

impl Libmonitor {
    pub fn new() -> Self {
        let def = RecipeDefinition::new("libmonitor", "Libmonitor process control library")
            .homepage("https://github.com/hpctoolkit/libmonitor")
            .git_version(
                "2017.12.06",
                "https://github.com/hpctoolkit/libmonitor",
                GitRef::Commit("6be9bc85ff756198b9c7".to_string()),
            )
            .variant(
                "hpctoolkit",
                VariantDef::boolean(true, "Reserve the signals HPCToolkit's sampling uses"),
            );

        let cflags = FlagPolicy::new(FlagCategory::CFlags, FlagTarget::BuildSystem)
            .with_defaults(&DEFAULT_CFLAGS);

        Self { def, cflags }
    }
}

impl Default for Libmonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn configure_args(ctx: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    let mut args = Vec::new();
    if ctx.spec.enabled("hpctoolkit")? {
        args.push(format!("--enable-client-signals={CLIENT_SIGNALS}"));
    }
    Ok(args)
}

impl Recipe for Libmonitor {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn flag_handler(&self, category: FlagCategory, flags: Vec<String>, _: &Compiler) -> FlagPlacement {
        self.cflags.apply(category, flags, &[])
    }

    fn lifecycle(&self) -> Lifecycle {
        autotools(configure_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::Prefix;
    use crate::core::variants::VariantRequest;
    use crate::infra::process::RecordingRunner;
    use crate::recipes::testing::spec_for;
    use std::path::PathBuf;

    fn configure_args_for(variants: &[VariantRequest]) -> Vec<String> {
        let spec = spec_for("libmonitor", variants);
        let runner = RecordingRunner::new();
        let mut ctx = BuildContext::new(&spec, Prefix::new("/opt/m"), PathBuf::from("/s"), &runner);
        ctx.add_build_system_flags(FlagCategory::CFlags, vec!["-g".to_string(), "-O2".to_string()]);
        Libmonitor::new().lifecycle().run(&mut ctx).unwrap();
        runner.invocations()[0].args.clone()
    }

    #[test]
    fn test_client_signals_by_default() {
        assert_eq!(
            configure_args_for(&[]),
            vec![
                "--prefix=/opt/m".to_string(),
                "--enable-client-signals=SIGBUS, SIGSEGV, SIGPROF, 36, 37, 38".to_string(),
                "CFLAGS=-g -O2".to_string(),
            ]
        );
    }

    #[test]
    fn test_plain_monitor() {
        let args = configure_args_for(&[VariantRequest::disable("hpctoolkit")]);
        assert!(!args.iter().any(|a| a.starts_with("--enable-client-signals")));
    }

    #[test]
    fn test_default_cflags() {
        let gcc = Compiler::new("gcc", "gcc", "g++");
        let placed = Libmonitor::new().flag_handler(FlagCategory::CFlags, vec![], &gcc);
        assert_eq!(placed.flags(), ["-g", "-O2"]);
        assert!(matches!(placed, FlagPlacement::BuildSystem(_)));
    }
}
