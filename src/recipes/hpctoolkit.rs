//! HPCToolkit itself, the consumer of every other recipe here

use crate::core::context::BuildContext;
use crate::core::lifecycle::Lifecycle;
use crate::core::recipe::{Condition, GitRef, Recipe, RecipeDefinition, UsageKind};
use crate::core::variants::{VariantDef, VariantRequest};
use crate::error::BuildError;
use crate::recipes::build_system::autotools;

/// XED decodes x86 only
const XED_ARCH: &str = "x86_64";

pub struct Hpctoolkit {
    def: RecipeDefinition,
}

impl Hpctoolkit {
    pub fn new() -> Self {
        let def = RecipeDefinition::new(
            "hpctoolkit",
            "Integrated suite of tools for measurement and analysis of program performance",
        )
        .homepage("http://hpctoolkit.org")
        .git_version(
            "config",
            "https://github.com/mwkrentel/hpctoolkit.git",
            GitRef::Branch("config".to_string()),
        )
        .variant(
            "papi",
            VariantDef::boolean(false, "Use PAPI instead of libpfm4 for hardware counters"),
        )
        .depends_on("binutils", UsageKind::Link)
        .with_dependency_variants(&[VariantRequest::enable("libiberty")])
        .depends_on("boost", UsageKind::Link)
        .depends_on("bzip2", UsageKind::Link)
        .depends_on("dyninst", UsageKind::Link)
        .depends_on("elfutils", UsageKind::Link)
        .depends_on("intel-tbb", UsageKind::Link)
        .depends_on_when(
            "intel-xed",
            UsageKind::Link,
            Condition::TargetArch(XED_ARCH.to_string()),
        )
        .depends_on("libdwarf", UsageKind::Link)
        .depends_on("libmonitor", UsageKind::Link)
        .with_dependency_variants(&[VariantRequest::enable("hpctoolkit")])
        .depends_on_when("papi", UsageKind::Link, Condition::VariantEnabled("papi".to_string()))
        .depends_on_when(
            "libpfm4",
            UsageKind::Link,
            Condition::VariantDisabled("papi".to_string()),
        )
        .depends_on("libunwind", UsageKind::Link)
        .depends_on("xerces-c", UsageKind::Link)
        .depends_on("xz", UsageKind::Link)
        .depends_on("zlib", UsageKind::Link);

        Self { def }
    }
}

impl Default for Hpctoolkit {
    fn default() -> Self {
        Self::new()
    }
}

/// `--with-<option>=<prefix>` for every dependency, with exactly one
/// hardware-counter backend and XED only on x86_64 targets
pub fn configure_args(ctx: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    let backend = if ctx.spec.enabled("papi")? {
        ("papi", "papi")
    } else {
        ("perfmon", "libpfm4")
    };
    let xed = (ctx.spec.platform.arch == XED_ARCH).then_some(("xed2", "intel-xed"));
    let options = [
        Some(("binutils", "binutils")),
        Some(("boost", "boost")),
        Some(("bzip", "bzip2")),
        Some(("symtabAPI", "dyninst")),
        Some(("libelf", "elfutils")),
        Some(("tbb", "intel-tbb")),
        xed,
        Some(("libdwarf", "libdwarf")),
        Some(("libmonitor", "libmonitor")),
        Some(backend),
        Some(("libunwind", "libunwind")),
        Some(("xerces", "xerces-c")),
        Some(("lzma", "xz")),
        Some(("zlib", "zlib")),
    ];

    let mut args = Vec::with_capacity(options.len());
    for (option, dep) in options.into_iter().flatten() {
        args.push(format!("--with-{option}={}", ctx.dep(dep)?));
    }
    Ok(args)
}

impl Recipe for Hpctoolkit {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn lifecycle(&self) -> Lifecycle {
        autotools(configure_args)
    }
}
