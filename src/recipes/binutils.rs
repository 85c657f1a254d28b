//! GNU binutils

use crate::config::defaults::DEFAULT_CFLAGS;
use crate::core::context::BuildContext;
use crate::core::flags::{FlagCategory, FlagPlacement, FlagPolicy, FlagTarget};
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::core::normalize::{self, NormalizeStep};
use crate::core::recipe::{Recipe, RecipeDefinition, UsageKind};
use crate::core::spec::Compiler;
use crate::core::variants::VariantDef;
use crate::error::BuildError;
use crate::recipes::build_system::{autotools, strings};

pub struct Binutils {
    def: RecipeDefinition,
    cflags: FlagPolicy,
}

impl Binutils {
    pub fn new() -> Self {
        let def = RecipeDefinition::new("binutils", "GNU binutils: linker, assembler and BFD")
            .homepage("https://www.gnu.org/software/binutils/")
            .version(
                "2.28.1",
                "https://ftp.gnu.org/gnu/binutils/binutils-2.28.1.tar.bz2",
                "569a85c66421b16cfaa43b5f986db3bb",
            )
            .depends_on("zlib", UsageKind::Run)
            .variant(
                "libiberty",
                VariantDef::boolean(true, "Also install libiberty.a and its headers"),
            )
            .patch("basename.patch")
            .patch("config.patch");

        let cflags = FlagPolicy::new(FlagCategory::CFlags, FlagTarget::BuildSystem)
            .with_defaults(&DEFAULT_CFLAGS);

        Self { def, cflags }
    }
}

impl Default for Binutils {
    fn default() -> Self {
        Self::new()
    }
}

fn configure_args(ctx: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    let mut args = strings(&["--enable-targets=all"]);
    if ctx.spec.enabled("libiberty")? {
        args.push("--enable-install-libiberty".to_string());
    }
    args.push("--disable-werror".to_string());
    Ok(args)
}

/// Lay the prefix out the way the toolkit's configure expects
///
/// Headers move up from `include/libiberty/`, `libiberty.a` from `lib64/`,
/// and a copy of zlib's static archive sits next to the BFD libraries.
pub fn layout_steps(ctx: &BuildContext<'_>) -> Result<Vec<NormalizeStep>, BuildError> {
    let prefix = &ctx.prefix;
    let mut steps = Vec::new();

    if ctx.spec.enabled("libiberty")? {
        for header in ["demangle.h", "libiberty.h"] {
            steps.push(NormalizeStep::copy(
                prefix.include().join("libiberty").join(header),
                prefix.include().join(header),
            ));
        }
        steps.push(NormalizeStep::copy(
            prefix.lib64().join("libiberty.a"),
            prefix.lib().join("libiberty.a"),
        ));
    }

    let zlib = ctx.dep("zlib")?;
    steps.push(NormalizeStep::copy(
        zlib.lib().join("libz.a"),
        prefix.lib().join("libz.a"),
    ));
    Ok(steps)
}

fn normalize_layout(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    normalize::apply_all(&layout_steps(ctx)?)?;
    Ok(())
}

impl Recipe for Binutils {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn flag_handler(&self, category: FlagCategory, flags: Vec<String>, _: &Compiler) -> FlagPlacement {
        self.cflags.apply(category, flags, &[])
    }

    fn lifecycle(&self) -> Lifecycle {
        autotools(configure_args).on(Phase::PostInstall, "normalize-layout", normalize_layout)
    }
}
