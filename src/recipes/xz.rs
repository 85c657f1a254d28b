//! XZ Utils (liblzma)

use crate::config::defaults::DEFAULT_OPT_LEVEL;
use crate::core::context::BuildContext;
use crate::core::flags::{DebugPosition, FlagCategory, FlagPlacement, FlagPolicy, FlagTarget};
use crate::core::lifecycle::Lifecycle;
use crate::core::recipe::{Recipe, RecipeDefinition};
use crate::core::spec::Compiler;
use crate::error::BuildError;
use crate::recipes::build_system::{autotools, strings};

pub struct Xz {
    def: RecipeDefinition,
    cflags: FlagPolicy,
}

impl Xz {
    pub fn new() -> Self {
        let def = RecipeDefinition::new(
            "xz",
            "General-purpose data compression software with a high compression ratio (LZMA)",
        )
        .homepage("http://tukaani.org/xz/")
        .version(
            "5.2.3",
            "http://tukaani.org/xz/xz-5.2.3.tar.bz2",
            "1592e7ca3eece099b03b35f4d9179e7c",
        );

        let cflags = FlagPolicy::new(FlagCategory::CFlags, FlagTarget::BuildSystem)
            .ensure_debug(DebugPosition::Back)
            .ensure_optimization(DEFAULT_OPT_LEVEL);

        Self { def, cflags }
    }
}

impl Default for Xz {
    fn default() -> Self {
        Self::new()
    }
}

fn configure_args(_: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    Ok(strings(&["--enable-shared", "--enable-static", "--enable-threads=yes"]))
}

impl Recipe for Xz {
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
