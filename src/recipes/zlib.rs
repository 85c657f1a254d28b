//! zlib compression library

use crate::config::defaults::DEFAULT_OPT_LEVEL;
use crate::core::flags::{DebugPosition, FlagCategory, FlagPlacement, FlagPolicy, FlagTarget};
use crate::core::lifecycle::Lifecycle;
use crate::core::recipe::{Recipe, RecipeDefinition};
use crate::core::spec::Compiler;
use crate::recipes::build_system::{autotools, no_args};

pub struct Zlib {
    def: RecipeDefinition,
    cflags: FlagPolicy,
}

impl Zlib {
    pub fn new() -> Self {
        let def = RecipeDefinition::new(
            "zlib",
            "A free, general-purpose, legally unencumbered lossless data-compression library",
        )
        .homepage("http://zlib.net")
        .version(
            "1.2.11",
            "http://zlib.net/fossils/zlib-1.2.11.tar.gz",
            "1c9f62f0778697a09d36121ead88e08e",
        );

        // zlib's configure reads CFLAGS from the environment only
        let cflags = FlagPolicy::new(FlagCategory::CFlags, FlagTarget::Environment)
            .ensure_debug(DebugPosition::Back)
            .ensure_optimization(DEFAULT_OPT_LEVEL);

        Self { def, cflags }
    }
}

impl Default for Zlib {
    fn default() -> Self {
        Self::new()
    }
}

impl Recipe for Zlib {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn flag_handler(&self, category: FlagCategory, flags: Vec<String>, _: &Compiler) -> FlagPlacement {
        self.cflags.apply(category, flags, &[])
    }

    fn lifecycle(&self) -> Lifecycle {
        autotools(no_args)
    }
}
