//! libiberty, built out of the binutils source tree

use crate::core::context::BuildContext;
use crate::core::flags::{FlagCategory, FlagPlacement, FlagPolicy, FlagTarget};
use crate::core::lifecycle::Lifecycle;
use crate::core::recipe::{Recipe, RecipeDefinition};
use crate::core::spec::Compiler;
use crate::error::BuildError;
use crate::recipes::build_system::{autotools_in, strings};

pub struct Libiberty {
    def: RecipeDefinition,
    cflags: FlagPolicy,
}

impl Libiberty {
    pub fn new() -> Self {
        let def = RecipeDefinition::new(
            "libiberty",
            "The libiberty.a library from GNU binutils, built position independent",
        )
        .homepage("https://www.gnu.org/software/binutils/")
        .version(
            "2.29.1",
            "https://ftp.gnu.org/gnu/binutils/binutils-2.29.1.tar.bz2",
            "9af59a2ca3488823e453bb356fe0f113",
        );

        let cflags = FlagPolicy::new(FlagCategory::CFlags, FlagTarget::Environment)
            .with_defaults(&["-g", "-O"]);

        Self { def, cflags }
    }
}

impl Default for Libiberty {
    fn default() -> Self {
        Self::new()
    }
}

fn configure_args(_: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    Ok(strings(&["--enable-install-libiberty"]))
}

impl Recipe for Libiberty {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    // Static archive is linked into shared objects downstream
    fn flag_handler(&self, category: FlagCategory, flags: Vec<String>, compiler: &Compiler) -> FlagPlacement {
        self.cflags.apply(category, flags, &[compiler.pic_flag()])
    }

    fn lifecycle(&self) -> Lifecycle {
        autotools_in("libiberty", configure_args)
    }
}
