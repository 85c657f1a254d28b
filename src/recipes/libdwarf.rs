//! libdwarf (library only, no dwarfdump)

use crate::core::context::BuildContext;
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::core::recipe::{Recipe, RecipeDefinition, UsageKind};
use crate::error::BuildError;
use crate::infra::{filesystem, stage};

/// Headers elfutils installs that would shadow libdwarf's own
const CONFLICTING_HEADERS: [&str; 1] = ["dwarf.h"];

pub struct Libdwarf {
    def: RecipeDefinition,
}

impl Libdwarf {
    pub fn new() -> Self {
        let def = RecipeDefinition::new("libdwarf", "Library for reading DWARF debugging information")
            .homepage("http://www.prevanders.net/dwarf.html")
            .version(
                "20170709",
                "https://www.prevanders.net/libdwarf-20170709.tar.gz",
                "68a3c9aa7d01a433924a74bda588b378",
            )
            .depends_on("elfutils", UsageKind::Link)
            .depends_on("zlib", UsageKind::Link)
            .patch("make.patch")
            .patch("typedef.patch")
            .serial();

        Self { def }
    }
}

impl Default for Libdwarf {
    fn default() -> Self {
        Self::new()
    }
}

fn configure(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    let elf = ctx.dep("elfutils")?;
    let zlib = ctx.dep("zlib")?;

    // elfutils ships a dwarf.h of its own; compile against a view of its
    // include dir without it
    let elf_include = stage::shadow_include_dir(
        &elf.include(),
        &ctx.stage_dir.join("elf-include"),
        &CONFLICTING_HEADERS,
    )?;

    let dir = ctx.source_dir.join("libdwarf");
    // --disable-fpic is broken upstream, so both archives are PIC
    ctx.run_in(
        &dir,
        &dir.join("configure").display().to_string(),
        [
            "--enable-shared".to_string(),
            format!(
                "CPPFLAGS=-I{} -I{}",
                elf_include.display(),
                zlib.include().display()
            ),
            format!(
                "LDFLAGS=-L{} -L{}",
                elf.lib().display(),
                zlib.lib().display()
            ),
        ],
    )
}

fn install(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    let built = ctx.source_dir.join("libdwarf");
    let include = ctx.prefix.include();
    let lib = ctx.prefix.lib();
    filesystem::create_dir_all(&include)?;
    filesystem::create_dir_all(&lib)?;

    for header in ["dwarf.h", "libdwarf.h"] {
        filesystem::install_into(&built.join(header), &include)?;
    }
    for archive in ["libdwarf.a", "libdwarf.so"] {
        filesystem::install_into(&built.join(archive), &lib)?;
    }
    Ok(())
}

impl Recipe for Libdwarf {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new()
            .on(Phase::Configure, "configure", configure)
            .on(Phase::Build, "make", |ctx| {
                ctx.make_in(&ctx.source_dir.join("libdwarf"), &[])
            })
            .on(Phase::Install, "install", install)
    }
}
