//! Intel XED, decoder only
//!
//! XED builds with its own `mbuild` tool, which it expects checked out
//! next to the source tree. The static and shared libraries come from two
//! separate builds of the same tree.

use std::path::{Path, PathBuf};

use crate::core::context::BuildContext;
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::core::recipe::{GitRef, Recipe, RecipeDefinition, SourceLocator};
use crate::error::{BuildError, FilesystemError};
use crate::infra::filesystem;

pub struct IntelXed {
    def: RecipeDefinition,
}

impl IntelXed {
    pub fn new() -> Self {
        let def = RecipeDefinition::new("intel-xed", "The Intel x86 instruction encoder decoder library")
            .homepage("https://intelxed.github.io/")
            .git_version(
                "2017.11.07",
                "https://github.com/intelxed/xed",
                GitRef::Commit("0f857b386f1885c4".to_string()),
            )
            .resource(
                "mbuild",
                SourceLocator::git(
                    "https://github.com/intelxed/mbuild",
                    GitRef::Commit("9eefb36a01167e56".to_string()),
                ),
                "",
            );

        Self { def }
    }
}

impl Default for IntelXed {
    fn default() -> Self {
        Self::new()
    }
}

/// `mfile.py` build arguments
pub fn mfile_args(jobs: usize, shared: bool) -> Vec<String> {
    let mut args = vec![
        "-j".to_string(),
        jobs.to_string(),
        "--debug".to_string(),
        "--opt=2".to_string(),
    ];
    if shared {
        args.push("--shared".to_string());
    }
    args.push("--no-encoder".to_string());
    args.push("--no-werror".to_string());
    args
}

/// Built libraries in `obj/` with the given extension, sorted
pub fn built_libraries(obj: &Path, extension: &str) -> Result<Vec<PathBuf>, FilesystemError> {
    let suffix = format!(".{extension}");
    let mut found = Vec::new();
    let entries = std::fs::read_dir(obj).map_err(|e| FilesystemError::ReadFile {
        path: obj.to_path_buf(),
        error: e.to_string(),
    })?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("lib") && name.ends_with(&suffix) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

fn build_and_install(ctx: &BuildContext<'_>, shared: bool) -> Result<(), BuildError> {
    let mfile = ctx.source_dir.join("mfile.py").display().to_string();
    ctx.run(&mfile, ["--clean"])?;
    ctx.run(&mfile, mfile_args(ctx.make_jobs(), shared))?;

    let lib = ctx.prefix.lib();
    filesystem::create_dir_all(&lib)?;
    let extension = if shared { "so" } else { "a" };
    for built in built_libraries(&ctx.source_dir.join("obj"), extension)? {
        filesystem::install_into(&built, &lib)?;
    }
    Ok(())
}

impl Recipe for IntelXed {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new()
            .on(Phase::Install, "static-libs", |ctx| build_and_install(ctx, false))
            .on(Phase::Install, "shared-libs", |ctx| build_and_install(ctx, true))
            .on(Phase::Install, "headers", |ctx| {
                filesystem::copy_tree(&ctx.source_dir.join("include/public"), &ctx.prefix.include())?;
                Ok(())
            })
    }
}
