//! Boost C++ libraries
//!
//! Builds the compiled Boost libraries HPCToolkit links against with
//! Boost.Build. Every library is a boolean variant; when none is selected
//! only the headers are installed.
//!
//! Single- and multi-threaded builds use the same file names under the
//! `system` layout, so installing both into one prefix requires the
//! `tagged` layout, which suffixes artifact names.

use std::path::Path;

use crate::config::defaults::BOOST_LEGACY_MAX_JOBS;
use crate::core::context::BuildContext;
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::core::normalize::{self, NormalizeStep};
use crate::core::recipe::{Recipe, RecipeDefinition};
use crate::core::spec::ConcreteSpec;
use crate::core::variants::{CoInstall, VariantDef, VariantGroup};
use crate::core::version::{RecipeVersion, VersionRange};
use crate::error::{BuildError, FilesystemError, VariantError};
use crate::infra::filesystem;

/// Compiled libraries that can be selected, all on by default
pub const LIBRARIES: [&str; 6] = ["atomic", "chrono", "date_time", "filesystem", "system", "thread"];

/// Threading variants and the `threading=` value each one builds
const THREADING: [(&str, &str); 2] = [("multithreaded", "multi"), ("singlethreaded", "single")];

pub struct Boost {
    def: RecipeDefinition,
}

impl Boost {
    pub fn new() -> Self {
        let mut def = RecipeDefinition::new("boost", "Free peer-reviewed portable C++ source libraries")
            .homepage("http://www.boost.org")
            .version(
                "1.65.1",
                &source_url("1.65.1"),
                "41d7542ce40e171f3f7982aff008ff0d",
            );

        for lib in LIBRARIES {
            def = def.variant(
                lib,
                VariantDef::boolean(true, &format!("Compile with {lib} library")),
            );
        }

        let def = def
            .variant("debug", VariantDef::boolean(false, "Switch to the debug version of Boost"))
            .variant("shared", VariantDef::boolean(true, "Additionally build shared libraries"))
            .variant(
                "multithreaded",
                VariantDef::boolean(true, "Build multi-threaded versions of libraries"),
            )
            .variant(
                "singlethreaded",
                VariantDef::boolean(false, "Build single-threaded versions of libraries"),
            )
            .variant(
                "clanglibcpp",
                VariantDef::boolean(false, "Compile with clang libc++ instead of libstdc++"),
            )
            .variant(
                "taggedlayout",
                VariantDef::boolean(false, "Tag library names with build options"),
            )
            .variant_group(
                VariantGroup::at_least_one("threading", &["multithreaded", "singlethreaded"])
                    .with_coinstall(CoInstall::RequiresVariant("taggedlayout".to_string())),
            );

        Self { def }
    }
}

impl Default for Boost {
    fn default() -> Self {
        Self::new()
    }
}

/// Download URL for a release
pub fn source_url(version: &str) -> String {
    let version = RecipeVersion::new(version);
    format!(
        "http://downloads.sourceforge.net/project/boost/boost/{}/boost_{}.tar.bz2",
        version.dotted(),
        version.underscored()
    )
}

/// Boost.Build toolset for the spec's compiler
pub fn toolset(spec: &ConcreteSpec) -> &'static str {
    if spec.platform.is_darwin() {
        return "darwin";
    }
    match spec.compiler.cxx_name().as_str() {
        "g++" => "gcc",
        "icpc" if spec.version_in(&VersionRange::at_least("1.47")) => "intel-linux",
        "icpc" => "intel",
        "clang++" => "clang",
        "xlc++" | "xlc++_r" => "xlcpp",
        "pgc++" => "pgi",
        _ => "gcc",
    }
}

fn is_intel(spec: &ConcreteSpec) -> bool {
    spec.compiler.name == "intel"
}

fn is_clang(spec: &ConcreteSpec) -> bool {
    spec.compiler.name == "clang"
}

/// Selected libraries in declaration order
pub fn selected_libraries(spec: &ConcreteSpec) -> Result<Vec<&'static str>, VariantError> {
    let mut libs = Vec::new();
    for lib in LIBRARIES {
        if spec.enabled(lib)? {
            libs.push(lib);
        }
    }
    Ok(libs)
}

/// `threading=` values to install, one b2 run each
pub fn threading_models(spec: &ConcreteSpec) -> Result<Vec<&'static str>, VariantError> {
    let mut models = Vec::new();
    for (variant, model) in THREADING {
        if spec.enabled(variant)? {
            models.push(model);
        }
    }
    Ok(models)
}

/// `user-config.jam` contents
pub fn user_config(spec: &ConcreteSpec) -> String {
    if is_intel(spec) {
        String::new()
    } else {
        format!("using {} : : {} ;\n", toolset(spec), spec.compiler.cxx.display())
    }
}

/// Options shared by every b2 run
pub fn b2_options(spec: &ConcreteSpec, jobs: usize) -> Result<Vec<String>, VariantError> {
    let jobs = if spec.version_in(&VersionRange::at_most("1.58")) {
        jobs.min(BOOST_LEGACY_MAX_JOBS)
    } else {
        jobs
    };

    let mut options = vec!["-j".to_string(), jobs.to_string()];
    options.push(if spec.enabled("debug")? {
        "variant=debug".to_string()
    } else {
        "variant=release".to_string()
    });

    let link = if spec.enabled("shared")? {
        "static,shared"
    } else {
        "static"
    };
    options.push(format!("link={link}"));

    let layout = if spec.enabled("taggedlayout")? {
        "tagged"
    } else {
        "system"
    };
    options.push(format!("--layout={layout}"));
    options.push("debug-symbols=on".to_string());

    if !is_intel(spec) {
        options.push(format!("toolset={}", toolset(spec)));
    }

    if is_clang(spec) {
        options.push("pch=off".to_string());
        if spec.enabled("clanglibcpp")? {
            options.extend(
                [
                    "toolset=clang",
                    "cxxflags=\"-stdlib=libc++\"",
                    "linkflags=\"-stdlib=libc++\"",
                ]
                .map(String::from),
            );
        }
    }

    Ok(options)
}

fn b2_program(ctx: &BuildContext<'_>) -> String {
    let name = if ctx.spec.version_in(&VersionRange::at_least("1.47")) {
        "b2"
    } else {
        "bjam"
    };
    ctx.source_dir.join(name).display().to_string()
}

// Boost.Build on darwin expects Apple's libtool, not GNU libtool, first on PATH
fn darwin_libtool(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    if !ctx.spec.platform.is_darwin() {
        return Ok(());
    }
    let dir = ctx.stage_dir.join("darwin-libtool");
    filesystem::create_dir_all(&dir)?;
    let link = dir.join("libtool");
    if link.symlink_metadata().is_err() {
        filesystem::symlink(Path::new("/usr/bin/libtool"), &link)?;
    }
    ctx.env.prepend_path("PATH", &dir);
    Ok(())
}

fn bootstrap(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    let libs = selected_libraries(ctx.spec)?;
    if libs.is_empty() {
        return Ok(());
    }

    filesystem::write_file(&ctx.source_dir.join("user-config.jam"), &user_config(ctx.spec))?;
    ctx.env.set("BOOST_BUILD_PATH", "./");

    let options = vec![
        format!("--prefix={}", ctx.prefix),
        format!("--with-toolset={}", toolset(ctx.spec)),
        format!("--with-libraries={}", libs.join(",")),
    ];
    ctx.run(&ctx.source_dir.join("bootstrap.sh").display().to_string(), options)
}

fn install(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    if selected_libraries(ctx.spec)?.is_empty() {
        tracing::info!("boost: no libraries selected, installing headers only");
        let include = ctx.prefix.include();
        filesystem::create_dir_all(&include)?;
        filesystem::copy_tree(&ctx.source_dir.join("boost"), &include.join("boost"))?;
        return Ok(());
    }

    let b2 = b2_program(ctx);
    let options = b2_options(ctx.spec, ctx.make_jobs())?;
    ctx.run(&b2, ["--clean"])?;
    for model in threading_models(ctx.spec)? {
        let mut args = vec!["install".to_string(), format!("threading={model}")];
        args.extend(options.iter().cloned());
        ctx.run(&b2, args)?;
    }
    Ok(())
}

/// `-mt` aliases for every library under the system layout
///
/// Consumers that look for `libboost_thread-mt.so` find the multi-threaded
/// build, which the system layout installs untagged.
pub fn mt_symlink_steps(lib_dir: &Path) -> Result<Vec<NormalizeStep>, FilesystemError> {
    let entries = std::fs::read_dir(lib_dir).map_err(|e| FilesystemError::ReadFile {
        path: lib_dir.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FilesystemError::ReadFile {
            path: lib_dir.to_path_buf(),
            error: e.to_string(),
        })?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    Ok(names
        .iter()
        .filter_map(|name| {
            let (stem, rest) = name.split_once('.')?;
            if stem.ends_with("-mt") || stem.is_empty() {
                return None;
            }
            Some(NormalizeStep::link(
                lib_dir.join(name),
                lib_dir.join(format!("{stem}-mt.{rest}")),
            ))
        })
        .collect())
}

fn mt_symlinks(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    let spec = ctx.spec;
    if selected_libraries(spec)?.is_empty()
        || !spec.enabled("multithreaded")?
        || spec.enabled("taggedlayout")?
    {
        return Ok(());
    }
    let lib = ctx.prefix.lib();
    if !lib.is_dir() {
        return Ok(());
    }
    let steps = mt_symlink_steps(&lib)?;
    normalize::apply_all(&steps)?;
    Ok(())
}

// Shared libraries on darwin need absolute install names
fn darwin_install_names(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    if !ctx.spec.platform.is_darwin() || !ctx.spec.enabled("shared")? {
        return Ok(());
    }
    let lib = ctx.prefix.lib();
    let Ok(entries) = std::fs::read_dir(&lib) else {
        return Ok(());
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "dylib") && !path.is_symlink() {
            let path = path.display().to_string();
            ctx.run_in(&lib, "install_name_tool", ["-id".to_string(), path.clone(), path])?;
        }
    }
    Ok(())
}

impl Recipe for Boost {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new()
            .on(Phase::Configure, "darwin-libtool", darwin_libtool)
            .on(Phase::Configure, "bootstrap", bootstrap)
            .on(Phase::Install, "b2-install", install)
            .on(Phase::PostInstall, "mt-symlinks", mt_symlinks)
            .on(Phase::PostInstall, "darwin-install-names", darwin_install_names)
    }
}
