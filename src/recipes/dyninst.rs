//! Dyninst, trimmed to SymtabAPI and ParseAPI
//!
//! Only the components control-flow analysis needs are built and
//! installed. The parallel-parsing branches additionally link TBB.

use crate::core::context::BuildContext;
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::core::recipe::{Condition, GitRef, Recipe, RecipeDefinition, UsageKind};
use crate::core::variants::VariantDef;
use crate::core::version::VersionRange;
use crate::error::BuildError;

const DYNINST_GIT: &str = "https://github.com/dyninst/dyninst.git";
const PARALLEL_BRANCH: &str = "new-parallel-parsing";

/// Source subdirectories built and installed, in dependency order
pub const COMPONENTS: [&str; 6] = [
    "common",
    "elf",
    "dwarf",
    "symtabAPI",
    "instructionAPI",
    "parseAPI",
];

/// Versions that use the parallel parser
const TBB_VERSIONS: [&str; 2] = ["johnmc", "parallel"];

pub struct Dyninst {
    def: RecipeDefinition,
}

impl Dyninst {
    pub fn new() -> Self {
        let mut def = RecipeDefinition::new("dyninst", "Binary analysis and instrumentation library")
            .homepage("https://dyninst.org")
            .git_version("master", DYNINST_GIT, GitRef::Branch("master".to_string()))
            .preferred()
            .git_version(
                "johnmc",
                "https://github.com/jmellorcrummey/dyninst",
                GitRef::Branch(PARALLEL_BRANCH.to_string()),
            )
            .git_version("parallel", DYNINST_GIT, GitRef::Branch(PARALLEL_BRANCH.to_string()))
            .variant("debug", VariantDef::boolean(false, "Use CMake build type Debug"))
            .variant("openmp", VariantDef::boolean(false, "Enable OpenMP support"))
            .depends_on("boost", UsageKind::Link)
            .depends_on("elfutils", UsageKind::Link)
            .depends_on("libiberty", UsageKind::Link);
        for version in TBB_VERSIONS {
            def = def.depends_on_when(
                "intel-tbb",
                UsageKind::Link,
                Condition::Version(VersionRange::exactly(version)),
            );
        }

        Self { def }
    }
}

impl Default for Dyninst {
    fn default() -> Self {
        Self::new()
    }
}

fn uses_tbb(ctx: &BuildContext<'_>) -> bool {
    TBB_VERSIONS
        .iter()
        .any(|v| ctx.spec.version_in(&VersionRange::exactly(v)))
}

fn patch_sources(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    // cotire breaks parallel builds of shared plus static libraries
    ctx.filter_file(
        "cmake/shared.cmake",
        r"^(.*)[sS][eE][tT].*USE_COTIRE.*",
        "${1}set(USE_COTIRE false)",
    )?;
    // the testsuite is a git submodule we never fetch
    ctx.filter_file(
        "CMakeLists.txt",
        r"^.*add_subdirectory.*testsuite.*",
        "# disable testsuite",
    )?;
    Ok(())
}

/// Arguments for the top-level cmake run
pub fn cmake_args(ctx: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    let spec = ctx.spec;
    let boost = ctx.dep("boost")?;
    let elf = ctx.dep("elfutils")?;
    let libiberty = ctx.dep("libiberty")?;

    let build_type = if spec.enabled("debug")? {
        "Debug"
    } else {
        "RelWithDebInfo"
    };
    let elf_include = elf.include().display().to_string();

    let mut args = vec![
        ".".to_string(),
        format!("-DCMAKE_INSTALL_PREFIX={}", ctx.prefix),
        format!("-DCMAKE_BUILD_TYPE={build_type}"),
        format!("-DCMAKE_C_COMPILER={}", spec.compiler.cc.display()),
        format!("-DCMAKE_CXX_COMPILER={}", spec.compiler.cxx.display()),
        "-DUSE_COTIRE=False".to_string(),
        "-DBUILD_DOCS=Off".to_string(),
        "-DBUILD_RTLIB=Off".to_string(),
        "-DBUILD_TARBALLS=Off".to_string(),
        format!("-DPATH_BOOST={boost}"),
        format!("-DLIBELF_INCLUDE_DIR={elf_include}"),
        format!("-DLIBELF_LIBRARIES={}", elf.lib().join("libelf.so").display()),
        format!("-DLIBDWARF_INCLUDE_DIR={elf_include}"),
        format!("-DLIBDWARF_LIBRARIES={}", elf.lib().join("libdw.so").display()),
        format!(
            "-DIBERTY_LIBRARIES={}",
            libiberty.lib().join("libiberty.a").display()
        ),
    ];

    if uses_tbb(ctx) {
        let tbb = ctx.dep("intel-tbb")?;
        args.push(format!("-DTBB_ROOT_DIR={tbb}"));
        args.push(format!("-DTBB_INCLUDE_DIR={}", tbb.include().display()));
        args.push(format!("-DTBB_LIBRARY={}", tbb.lib().display()));
    }

    if spec.enabled("openmp")? {
        let flag = spec.compiler.openmp_flag();
        args.push(format!("-DCMAKE_C_FLAGS={flag}"));
        args.push(format!("-DCMAKE_CXX_FLAGS={flag}"));
    }

    Ok(args)
}

fn make_components(ctx: &BuildContext<'_>, targets: &[&str]) -> Result<(), BuildError> {
    for component in COMPONENTS {
        ctx.make_in(&ctx.source_dir.join(component), targets)?;
    }
    Ok(())
}

impl Recipe for Dyninst {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new()
            .on(Phase::Patch, "disable-cotire-and-testsuite", patch_sources)
            .on(Phase::Configure, "cmake", |ctx| {
                let args = cmake_args(ctx)?;
                ctx.cmake(&args)
            })
            .on(Phase::Build, "make", |ctx| make_components(ctx, &[]))
            .on(Phase::Install, "make-install", |ctx| make_components(ctx, &["install"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::{FlagCategory, FlagPlacement};
    use crate::core::spec::Prefix;
    use crate::core::variants::VariantRequest;
    use crate::infra::process::RecordingRunner;
    use crate::recipes::testing::{spec_at, spec_for};
    use tempfile::TempDir;

    fn args_for(version: Option<&str>, variants: &[VariantRequest]) -> Vec<String> {
        let spec = spec_at("dyninst", version, variants);
        let runner = RecordingRunner::new();
        let ctx = BuildContext::new(&spec, Prefix::new("/opt/dyninst"), "/s".into(), &runner);
        cmake_args(&ctx).unwrap()
    }

    #[test]
    fn test_master_is_default() {
        let def = Dyninst::new();
        assert_eq!(
            def.definition().default_version().unwrap().version.as_str(),
            "master"
        );
    }

    #[test]
    fn test_release_build_without_tbb() {
        let args = args_for(None, &[]);
        assert!(args.contains(&"-DCMAKE_BUILD_TYPE=RelWithDebInfo".to_string()));
        assert!(args.contains(&"-DPATH_BOOST=/opt/boost".to_string()));
        assert!(args.contains(&"-DLIBDWARF_LIBRARIES=/opt/elfutils/lib/libdw.so".to_string()));
        assert!(args.contains(&"-DIBERTY_LIBRARIES=/opt/libiberty/lib/libiberty.a".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-DTBB")));
        assert!(!args.iter().any(|a| a.starts_with("-DCMAKE_CXX_FLAGS")));
    }

    #[test]
    fn test_parallel_versions_use_tbb() {
        for version in ["johnmc", "parallel"] {
            let args = args_for(Some(version), &[]);
            assert!(args.contains(&"-DTBB_ROOT_DIR=/opt/intel-tbb".to_string()));
            assert!(args.contains(&"-DTBB_LIBRARY=/opt/intel-tbb/lib".to_string()));
        }
    }

    #[test]
    fn test_debug_and_openmp() {
        let args = args_for(
            None,
            &[VariantRequest::enable("debug"), VariantRequest::enable("openmp")],
        );
        assert!(args.contains(&"-DCMAKE_BUILD_TYPE=Debug".to_string()));
        assert!(args.contains(&"-DCMAKE_C_FLAGS=-fopenmp".to_string()));
        assert!(args.contains(&"-DCMAKE_CXX_FLAGS=-fopenmp".to_string()));
    }

    #[test]
    fn test_flags_go_through_wrapper() {
        let spec = spec_for("dyninst", &[]);
        let placed = Dyninst::new().flag_handler(
            FlagCategory::CxxFlags,
            vec!["-O3".to_string()],
            &spec.compiler,
        );
        assert_eq!(placed, FlagPlacement::Inject(vec!["-O3".to_string()]));
    }

    #[test]
    fn test_full_lifecycle() {
        let stage = TempDir::new().unwrap();
        let src = stage.path().join("src");
        std::fs::create_dir_all(src.join("cmake")).unwrap();
        std::fs::write(
            src.join("cmake/shared.cmake"),
            "set (USE_COTIRE true)\nset(OTHER 1)\n",
        )
        .unwrap();
        std::fs::write(
            src.join("CMakeLists.txt"),
            "project(Dyninst)\nadd_subdirectory(testsuite)\n",
        )
        .unwrap();

        let spec = spec_for("dyninst", &[]);
        let runner = RecordingRunner::new();
        let mut ctx = BuildContext::new(&spec, Prefix::new("/opt/dyninst"), stage.path().to_path_buf(), &runner)
            .with_jobs(4, true);
        Dyninst::new().lifecycle().run(&mut ctx).unwrap();

        assert_eq!(
            std::fs::read_to_string(src.join("cmake/shared.cmake")).unwrap(),
            "set(USE_COTIRE false)\nset(OTHER 1)\n"
        );
        assert_eq!(
            std::fs::read_to_string(src.join("CMakeLists.txt")).unwrap(),
            "project(Dyninst)\n# disable testsuite\n"
        );

        let invocations = runner.invocations();
        assert_eq!(invocations[0].program, "cmake");
        // one make and one make install per component
        assert_eq!(invocations.len(), 1 + 2 * COMPONENTS.len());
        assert_eq!(invocations[1].cwd, src.join("common"));
        assert_eq!(invocations[6].cwd, src.join("parseAPI"));
        assert_eq!(invocations[7].to_string(), "make -j4 install");
    }
}
