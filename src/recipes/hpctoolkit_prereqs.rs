//! Meta recipe pulling in every HPCToolkit prerequisite
//!
//! Builds nothing itself. Its install step records where each
//! prerequisite ended up in `etc/prereqs.txt`.

use crate::core::context::BuildContext;
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::core::manifest::PrereqManifest;
use crate::core::recipe::{Condition, Recipe, RecipeDefinition, UsageKind};
use crate::error::BuildError;

/// Prerequisites on every target
pub const PREREQS: [&str; 10] = [
    "binutils",
    "boost",
    "dyninst",
    "elfutils",
    "intel-tbb",
    "libdwarf",
    "libiberty",
    "libmonitor",
    "libunwind",
    "xerces-c",
];

pub struct HpctoolkitPrereqs {
    def: RecipeDefinition,
}

impl HpctoolkitPrereqs {
    pub fn new() -> Self {
        let mut def = RecipeDefinition::new(
            "hpctoolkit-prereqs",
            "Meta package installing the prerequisites of HPCToolkit",
        )
        .homepage("http://hpctoolkit.org/")
        .bundle_version("master");

        for name in PREREQS {
            def = def.depends_on(name, UsageKind::Run);
        }
        // XED decodes x86 only; keyed on the target, not the build host
        let def = def.depends_on_when(
            "intel-xed",
            UsageKind::Run,
            Condition::TargetArch("x86_64".to_string()),
        );

        Self { def }
    }
}

impl Default for HpctoolkitPrereqs {
    fn default() -> Self {
        Self::new()
    }
}

/// Manifest listing every resolved dependency in declaration order
pub fn manifest(ctx: &BuildContext<'_>) -> PrereqManifest {
    let mut manifest = PrereqManifest::new();
    for dep in &ctx.spec.dependencies {
        manifest.push(&dep.name, dep.prefix.path());
    }
    manifest
}

fn write_manifest(ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
    let path = manifest(ctx).write(&ctx.prefix)?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

impl Recipe for HpctoolkitPrereqs {
    fn definition(&self) -> &RecipeDefinition {
        &self.def
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new().on(Phase::Install, "write-manifest", write_manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recipe::SourceLocator;
    use crate::core::spec::{Platform, Prefix};
    use crate::core::variants::VariantSelection;
    use crate::core::version::RecipeVersion;
    use crate::infra::process::RecordingRunner;
    use crate::recipes::testing::spec_for;
    use tempfile::TempDir;

    #[test]
    fn test_nothing_to_fetch() {
        let recipe = HpctoolkitPrereqs::new();
        let decl = recipe.definition().default_version().unwrap();
        assert_eq!(decl.source, SourceLocator::Bundle);
    }

    #[test]
    fn test_xed_only_on_x86_64() {
        let recipe = HpctoolkitPrereqs::new();
        let xed = recipe
            .definition()
            .dependencies
            .iter()
            .find(|d| d.name == "intel-xed")
            .unwrap();
        let variants = VariantSelection::default();
        let master = RecipeVersion::new("master");
        assert!(xed
            .when
            .holds(&master, &variants, &Platform::new("linux", "x86_64"))
            .unwrap());
        assert!(!xed
            .when
            .holds(&master, &variants, &Platform::new("linux", "ppc64le"))
            .unwrap());
    }

    #[test]
    fn test_manifest_written_in_declaration_order() {
        let prefix = TempDir::new().unwrap();
        let spec = spec_for("hpctoolkit-prereqs", &[]);
        let runner = RecordingRunner::new();
        let mut ctx = BuildContext::new(&spec, Prefix::new(prefix.path()), "/s".into(), &runner);
        HpctoolkitPrereqs::new().lifecycle().run(&mut ctx).unwrap();

        let content = std::fs::read_to_string(prefix.path().join("etc/prereqs.txt")).unwrap();
        let parsed = PrereqManifest::parse(&content).unwrap();
        let names: Vec<_> = parsed.entries().iter().map(|e| e.name.as_str()).collect();
        let mut expected = PREREQS.to_vec();
        expected.push("intel-xed");
        assert_eq!(names, expected);
        assert_eq!(content.lines().next(), Some("binutils: /opt/binutils"));
        assert!(runner.invocations().is_empty());
    }
}
