//! Flags command implementation
//!
//! Implements `hpcprereqs flags <spec> --category <c> --flags "<f>"`, which
//! asks a recipe's flag hook where it would place the given flags.

use anyhow::{Context, Result};
use serde_json::json;

use super::Session;
use crate::core::flags::{split_flags, FlagCategory, FlagPlacement};

fn placement_name(placement: &FlagPlacement) -> &'static str {
    match placement {
        FlagPlacement::Inject(_) => "inject",
        FlagPlacement::Environment(_) => "environment",
        FlagPlacement::BuildSystem(_) => "build-system",
    }
}

/// Execute the flags command
pub fn execute(session: &Session, spec: &str, category: &str, flags: &str) -> Result<()> {
    let category: FlagCategory = category
        .parse()
        .with_context(|| format!("Unknown flag category '{category}'"))?;
    let plan = session.plan(spec)?;
    let root = plan
        .get(&plan.root)
        .with_context(|| format!("'{}' is not built by this plan", plan.root))?;
    let recipe = session.repo.get(&root.spec.name)?;

    let placement = recipe.flag_handler(category, split_flags(flags), &root.spec.compiler);
    let target = placement_name(&placement);
    let rendered = placement.flags().join(" ");

    if session.output.json {
        return session.output.emit_json(&json!({
            "recipe": root.spec.name,
            "category": category.to_string(),
            "placement": target,
            "flags": placement.flags(),
        }));
    }

    let where_to = match &placement {
        FlagPlacement::Inject(_) => format!("compiler wrapper ({})", category.wrapper_var()),
        FlagPlacement::Environment(_) => format!("environment ({})", category.env_var()),
        FlagPlacement::BuildSystem(_) => format!("configure line ({}=...)", category.env_var()),
    };
    session.output.line(format!("{category}: {where_to}"));
    session.output.line(format!("  {rendered}"));
    Ok(())
}
