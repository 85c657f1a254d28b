//! Info command implementation
//!
//! Implements `hpcprereqs info <name>`.

use anyhow::{Context, Result};
use serde_json::json;

use super::Session;
use crate::core::recipe::Condition;

/// Execute the info command
pub fn execute(session: &Session, name: &str) -> Result<()> {
    let recipe = session
        .repo
        .get(name)
        .with_context(|| format!("Cannot show '{name}'; run 'hpcprereqs list' for recipe names"))?;
    let def = recipe.definition();
    let default_version = def.default_version().ok().map(|v| v.version.to_string());

    if session.output.json {
        let versions: Vec<_> = def
            .versions
            .iter()
            .map(|v| {
                json!({
                    "version": v.version.as_str(),
                    "source": v.source.to_string(),
                    "default": Some(v.version.to_string()) == default_version,
                })
            })
            .collect();
        let variants: Vec<_> = def
            .variants
            .iter()
            .map(|(name, v)| {
                json!({
                    "name": name,
                    "default": v.default.to_string(),
                    "values": v.domain_text(),
                    "description": v.description,
                })
            })
            .collect();
        let dependencies: Vec<_> = def
            .dependencies
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "kind": d.kind.to_string(),
                    "when": d.when.to_string(),
                })
            })
            .collect();
        return session.output.emit_json(&json!({
            "name": def.name,
            "description": def.description,
            "homepage": def.homepage,
            "versions": versions,
            "variants": variants,
            "dependencies": dependencies,
            "patches": def.patches,
        }));
    }

    let out = &session.output;
    out.line(format!("{} - {}", def.name, def.description));
    if !def.homepage.is_empty() {
        out.line(format!("Homepage: {}", def.homepage));
    }

    out.line("\nVersions:");
    for v in &def.versions {
        let marker = if Some(v.version.to_string()) == default_version {
            " (default)"
        } else {
            ""
        };
        out.line(format!("  {}{marker}  {}", v.version, v.source));
    }

    if !def.variants.is_empty() {
        out.line("\nVariants:");
        for (name, v) in &def.variants {
            out.line(format!(
                "  {name} [{}] ({})  {}",
                v.default,
                v.domain_text(),
                v.description
            ));
        }
    }

    if !def.dependencies.is_empty() {
        out.line("\nDependencies:");
        for d in &def.dependencies {
            let when = if d.when == Condition::Always {
                String::new()
            } else {
                format!(" {}", d.when)
            };
            out.line(format!("  {} ({}){when}", d.name, d.kind));
        }
    }

    if !def.patches.is_empty() {
        out.line(format!("\nPatches: {}", def.patches.join(", ")));
    }
    Ok(())
}
