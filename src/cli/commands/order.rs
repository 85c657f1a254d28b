//! Order command implementation
//!
//! Implements `hpcprereqs order <spec>`.

use anyhow::Result;
use serde_json::json;

use super::Session;
use crate::cli::output::status;
use crate::core::driver::is_installed;

/// Execute the order command
pub fn execute(session: &Session, spec: &str) -> Result<()> {
    let plan = session.plan(spec)?;

    if session.output.json {
        let builds: Vec<_> = plan
            .builds
            .iter()
            .map(|b| {
                json!({
                    "name": b.spec.name,
                    "spec": b.spec.to_string(),
                    "prefix": b.prefix.path(),
                    "installed": is_installed(&b.prefix),
                })
            })
            .collect();
        let externals: Vec<_> = plan
            .externals
            .iter()
            .map(|(name, prefix)| json!({ "name": name, "prefix": prefix.path() }))
            .collect();
        return session.output.emit_json(&json!({
            "root": plan.root,
            "builds": builds,
            "externals": externals,
        }));
    }

    let out = &session.output;
    for (i, build) in plan.builds.iter().enumerate() {
        let mark = if is_installed(&build.prefix) {
            status::SUCCESS
        } else {
            status::SKIPPED
        };
        out.line(format!("{:>3}. {mark} {}", i + 1, build.spec));
        out.line(format!("       {}", build.prefix));
    }
    if !plan.externals.is_empty() {
        out.line("\nExternal:");
        for (name, prefix) in &plan.externals {
            out.line(format!("  {name}  {prefix}"));
        }
    }
    Ok(())
}
