//! List command implementation
//!
//! Implements `hpcprereqs list`.

use anyhow::Result;
use serde_json::json;

use super::Session;

/// Execute the list command
pub fn execute(session: &Session) -> Result<()> {
    if session.output.json {
        let recipes: Vec<_> = session
            .repo
            .iter()
            .map(|r| {
                let def = r.definition();
                json!({ "name": def.name, "description": def.description })
            })
            .collect();
        return session.output.emit_json(&recipes);
    }

    let width = session.repo.iter().map(|r| r.name().len()).max().unwrap_or(0);
    for recipe in session.repo.iter() {
        session.output.line(format!(
            "{:width$}  {}",
            recipe.name(),
            recipe.definition().description
        ));
    }
    Ok(())
}
