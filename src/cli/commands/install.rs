//! Install command implementation
//!
//! Implements `hpcprereqs install <spec>`: concretize, then run the local
//! driver over the plan. `--dry-run` prints the plan and each recipe's
//! lifecycle steps instead of building.

use anyhow::{Context, Result};
use serde_json::json;

use super::Session;
use crate::cli::output::{create_build_bar, status};
use crate::core::driver::{is_installed, Driver, InstallEvent};
use crate::core::resolver::BuildPlan;
use crate::core::spec::Prefix;
use crate::infra::process::SystemRunner;

/// Options for the install command
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Override for the configured job count
    pub jobs: Option<usize>,
    pub dry_run: bool,
}

/// Execute the install command
pub fn execute(session: &Session, spec: &str, options: InstallOptions) -> Result<()> {
    let plan = session.plan(spec)?;

    let mut config = session
        .settings
        .driver_config(&session.dirs)
        .context("Invalid settings")?;
    if let Some(jobs) = options.jobs {
        config = config.with_jobs(jobs);
    }

    let runner = SystemRunner;
    let driver = Driver::new(&session.repo, config, &runner);

    if options.dry_run {
        return print_plan(session, &driver, &plan);
    }

    let pending = plan.builds.iter().filter(|b| !is_installed(&b.prefix)).count();
    let bar = session
        .output
        .show_progress()
        .then(|| create_build_bar(u64::try_from(pending).unwrap_or(u64::MAX)));

    let result = driver.install_with(&plan, &mut |event| match event {
        InstallEvent::Started { name } => {
            if let Some(bar) = &bar {
                bar.set_message(name);
            }
        }
        InstallEvent::Installed { name, prefix } => {
            if let Some(bar) = &bar {
                bar.inc(1);
                bar.println(format!("{} {name} -> {prefix}", status::SUCCESS));
            }
        }
        InstallEvent::Skipped { name, .. } => {
            tracing::debug!("{name} already installed");
        }
    });

    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    let report = result.with_context(|| format!("Failed to install '{spec}'"))?;

    if session.output.json {
        let entries = |list: &[(String, Prefix)]| -> Vec<_> {
            list.iter()
                .map(|(name, prefix)| json!({ "name": name, "prefix": prefix.path() }))
                .collect()
        };
        return session.output.emit_json(&json!({
            "installed": entries(&report.installed),
            "skipped": entries(&report.skipped),
        }));
    }

    session.output.line(format!(
        "{} {} installed, {} already present",
        status::SUCCESS,
        report.installed.len(),
        report.skipped.len()
    ));
    Ok(())
}

fn print_plan(session: &Session, driver: &Driver<'_>, plan: &BuildPlan) -> Result<()> {
    let mut rows = Vec::new();
    for build in &plan.builds {
        let recipe = session.repo.get(&build.spec.name)?;
        let missing = driver.missing_patches(&build.spec.name)?;
        rows.push((build, is_installed(&build.prefix), recipe.lifecycle().labels(), missing));
    }

    if session.output.json {
        let builds: Vec<_> = rows
            .iter()
            .map(|(build, installed, steps, missing)| {
                json!({
                    "name": build.spec.name,
                    "spec": build.spec.to_string(),
                    "prefix": build.prefix.path(),
                    "installed": installed,
                    "steps": steps,
                    "missing_patches": missing,
                })
            })
            .collect();
        return session.output.emit_json(&json!({ "root": plan.root, "builds": builds }));
    }

    let out = &session.output;
    out.line(format!("{} Plan for {} (dry run)", status::INFO, plan.root));
    for (build, installed, steps, missing) in &rows {
        if *installed {
            out.line(format!("{} {} (installed)", status::SUCCESS, build.spec));
            continue;
        }
        out.line(format!("{} {}", status::SKIPPED, build.spec));
        out.line(format!("    prefix: {}", build.prefix));
        out.line(format!("    steps:  {}", steps.join(", ")));
        for patch in missing {
            out.line(format!("    {} missing patch {}", status::ERROR, patch.display()));
        }
    }
    Ok(())
}
