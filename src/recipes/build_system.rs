//! Lifecycles shared by recipes that wrap a standard build system

use std::path::PathBuf;

use crate::core::context::BuildContext;
use crate::core::lifecycle::{Lifecycle, Phase};
use crate::error::BuildError;

/// Produces `configure` arguments from the resolved spec
pub type ArgsFn = fn(&BuildContext<'_>) -> Result<Vec<String>, BuildError>;

/// No extra arguments
pub fn no_args(_: &BuildContext<'_>) -> Result<Vec<String>, BuildError> {
    Ok(Vec::new())
}

/// `subdir` of the source tree, or the root when empty
pub fn source_subdir(ctx: &BuildContext<'_>, subdir: &str) -> PathBuf {
    if subdir.is_empty() {
        ctx.source_dir.clone()
    } else {
        ctx.source_dir.join(subdir)
    }
}

/// `configure && make && make install`, in `subdir` of the source tree
///
/// An empty `subdir` means the source root. Queued build-system flags go
/// on the `configure` line.
pub fn autotools_in(subdir: &'static str, args: ArgsFn) -> Lifecycle {
    Lifecycle::new()
        .on(Phase::Configure, "configure", move |ctx| {
            let dir = source_subdir(ctx, subdir);
            let args = args(ctx)?;
            ctx.configure_in(&dir, &args)
        })
        .on(Phase::Build, "make", move |ctx| {
            ctx.make_in(&source_subdir(ctx, subdir), &[])
        })
        .on(Phase::Install, "make-install", move |ctx| {
            ctx.make_in(&source_subdir(ctx, subdir), &["install"])
        })
}

/// `configure && make && make install` in the source root
pub fn autotools(args: ArgsFn) -> Lifecycle {
    autotools_in("", args)
}

/// Strings from literals
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}
