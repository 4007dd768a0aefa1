//! `on` / `off` / `add-ignore`: per-pack enablement via the ignore marker.

use anyhow::{Context as _, Result};

use crate::context::RunContext;
use crate::packs::{IGNORE_MARKER, find_pack};

/// Re-enable a pack by removing its ignore marker.
///
/// # Errors
///
/// Returns an error when the pack does not exist or the marker cannot be
/// removed.
pub fn enable(ctx: &RunContext, pack_name: &str) -> Result<bool> {
    let pack = find_pack(ctx.fs.as_ref(), &ctx.root, pack_name)?;
    let marker = pack.path.join(IGNORE_MARKER);
    if !ctx.fs.exists(&marker) {
        ctx.log.info(&format!("pack '{pack_name}' is already enabled"));
        return Ok(true);
    }
    if ctx.options.dry_run {
        ctx.log.dry_run(&format!("remove {}", marker.display()));
        return Ok(true);
    }
    ctx.fs
        .remove(&marker)
        .with_context(|| format!("removing {}", marker.display()))?;
    ctx.log.info(&format!("pack '{pack_name}' enabled"));
    Ok(true)
}

/// Disable a pack by writing its ignore marker.
///
/// The pack keeps its deployed state; run `unlink`/`unprovision` to
/// remove it.
///
/// # Errors
///
/// Returns an error when the pack does not exist or the marker cannot be
/// written.
pub fn disable(ctx: &RunContext, pack_name: &str) -> Result<bool> {
    let pack = find_pack(ctx.fs.as_ref(), &ctx.root, pack_name)?;
    let marker = pack.path.join(IGNORE_MARKER);
    if ctx.fs.exists(&marker) {
        ctx.log.info(&format!("pack '{pack_name}' is already disabled"));
        return Ok(true);
    }
    if ctx.options.dry_run {
        ctx.log.dry_run(&format!("write {}", marker.display()));
        return Ok(true);
    }
    ctx.fs
        .write_file(&marker, b"", 0o644)
        .with_context(|| format!("writing {}", marker.display()))?;
    ctx.log.info(&format!("pack '{pack_name}' disabled"));
    Ok(true)
}
