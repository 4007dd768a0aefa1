//! `adopt`: move a home file into a pack and deploy the link in its place.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::deploy::{self, DeployMode};
use crate::context::RunContext;
use crate::fsys::FileKind;
use crate::packs::find_pack;
use crate::results::{ExecutionContext, PackStatus};

/// Adopt one file: move it into the pack, then run the link pipeline so
/// the original location becomes a dodot-owned symlink.
///
/// Refuses symlinks (nothing to adopt) and, without `--force`, files
/// outside the home directory. The round trip holds: `adopt` then
/// `unlink` leaves the file in the pack and the home path restorable from
/// it.
///
/// # Errors
///
/// Returns an error when the file cannot be moved or the pack does not
/// exist.
pub fn run(ctx: &RunContext, pack_name: &str, file: &Path) -> Result<bool> {
    ctx.store.ensure_layout(ctx.fs.as_ref())?;
    let pack = find_pack(ctx.fs.as_ref(), &ctx.root, pack_name)?;
    anyhow::ensure!(!pack.ignored, "pack '{pack_name}' is ignored; run `dodot on {pack_name}` first");

    let source = absolutize(file, &ctx.env.home);
    let info = ctx
        .fs
        .lstat(&source)
        .with_context(|| format!("adopting {}", source.display()))?;
    anyhow::ensure!(
        info.kind != FileKind::Symlink,
        "{} is a symlink; adopt the file it points at instead",
        source.display()
    );
    if !source.starts_with(&ctx.env.home) && !ctx.options.force {
        anyhow::bail!(
            "{} is outside the home directory (use --force to adopt anyway)",
            source.display()
        );
    }

    let basename = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("file has no name")?;
    let destination = pack.path.join(&basename);
    anyhow::ensure!(
        !ctx.fs.exists(&destination),
        "{} already exists in pack '{pack_name}'",
        destination.display()
    );

    if ctx.options.dry_run {
        ctx.log.dry_run(&format!(
            "move {} into pack '{pack_name}' and link it back",
            source.display()
        ));
        return Ok(true);
    }

    move_file(ctx, &source, &destination)
        .with_context(|| format!("moving {} into the pack", source.display()))?;
    ctx.log.info(&format!(
        "adopted {} into pack '{pack_name}'",
        source.display()
    ));

    // Deploy the pack's every-run actions so the home path becomes a link.
    let result = deploy::deploy_pack(ctx, &pack, DeployMode::EveryRun);
    let clean = matches!(result.status, PackStatus::Success | PackStatus::Skipped);
    ctx.log
        .record_pack(&result.pack, result.status, result.first_error());
    let mut run_result = ExecutionContext::begin("adopt", false);
    run_result.add_pack(result);
    ctx.log.print_summary();
    Ok(clean)
}

fn absolutize(file: &Path, home: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        home.join(file)
    }
}

/// Move a file preferring rename; fall back to copy-and-remove across
/// filesystems.
fn move_file(ctx: &RunContext, from: &Path, to: &Path) -> Result<()> {
    if ctx.fs.rename(from, to).is_ok() {
        return Ok(());
    }
    let bytes = ctx.fs.read_file(from)?;
    ctx.fs.write_file(to, &bytes, 0o644)?;
    ctx.fs.remove(from)?;
    Ok(())
}
