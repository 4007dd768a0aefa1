//! `unlink` / `unprovision`: the clear pipeline over selected packs.

use anyhow::Result;

use crate::clear::{ClearFilter, clear_pack};
use crate::context::RunContext;
use crate::results::ExecutionContext;

/// Clear persisted state for the selected packs.
///
/// `unlink` covers every-run handlers (links, PATH, shell profiles);
/// `unprovision` covers once-per-content handlers so their actions run
/// again on the next provision.
///
/// # Errors
///
/// Returns an error when pack selection fails; per-pack clear failures
/// are reported through the summary.
pub fn run(
    ctx: &RunContext,
    command: &str,
    selection: &[String],
    filter: ClearFilter,
) -> Result<bool> {
    let packs = super::select_packs(ctx, selection)?;
    ctx.log.stage(&format!(
        "{command}: {} pack(s) under {}",
        packs.len(),
        ctx.root.display()
    ));

    let mut run_result = ExecutionContext::begin(command, ctx.options.dry_run);
    for pack in &packs {
        let result = clear_pack(
            ctx.fs.as_ref(),
            &ctx.store,
            &ctx.registries,
            &pack.name,
            ctx.options.dry_run,
            filter,
        );
        ctx.log
            .record_pack(&result.pack, result.status, result.first_error());
        run_result.add_pack(result);
    }

    ctx.log.print_summary();
    Ok(run_result.all_clean())
}
