//! Shared deploy driver for `link`, `provision`, and `fill`.

use anyhow::Result;
use rayon::prelude::*;

use crate::context::RunContext;
use crate::executor::ActionExecutor;
use crate::handlers::Action;
use crate::packs::Pack;
use crate::pipeline::actions_for_matches;
use crate::results::{
    ActionStatus, ExecutionContext, HandlerResult, PackExecutionResult,
};
use crate::scanner::{effective_matcher_set, scan_pack};

/// Which actions a deploy run applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Idempotent actions: links, PATH, shell profiles, templates.
    EveryRun,
    /// Checksum-gated actions: install scripts, Brewfiles.
    OncePerContent,
    /// Templates only (the `fill` command).
    TemplatesOnly,
}

impl DeployMode {
    const fn admits(self, action: &Action) -> bool {
        match self {
            Self::EveryRun => matches!(
                action,
                Action::Link { .. }
                    | Action::PathAdd { .. }
                    | Action::ShellSource { .. }
                    | Action::Template { .. }
            ),
            Self::OncePerContent => {
                matches!(action, Action::Brew { .. } | Action::Install { .. })
            }
            Self::TemplatesOnly => matches!(action, Action::Template { .. }),
        }
    }
}

/// Run a deploy-style command over the selected packs.
///
/// Packs are processed in parallel when enabled; the store's per-pack key
/// partitioning keeps that safe. Returns `true` when every pack ended
/// `Success` or `Skipped`.
///
/// # Errors
///
/// Returns an error when the store layout cannot be created or pack
/// selection fails.
pub fn run(
    ctx: &RunContext,
    command: &str,
    selection: &[String],
    mode: DeployMode,
) -> Result<bool> {
    ctx.store.ensure_layout(ctx.fs.as_ref())?;
    let packs = super::select_packs(ctx, selection)?;
    ctx.log.stage(&format!(
        "{command}: {} pack(s) under {}",
        packs.len(),
        ctx.root.display()
    ));

    let mut run_result = ExecutionContext::begin(command, ctx.options.dry_run);
    let results: Vec<PackExecutionResult> = if ctx.parallel && packs.len() > 1 {
        packs.par_iter().map(|pack| deploy_pack(ctx, pack, mode)).collect()
    } else {
        packs.iter().map(|pack| deploy_pack(ctx, pack, mode)).collect()
    };

    for result in results {
        ctx.log.record_pack(
            &result.pack,
            result.status,
            result.first_error(),
        );
        run_result.add_pack(result);
    }

    // Regenerate the init script once, after every pack's PATH and
    // shell-profile markers have landed.
    let mut clean = run_result.all_clean();
    if !ctx.options.dry_run && mode != DeployMode::OncePerContent {
        if let Err(err) = crate::store::regenerate_shell_init(ctx.fs.as_ref(), &ctx.store) {
            ctx.log.error(&format!("regenerating shell init: {err}"));
            run_result.messages.push(err.to_string());
            clean = false;
        }
    }

    ctx.log.print_summary();
    Ok(clean)
}

/// Scan, pipeline, and execute one pack.
pub(crate) fn deploy_pack(ctx: &RunContext, pack: &Pack, mode: DeployMode) -> PackExecutionResult {
    if pack.ignored {
        let mut result = HandlerResult::begin(&pack.name, "scan");
        result.record("pack is ignored", ActionStatus::Skipped, None);
        result.finish();
        return PackExecutionResult::from_handlers(&pack.name, vec![result]);
    }

    let set = match effective_matcher_set(pack, &ctx.global_matchers, &ctx.registries) {
        Ok(set) => set,
        Err(err) => {
            let mut result = HandlerResult::begin(&pack.name, "scan");
            result.record("compile matchers", ActionStatus::Error, Some(&err.to_string()));
            result.finish();
            return PackExecutionResult::from_handlers(&pack.name, vec![result]);
        }
    };

    let report = scan_pack(ctx.fs.as_ref(), pack, &set, &ctx.registries);
    let outcome = actions_for_matches(&report.matches, &ctx.registries, &ctx.env);
    let actions: Vec<Action> = outcome
        .actions
        .into_iter()
        .filter(|a| mode.admits(a))
        .collect();

    let executor = ActionExecutor::new(
        ctx.fs.as_ref(),
        &ctx.store,
        ctx.runner.as_ref(),
        std::sync::Arc::clone(&ctx.cancel),
        ctx.options.clone(),
    );
    let executed = executor.execute_pack(&pack.name, &actions);

    // Fold scan and pipeline failures into the pack result so they are
    // visible in the rollup.
    let mut handler_results = executed.handler_results;
    for err in report.errors {
        let mut result = HandlerResult::begin(&pack.name, "scan");
        result.record("scan entry", ActionStatus::Error, Some(&err.to_string()));
        result.finish();
        handler_results.push(result);
    }
    for (handler, err) in outcome.failures {
        let mut result = HandlerResult::begin(&pack.name, &handler);
        result.record("produce actions", ActionStatus::Error, Some(&err.to_string()));
        result.finish();
        handler_results.push(result);
    }
    PackExecutionResult::from_handlers(&pack.name, handler_results)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::commands::test_helpers::{memory_context, seed_pack};
    use crate::executor::RunOptions;
    use std::path::Path;

    #[test]
    fn link_mode_deploys_every_run_actions() {
        let ctx = memory_context(RunOptions::default());
        seed_pack(&ctx, "vim", &[(".vimrc", "set nu"), ("bin/tool", "#!/bin/sh")]);

        let clean = run(&ctx, "link", &[], DeployMode::EveryRun).unwrap();
        assert!(clean);
        assert!(ctx.fs.exists(Path::new("/home/user/.vimrc")));
        assert!(ctx.fs.exists(&ctx.store.path_dir("vim").join("bin")));
    }

    #[test]
    fn provision_mode_skips_every_run_actions() {
        let ctx = memory_context(RunOptions::default());
        seed_pack(&ctx, "vim", &[(".vimrc", "set nu")]);

        let clean = run(&ctx, "provision", &[], DeployMode::OncePerContent).unwrap();
        assert!(clean);
        assert!(
            !ctx.fs.exists(Path::new("/home/user/.vimrc")),
            "provision must not create links"
        );
    }

    #[test]
    fn conflicts_make_the_run_unclean_but_continue() {
        let ctx = memory_context(RunOptions::default());
        seed_pack(&ctx, "vim", &[(".vimrc", "set nu")]);
        seed_pack(&ctx, "zsh", &[(".zshrc", "z")]);
        ctx.fs
            .write_file(Path::new("/home/user/.vimrc"), b"different", 0o644)
            .unwrap();

        let clean = run(&ctx, "link", &[], DeployMode::EveryRun).unwrap();
        assert!(!clean);
        // The other pack still deployed.
        assert!(ctx.fs.exists(Path::new("/home/user/.zshrc")));
        assert_eq!(ctx.log.failure_count(), 1);
    }

    #[test]
    fn ignored_packs_are_recorded_as_skipped() {
        let ctx = memory_context(RunOptions::default());
        seed_pack(&ctx, "old", &[("file", "x"), (".dodotignore", "")]);

        let clean = run(&ctx, "link", &[], DeployMode::EveryRun).unwrap();
        assert!(clean, "a skipped pack keeps the run clean");
        assert!(!ctx.fs.exists(Path::new("/home/user/file")));
    }

    #[test]
    fn bad_pack_config_surfaces_as_pack_error() {
        let ctx = memory_context(RunOptions::default());
        seed_pack(&ctx, "bad", &[(".dodot.toml", "override = [")]);

        // Discovery itself fails on the malformed config.
        assert!(run(&ctx, "link", &[], DeployMode::EveryRun).is_err());
    }

    #[test]
    fn unknown_matcher_reference_fails_the_pack_before_acting() {
        let ctx = memory_context(RunOptions::default());
        seed_pack(
            &ctx,
            "vim",
            &[
                (".vimrc", "set nu"),
                (
                    ".dodot.toml",
                    "[[matchers]]\ntrigger = \"no_such_trigger\"\nhandler = \"symlink\"\n",
                ),
            ],
        );

        let clean = run(&ctx, "link", &[], DeployMode::EveryRun).unwrap();
        assert!(!clean);
        assert!(
            !ctx.fs.exists(Path::new("/home/user/.vimrc")),
            "no action may be emitted after a validation error"
        );
    }
}
