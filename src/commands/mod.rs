//! Top-level subcommand orchestration.
//!
//! Each submodule is a thin layer over the core pipeline: build a
//! [`RunContext`](crate::context::RunContext), drive the scanner/pipeline/
//! executor (or the clear pipeline), record pack outcomes in the logger,
//! and print the summary. Exit policy: zero only when every pack finished
//! `Success` or `Skipped`.

pub mod adopt;
pub mod deploy;
pub mod fill;
pub mod gen_config;
pub mod status;
pub mod toggle;
pub mod unlink;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::cli::{Cli, Command};
use crate::context::RunContext;
use crate::executor::RunOptions;
use crate::logging::Logger;
use crate::packs::{Pack, discover_packs};

/// Dispatch a parsed CLI invocation. Returns `true` when the run is clean
/// (exit 0).
///
/// # Errors
///
/// Returns an error for unrecoverable setup failures (bad root, store
/// unavailable); per-pack failures are reported through the summary and
/// the boolean instead.
pub fn run(args: Cli, log: Arc<Logger>) -> Result<bool> {
    let options = RunOptions {
        dry_run: args.global.dry_run,
        force: args.global.force,
        timeout: args
            .global
            .timeout
            .map_or(crate::exec::DEFAULT_TIMEOUT, Duration::from_secs),
    };

    if let Command::Completions(opts) = &args.command {
        use clap::CommandFactory as _;
        clap_complete::generate(
            opts.shell,
            &mut Cli::command(),
            "dodot",
            &mut std::io::stdout(),
        );
        return Ok(true);
    }

    let ctx = RunContext::from_environment(
        args.global.root.as_deref(),
        args.global.data_dir.as_deref(),
        options,
        args.global.parallel,
        log,
    )?;
    ctx.install_cancel_handler();

    match args.command {
        Command::Link(packs) => {
            deploy::run(&ctx, "link", &packs.packs, deploy::DeployMode::EveryRun)
        }
        Command::Provision(packs) => deploy::run(
            &ctx,
            "provision",
            &packs.packs,
            deploy::DeployMode::OncePerContent,
        ),
        Command::Fill(packs) => fill::run(&ctx, &packs.packs),
        Command::Unlink(packs) => {
            unlink::run(&ctx, "unlink", &packs.packs, crate::clear::ClearFilter::EveryRun)
        }
        Command::Unprovision(packs) => unlink::run(
            &ctx,
            "unprovision",
            &packs.packs,
            crate::clear::ClearFilter::OncePerContent,
        ),
        Command::Status(opts) => status::run(&ctx, &opts.packs, opts.json),
        Command::Adopt(opts) => adopt::run(&ctx, &opts.pack, &opts.file),
        Command::On(name) => toggle::enable(&ctx, &name.pack),
        Command::Off(name) | Command::AddIgnore(name) => toggle::disable(&ctx, &name.pack),
        Command::GenConfig(name) => gen_config::run(&ctx, &name.pack),
        Command::Completions(_) => Ok(true),
    }
}

/// Discover packs and filter them by the user's selection.
///
/// An empty selection means every pack. Naming a pack that does not exist
/// is an error.
///
/// # Errors
///
/// Returns an error when discovery fails or a named pack is missing.
pub(crate) fn select_packs(ctx: &RunContext, selection: &[String]) -> Result<Vec<Pack>> {
    let packs = discover_packs(ctx.fs.as_ref(), &ctx.root)?;
    if selection.is_empty() {
        return Ok(packs);
    }
    let mut selected = Vec::with_capacity(selection.len());
    for name in selection {
        match packs.iter().find(|p| &p.name == name) {
            Some(pack) => selected.push(pack.clone()),
            None => anyhow::bail!("no pack named '{name}' under {}", ctx.root.display()),
        }
    }
    Ok(selected)
}
