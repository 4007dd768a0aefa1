//! `status`: read-only probe rendered as a table or JSON.

use anyhow::Result;

use crate::context::RunContext;
use crate::status::{DisplayResult, probe};

/// Probe the selected packs and print the display model.
///
/// Exit is clean unless the probe reports a conflict or error row; a
/// pending pack is informational, not a failure.
///
/// # Errors
///
/// Returns an error when pack selection fails or JSON serialisation
/// fails.
pub fn run(ctx: &RunContext, selection: &[String], json: bool) -> Result<bool> {
    let packs = super::select_packs(ctx, selection)?;
    let model = probe(
        ctx.fs.as_ref(),
        &ctx.store,
        &ctx.registries,
        &packs,
        &ctx.global_matchers,
        &ctx.env,
        ctx.options.dry_run,
    );

    if json {
        print_json(&model)?;
    } else {
        render(&model);
    }

    let clean = model.packs.iter().all(|p| {
        !matches!(
            p.status,
            crate::status::PackDisplayStatus::Error | crate::status::PackDisplayStatus::Partial
        )
    });
    Ok(clean)
}

#[allow(clippy::print_stdout)]
fn print_json(model: &DisplayResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(model)?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn render(model: &DisplayResult) {
    let width = terminal_size::terminal_size().map_or(80, |(w, _)| usize::from(w.0));
    for pack in &model.packs {
        let label = match pack.status {
            crate::status::PackDisplayStatus::Success => "ok",
            crate::status::PackDisplayStatus::Partial => "partial",
            crate::status::PackDisplayStatus::Error => "error",
            crate::status::PackDisplayStatus::Ignored => "ignored",
            crate::status::PackDisplayStatus::Pending => "pending",
        };
        println!("{} [{label}]", pack.name);
        for file in &pack.files {
            let override_mark = if file.is_override { " (override)" } else { "" };
            let line = format!(
                "  {} {:<24} {:<16} {}{override_mark}",
                file.symbol,
                file.path.display(),
                file.handler,
                file.message,
            );
            let mut truncated = line;
            if truncated.chars().count() > width {
                truncated = truncated.chars().take(width.saturating_sub(1)).collect();
                truncated.push('…');
            }
            println!("{truncated}");
        }
    }
}
