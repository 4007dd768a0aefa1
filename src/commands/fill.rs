//! `fill`: render template files only.

use anyhow::Result;

use super::deploy::{self, DeployMode};
use crate::context::RunContext;

/// Render every template in the selected packs without touching other
/// handlers.
///
/// # Errors
///
/// Returns an error when the store layout cannot be created or pack
/// selection fails.
pub fn run(ctx: &RunContext, selection: &[String]) -> Result<bool> {
    deploy::run(ctx, "fill", selection, DeployMode::TemplatesOnly)
}
