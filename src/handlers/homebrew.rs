//! Homebrew handler: run `brew bundle` against a Brewfile once per content.

use super::{Action, ClearContext, ClearedItem, Handler, HandlerEnv, RunMode, ensure_known_keys};
use crate::error::HandlerError;
use crate::matchers::TriggerMatch;
use crate::options::OptionMap;

/// Registry name for this handler.
pub const NAME: &str = "homebrew";

/// Emits a once-per-content Brewfile action per match.
///
/// The Brewfile itself is the checksum guard source; the executor computes
/// the checksum, consults the brew sentinel, and skips the bundle run when
/// the content has not changed since the last success.
#[derive(Debug)]
pub struct HomebrewHandler;

impl Handler for HomebrewHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "install packages from a Brewfile"
    }

    fn run_mode(&self) -> RunMode {
        RunMode::OncePerContent
    }

    fn validate_options(&self, options: &OptionMap) -> Result<(), HandlerError> {
        ensure_known_keys(NAME, options, &[])
    }

    fn process(
        &self,
        matches: &[TriggerMatch],
        _env: &HandlerEnv,
    ) -> Result<Vec<Action>, HandlerError> {
        Ok(matches
            .iter()
            .map(|hit| Action::Brew {
                pack: hit.pack_name.clone(),
                brewfile: hit.absolute_path.clone(),
                priority: hit.priority,
            })
            .collect())
    }

    fn clear(&self, ctx: &ClearContext<'_>) -> Result<Vec<ClearedItem>, HandlerError> {
        let sentinel = ctx.store.brew_sentinel_path(ctx.pack);
        if !ctx.fs.exists(&sentinel) {
            return Ok(Vec::new());
        }
        Ok(vec![ClearedItem {
            kind: "sentinel",
            path: sentinel,
            description: format!("forget Brewfile provisioning for pack '{}'", ctx.pack),
        }])
    }
}
