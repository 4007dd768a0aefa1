//! PATH handler: register directories for inclusion in `PATH`.

use std::collections::BTreeSet;

use super::{Action, ClearContext, ClearedItem, Handler, HandlerEnv, RunMode, ensure_known_keys};
use crate::error::HandlerError;
use crate::matchers::TriggerMatch;
use crate::options::OptionMap;

/// Registry name for this handler.
pub const NAME: &str = "shell_add_path";

/// Registers each matched directory in the data store; the generated shell
/// init file prepends every registered directory to `PATH`.
///
/// Duplicate matches for the same `(pack, relative path)` within one call
/// are collapsed to a single action.
#[derive(Debug)]
pub struct ShellAddPathHandler;

impl Handler for ShellAddPathHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "add directories to PATH"
    }

    fn run_mode(&self) -> RunMode {
        RunMode::EveryRun
    }

    fn validate_options(&self, options: &OptionMap) -> Result<(), HandlerError> {
        ensure_known_keys(NAME, options, &[])
    }

    fn process(
        &self,
        matches: &[TriggerMatch],
        _env: &HandlerEnv,
    ) -> Result<Vec<Action>, HandlerError> {
        let mut seen: BTreeSet<(String, std::path::PathBuf)> = BTreeSet::new();
        let mut actions = Vec::new();
        for hit in matches {
            if !seen.insert((hit.pack_name.clone(), hit.relative_path.clone())) {
                continue;
            }
            actions.push(Action::PathAdd {
                pack: hit.pack_name.clone(),
                dir: hit.absolute_path.clone(),
                priority: hit.priority,
            });
        }
        Ok(actions)
    }

    fn clear(&self, ctx: &ClearContext<'_>) -> Result<Vec<ClearedItem>, HandlerError> {
        let markers = ctx
            .store
            .path_markers(ctx.fs, ctx.pack)
            .map_err(|err| HandlerError::ClearFailed {
                handler: NAME.to_string(),
                message: err.to_string(),
            })?;
        Ok(markers
            .into_iter()
            .map(|(_, dir)| ClearedItem {
                kind: "path",
                path: dir.clone(),
                description: format!("drop {} from PATH", dir.display()),
            })
            .collect())
    }
}
