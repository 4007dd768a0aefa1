//! Shell-profile handler: register scripts for sourcing at shell startup.

use super::{Action, ClearContext, ClearedItem, Handler, HandlerEnv, RunMode, ensure_known_keys};
use crate::error::HandlerError;
use crate::matchers::TriggerMatch;
use crate::options::OptionMap;

/// Registry name for this handler.
pub const NAME: &str = "shell_profile";

/// Registers each matched script in the data store; the generated shell
/// init file sources every registered script.
#[derive(Debug)]
pub struct ShellProfileHandler;

impl Handler for ShellProfileHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "source scripts from the shell profile"
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
        Ok(matches
            .iter()
            .map(|hit| Action::ShellSource {
                pack: hit.pack_name.clone(),
                script: hit.absolute_path.clone(),
                priority: hit.priority,
            })
            .collect())
    }

    fn clear(&self, ctx: &ClearContext<'_>) -> Result<Vec<ClearedItem>, HandlerError> {
        let markers = ctx
            .store
            .shell_markers(ctx.fs, ctx.pack)
            .map_err(|err| HandlerError::ClearFailed {
                handler: NAME.to_string(),
                message: err.to_string(),
            })?;
        Ok(markers
            .into_iter()
            .map(|(_, script)| ClearedItem {
                kind: "shell",
                path: script.clone(),
                description: format!("stop sourcing {}", script.display()),
            })
            .collect())
    }
}
