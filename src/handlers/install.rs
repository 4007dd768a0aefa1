//! Install handler: run a pack's setup script once per content.

use super::{Action, ClearContext, ClearedItem, Handler, HandlerEnv, RunMode, ensure_known_keys};
use crate::error::HandlerError;
use crate::matchers::TriggerMatch;
use crate::options::OptionMap;

/// Registry name for this handler.
pub const NAME: &str = "install";

/// Emits a once-per-content script-run action per match.
///
/// The script is the checksum guard source and its basename names the
/// sentinel; editing the script re-arms the action.
#[derive(Debug)]
pub struct InstallHandler;

impl Handler for InstallHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "run setup scripts once per content"
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
            .filter_map(|hit| {
                let sentinel = hit
                    .relative_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())?;
                Some(Action::Install {
                    pack: hit.pack_name.clone(),
                    script: hit.absolute_path.clone(),
                    args: Vec::new(),
                    sentinel,
                    priority: hit.priority,
                })
            })
            .collect())
    }

    fn clear(&self, ctx: &ClearContext<'_>) -> Result<Vec<ClearedItem>, HandlerError> {
        let sentinels = ctx
            .store
            .install_sentinels(ctx.fs, ctx.pack)
            .map_err(|err| HandlerError::ClearFailed {
                handler: NAME.to_string(),
                message: err.to_string(),
            })?;
        Ok(sentinels
            .into_iter()
            .map(|name| ClearedItem {
                kind: "sentinel",
                path: ctx.store.install_sentinel_path(ctx.pack, &name),
                description: format!("forget provisioning state for '{name}'"),
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::{match_for, test_env};
    use std::path::PathBuf;

    #[test]
    fn emits_install_action_with_sentinel_name() {
        let matches = vec![match_for("dev", "install.sh", NAME, OptionMap::new())];
        let actions = InstallHandler.process(&matches, &test_env()).unwrap();
        assert_eq!(actions.len(), 1);
        let Action::Install {
            script,
            sentinel,
            args,
            ..
        } = &actions[0]
        else {
            panic!("expected an install action");
        };
        assert_eq!(script, &PathBuf::from("/dotfiles/dev/install.sh"));
        assert_eq!(sentinel, "install.sh");
        assert!(args.is_empty());
    }

    #[test]
    fn run_mode_is_once_per_content() {
        assert_eq!(InstallHandler.run_mode(), RunMode::OncePerContent);
    }

    #[test]
    fn rejects_any_option() {
        let mut options = OptionMap::new();
        options.insert("args".to_string(), "no".into());
        assert!(InstallHandler.validate_options(&options).is_err());
    }
}
