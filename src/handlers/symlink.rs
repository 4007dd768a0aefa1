//! Symlink handler: link pack files into the target directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{
    Action, ClearContext, ClearedItem, Handler, HandlerEnv, RunMode, ensure_known_keys,
    resolve_target_dir,
};
use crate::error::HandlerError;
use crate::matchers::TriggerMatch;
use crate::options::OptionMap;

/// Registry name for this handler.
pub const NAME: &str = "symlink";

/// Links each matched file or directory into the target directory
/// (defaulting to the user's home) via the store's two-link indirection.
///
/// Within a single `process` call, two matches that map to the same target
/// are a conflict: the call fails and produces no actions.
#[derive(Debug)]
pub struct SymlinkHandler;

impl Handler for SymlinkHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "link files into the home directory"
    }

    fn run_mode(&self) -> RunMode {
        RunMode::EveryRun
    }

    fn validate_options(&self, options: &OptionMap) -> Result<(), HandlerError> {
        ensure_known_keys(NAME, options, &["target_dir"])?;
        if let Some(value) = options.get("target_dir")
            && value.as_str().is_none()
        {
            return Err(HandlerError::InvalidOption {
                handler: NAME.to_string(),
                key: "target_dir".to_string(),
                message: format!("expected string, got {}", value.type_name()),
            });
        }
        Ok(())
    }

    fn process(
        &self,
        matches: &[TriggerMatch],
        env: &HandlerEnv,
    ) -> Result<Vec<Action>, HandlerError> {
        let mut seen: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        let mut actions = Vec::with_capacity(matches.len());
        for hit in matches {
            let target_dir = resolve_target_dir(NAME, &hit.handler_options, env)?;
            let Some(basename) = hit.relative_path.file_name() else {
                continue;
            };
            let target = target_dir.join(basename);
            if let Some(previous) = seen.get(&target)
                && previous != &hit.absolute_path
            {
                return Err(HandlerError::TargetCollision {
                    handler: NAME.to_string(),
                    target,
                });
            }
            seen.insert(target.clone(), hit.absolute_path.clone());
            actions.push(Action::Link {
                pack: hit.pack_name.clone(),
                source: hit.absolute_path.clone(),
                target,
                priority: hit.priority,
                metadata: hit.metadata.clone(),
            });
        }
        Ok(actions)
    }

    fn clear(&self, ctx: &ClearContext<'_>) -> Result<Vec<ClearedItem>, HandlerError> {
        let entries = ctx
            .store
            .link_entries(ctx.fs, ctx.pack)
            .map_err(|err| HandlerError::ClearFailed {
                handler: NAME.to_string(),
                message: err.to_string(),
            })?;
        let mut items = Vec::new();
        for entry in entries {
            let Some(public) = entry.public else {
                continue;
            };
            let intermediate = ctx.store.link_intermediate_path(ctx.pack, &entry.name);
            // Only remove public links we own: one hop must land on our
            // intermediate.
            let owned = ctx
                .fs
                .read_link(&public)
                .map(|target| target == intermediate)
                .unwrap_or(false);
            if !owned {
                continue;
            }
            if !ctx.dry_run {
                ctx.fs.remove(&public).map_err(|err| HandlerError::ClearFailed {
                    handler: NAME.to_string(),
                    message: format!("removing {}: {err}", public.display()),
                })?;
            }
            items.push(ClearedItem {
                kind: "symlink",
                path: public.clone(),
                description: format!("unlink {}", public.display()),
            });
        }
        Ok(items)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::{match_for, test_env};
    use crate::fsys::{Fs as _, MemFs};
    use crate::store::DataStore;
    use std::path::Path;

    #[test]
    fn links_into_home_by_default() {
        let matches = vec![match_for("vim", ".vimrc", NAME, OptionMap::new())];
        let actions = SymlinkHandler.process(&matches, &test_env()).unwrap();
        assert_eq!(actions.len(), 1);
        let Action::Link { source, target, .. } = &actions[0] else {
            panic!("expected a link action");
        };
        assert_eq!(source, &PathBuf::from("/dotfiles/vim/.vimrc"));
        assert_eq!(target, &PathBuf::from("/home/user/.vimrc"));
    }

    #[test]
    fn target_dir_option_redirects_links() {
        let mut options = OptionMap::new();
        options.insert("target_dir".to_string(), "~/.config".into());
        let matches = vec![match_for("nvim", "nvim", NAME, options)];
        let actions = SymlinkHandler.process(&matches, &test_env()).unwrap();
        let Action::Link { target, .. } = &actions[0] else {
            panic!("expected a link action");
        };
        assert_eq!(target, &PathBuf::from("/home/user/.config/nvim"));
    }

    #[test]
    fn colliding_targets_fail_with_no_actions() {
        // Same basename from two different packs, same target dir.
        let mut a = match_for("vim", ".vimrc", NAME, OptionMap::new());
        a.absolute_path = PathBuf::from("/dotfiles/vim/.vimrc");
        let mut b = match_for("neovim", ".vimrc", NAME, OptionMap::new());
        b.absolute_path = PathBuf::from("/dotfiles/neovim/.vimrc");

        let err = SymlinkHandler.process(&[a, b], &test_env()).unwrap_err();
        assert!(matches!(err, HandlerError::TargetCollision { .. }));
    }

    #[test]
    fn duplicate_match_for_same_source_is_not_a_collision() {
        let a = match_for("vim", ".vimrc", NAME, OptionMap::new());
        let b = match_for("vim", ".vimrc", NAME, OptionMap::new());
        let actions = SymlinkHandler.process(&[a, b], &test_env()).unwrap();
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn validate_rejects_unknown_keys_and_bad_types() {
        let mut unknown = OptionMap::new();
        unknown.insert("bogus".to_string(), "x".into());
        assert!(matches!(
            SymlinkHandler.validate_options(&unknown).unwrap_err(),
            HandlerError::UnknownOption { .. }
        ));

        let mut bad_type = OptionMap::new();
        bad_type.insert("target_dir".to_string(), crate::options::OptionValue::Int(3));
        assert!(matches!(
            SymlinkHandler.validate_options(&bad_type).unwrap_err(),
            HandlerError::InvalidOption { .. }
        ));
    }

    #[test]
    fn clear_removes_only_owned_public_links() {
        let fs = MemFs::new();
        let store = DataStore::new(PathBuf::from("/data"));
        fs.mkdir_all(Path::new("/home/user"), 0o755).unwrap();
        fs.mkdir_all(Path::new("/dotfiles/vim"), 0o755).unwrap();
        fs.write_file(Path::new("/dotfiles/vim/.vimrc"), b"set nu", 0o644)
            .unwrap();

        // Owned chain: public -> intermediate -> source, plus sidecar.
        store
            .record_link(
                &fs,
                "vim",
                ".vimrc",
                Path::new("/dotfiles/vim/.vimrc"),
                Path::new("/home/user/.vimrc"),
            )
            .unwrap();
        fs.symlink(
            &store.link_intermediate_path("vim", ".vimrc"),
            Path::new("/home/user/.vimrc"),
        )
        .unwrap();

        // Foreign symlink with a recorded name but retargeted by the user.
        fs.write_file(Path::new("/home/user/elsewhere"), b"", 0o644)
            .unwrap();

        let ctx = ClearContext {
            pack: "vim",
            fs: &fs,
            store: &store,
            dry_run: false,
        };
        let items = SymlinkHandler.clear(&ctx).unwrap();
        assert_eq!(items.len(), 1);
        assert!(!fs.exists(Path::new("/home/user/.vimrc")));
        assert!(fs.exists(Path::new("/home/user/elsewhere")));
    }

    #[test]
    fn clear_dry_run_enumerates_without_removing() {
        let fs = MemFs::new();
        let store = DataStore::new(PathBuf::from("/data"));
        fs.mkdir_all(Path::new("/home/user"), 0o755).unwrap();
        fs.mkdir_all(Path::new("/dotfiles/vim"), 0o755).unwrap();
        fs.write_file(Path::new("/dotfiles/vim/.vimrc"), b"", 0o644)
            .unwrap();
        store
            .record_link(
                &fs,
                "vim",
                ".vimrc",
                Path::new("/dotfiles/vim/.vimrc"),
                Path::new("/home/user/.vimrc"),
            )
            .unwrap();
        fs.symlink(
            &store.link_intermediate_path("vim", ".vimrc"),
            Path::new("/home/user/.vimrc"),
        )
        .unwrap();

        let ctx = ClearContext {
            pack: "vim",
            fs: &fs,
            store: &store,
            dry_run: true,
        };
        let items = SymlinkHandler.clear(&ctx).unwrap();
        assert_eq!(items.len(), 1);
        assert!(fs.exists(Path::new("/home/user/.vimrc")));
    }
}
