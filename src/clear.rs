//! Clear pipeline: the reverse of deployment.
//!
//! For each handler with persisted state in the store, the handler's
//! `clear` removes its public artefacts (e.g. owned symlinks) and
//! enumerates what went away; the store subtree for that handler is then
//! purged. A handler-level failure leaves that handler's state in place
//! but does not stop the pack's other handlers. Dry-run enumerates
//! without removing anything.

use crate::fsys::Fs;
use crate::handlers::{ClearContext, RunMode};
use crate::registries::Registries;
use crate::results::{ActionStatus, HandlerResult, PackExecutionResult};
use crate::store::{DataStore, regenerate_shell_init};

/// Which handlers a clear run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearFilter {
    /// Every handler with persisted state.
    All,
    /// Only every-run handlers (`unlink`).
    EveryRun,
    /// Only once-per-content handlers (`unprovision`).
    OncePerContent,
}

impl ClearFilter {
    const fn admits(self, mode: RunMode) -> bool {
        match self {
            Self::All => true,
            Self::EveryRun => matches!(mode, RunMode::EveryRun),
            Self::OncePerContent => matches!(mode, RunMode::OncePerContent),
        }
    }
}

/// Clear one pack's persisted state.
///
/// Only handlers the data store actually holds state for are consulted;
/// each removes its public artefacts, then its store subtree is purged.
/// The shell init script is regenerated when PATH or shell-profile state
/// changed.
#[must_use]
pub fn clear_pack(
    fs: &dyn Fs,
    store: &DataStore,
    registries: &Registries,
    pack: &str,
    dry_run: bool,
    filter: ClearFilter,
) -> PackExecutionResult {
    let mut handler_results = Vec::new();
    let mut init_dirty = false;

    for handler_name in store.handlers_with_state(fs, pack) {
        if let Ok(handler) = registries.handlers.get(&handler_name)
            && !filter.admits(handler.run_mode())
        {
            continue;
        }
        let mut result = HandlerResult::begin(pack, &handler_name);
        let handler = match registries.handlers.get(&handler_name) {
            Ok(handler) => handler,
            Err(err) => {
                result.record(
                    &format!("clear {handler_name} state"),
                    ActionStatus::Error,
                    Some(&err.to_string()),
                );
                result.finish();
                handler_results.push(result);
                continue;
            }
        };

        let ctx = ClearContext {
            pack,
            fs,
            store,
            dry_run,
        };
        match handler.clear(&ctx) {
            Ok(items) => {
                for item in &items {
                    result.record(&item.description, ActionStatus::Ready, None);
                    result.touch_file(item.path.clone());
                }
                if items.is_empty() {
                    result.record(
                        &format!("no {handler_name} artefacts to remove"),
                        ActionStatus::Skipped,
                        None,
                    );
                }
                if dry_run {
                    result.record(
                        &format!("would purge {handler_name} state"),
                        ActionStatus::Ready,
                        None,
                    );
                } else {
                    match store.delete_provisioning_state(fs, pack, &handler_name) {
                        Ok(()) => {
                            result.record(
                                &format!("purged {handler_name} state"),
                                ActionStatus::Ready,
                                None,
                            );
                            if matches!(handler_name.as_str(), "shell_add_path" | "shell_profile")
                            {
                                init_dirty = true;
                            }
                        }
                        Err(err) => {
                            result.record(
                                &format!("purge {handler_name} state"),
                                ActionStatus::Error,
                                Some(&err.to_string()),
                            );
                        }
                    }
                }
            }
            Err(err) => {
                // State stays in place so the user can retry.
                result.record(
                    &format!("clear {handler_name} artefacts"),
                    ActionStatus::Error,
                    Some(&err.to_string()),
                );
            }
        }
        result.finish();
        handler_results.push(result);
    }

    if init_dirty && !dry_run {
        if let Err(err) = regenerate_shell_init(fs, store) {
            let mut result = HandlerResult::begin(pack, "shell_init");
            result.record(
                "regenerate shell init script",
                ActionStatus::Error,
                Some(&err.to_string()),
            );
            result.finish();
            handler_results.push(result);
        }
    }

    PackExecutionResult::from_handlers(pack, handler_results)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::executor::test_support::{MockRunner, no_cancel};
    use crate::executor::{ActionExecutor, RunOptions};
    use crate::fsys::{Fs as _, MemFs};
    use crate::handlers::Action;
    use crate::options::OptionMap;
    use crate::registries;
    use crate::registries::Registries;
    use crate::results::PackStatus;
    use std::path::{Path, PathBuf};

    /// Deploy the classic vim pack (link + PATH), then return the pieces.
    fn deployed() -> (MemFs, DataStore, Registries) {
        let fs = MemFs::new();
        let store = DataStore::new(PathBuf::from("/data"));
        store.ensure_layout(&fs).unwrap();
        fs.mkdir_all(Path::new("/home/user"), 0o755).unwrap();
        fs.mkdir_all(Path::new("/dotfiles/vim/bin"), 0o755).unwrap();
        fs.write_file(Path::new("/dotfiles/vim/.vimrc"), b"set nu", 0o644)
            .unwrap();

        let runner = MockRunner::ok();
        let exec = ActionExecutor::new(&fs, &store, &runner, no_cancel(), RunOptions::default());
        let actions = vec![
            Action::PathAdd {
                pack: "vim".to_string(),
                dir: PathBuf::from("/dotfiles/vim/bin"),
                priority: 80,
            },
            Action::Link {
                pack: "vim".to_string(),
                source: PathBuf::from("/dotfiles/vim/.vimrc"),
                target: PathBuf::from("/home/user/.vimrc"),
                priority: 0,
                metadata: OptionMap::new(),
            },
        ];
        let result = exec.execute_pack("vim", &actions);
        assert_eq!(result.status, PackStatus::Success);
        (fs, store, registries::builtin())
    }

    #[test]
    fn clear_removes_links_markers_and_regenerates_init() {
        let (fs, store, regs) = deployed();
        assert!(fs.exists(Path::new("/home/user/.vimrc")));

        let result = clear_pack(&fs, &store, &regs, "vim", false, ClearFilter::All);
        assert_eq!(result.status, PackStatus::Success);

        // Public symlink gone, store subtrees gone, init no longer lists vim.
        assert!(!fs.exists(Path::new("/home/user/.vimrc")));
        assert!(!fs.exists(&store.link_dir("vim")));
        assert!(!fs.exists(&store.path_dir("vim")));
        let init = fs.read_file(&store.shell_init_path()).unwrap();
        assert!(!String::from_utf8_lossy(&init).contains("/dotfiles/vim/bin"));
    }

    #[test]
    fn clear_leaves_foreign_files_alone() {
        let (fs, store, regs) = deployed();
        // User replaced our link with their own file after deployment.
        fs.remove(Path::new("/home/user/.vimrc")).unwrap();
        fs.write_file(Path::new("/home/user/.vimrc"), b"mine now", 0o644)
            .unwrap();

        let result = clear_pack(&fs, &store, &regs, "vim", false, ClearFilter::All);
        assert_eq!(result.status, PackStatus::Success);
        assert_eq!(
            fs.read_file(Path::new("/home/user/.vimrc")).unwrap(),
            b"mine now"
        );
        // Store state is still purged.
        assert!(!fs.exists(&store.link_dir("vim")));
    }

    #[test]
    fn clear_dry_run_removes_nothing() {
        let (fs, store, regs) = deployed();
        let result = clear_pack(&fs, &store, &regs, "vim", true, ClearFilter::All);
        assert_eq!(result.status, PackStatus::Success);
        assert!(fs.exists(Path::new("/home/user/.vimrc")));
        assert!(fs.exists(&store.link_dir("vim")));
        assert!(fs.exists(&store.path_dir("vim")));
    }

    #[test]
    fn clear_is_scoped_to_one_pack() {
        let (fs, store, regs) = deployed();
        store
            .record_path(&fs, "tools", "bin", Path::new("/dotfiles/tools/bin"))
            .unwrap();

        clear_pack(&fs, &store, &regs, "vim", false, ClearFilter::All);
        assert!(fs.exists(&store.path_dir("tools")));
        let init = fs.read_file(&store.shell_init_path()).unwrap();
        assert!(String::from_utf8_lossy(&init).contains("/dotfiles/tools/bin"));
    }

    #[test]
    fn clear_forgets_provisioning_sentinels() {
        let (fs, store, regs) = deployed();
        let sentinel = store.install_sentinel_path("vim", "install.sh");
        store.write_sentinel(&fs, &sentinel, "abc").unwrap();

        let result = clear_pack(&fs, &store, &regs, "vim", false, ClearFilter::All);
        assert_eq!(result.status, PackStatus::Success);
        assert!(!fs.exists(&sentinel));
    }

    #[test]
    fn clear_of_pack_without_state_is_empty_success() {
        let (fs, store, regs) = deployed();
        let result = clear_pack(&fs, &store, &regs, "untouched", false, ClearFilter::All);
        assert_eq!(result.status, PackStatus::Success);
        assert!(result.handler_results.is_empty());
    }

    #[test]
    fn unprovision_filter_leaves_link_state_alone() {
        let (fs, store, regs) = deployed();
        let sentinel = store.install_sentinel_path("vim", "install.sh");
        store.write_sentinel(&fs, &sentinel, "abc").unwrap();

        let result = clear_pack(&fs, &store, &regs, "vim", false, ClearFilter::OncePerContent);
        assert_eq!(result.status, PackStatus::Success);
        assert!(!fs.exists(&sentinel));
        // Every-run state untouched.
        assert!(fs.exists(Path::new("/home/user/.vimrc")));
        assert!(fs.exists(&store.link_dir("vim")));
        assert!(fs.exists(&store.path_dir("vim")));
    }

    #[test]
    fn unlink_filter_leaves_sentinels_alone() {
        let (fs, store, regs) = deployed();
        let sentinel = store.install_sentinel_path("vim", "install.sh");
        store.write_sentinel(&fs, &sentinel, "abc").unwrap();

        let result = clear_pack(&fs, &store, &regs, "vim", false, ClearFilter::EveryRun);
        assert_eq!(result.status, PackStatus::Success);
        assert!(fs.exists(&sentinel));
        assert!(!fs.exists(Path::new("/home/user/.vimrc")));
    }
}
