//! Status probe: a read-only traversal producing the display model.
//!
//! For each pack the probe runs the scanner, derives the expected action
//! for every match, and asks the data store what state that action is in
//! on disk. Nothing is mutated; the output is a serialisable model the
//! display layer renders (and `--json` emits verbatim).

use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

use crate::fsys::Fs;
use crate::handlers::{Action, HandlerEnv};
use crate::matchers::Matcher;
use crate::packs::Pack;
use crate::pipeline::actions_for_matches;
use crate::registries::Registries;
use crate::scanner::{effective_matcher_set, scan_pack};
use crate::store::{DataStore, EntryState};

/// Display state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// On-disk state matches the store.
    Deployed,
    /// Would change on the next deploy.
    Pending,
    /// Blocked by a foreign file.
    Conflict,
    /// The probe itself failed for this file.
    Error,
}

impl FileState {
    /// One-character display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Deployed => "✓",
            Self::Pending => "○",
            Self::Conflict => "✗",
            Self::Error => "!",
        }
    }
}

/// Display status of one pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackDisplayStatus {
    /// Everything deployed.
    Success,
    /// Mixed deployed and blocked files.
    Partial,
    /// Every file blocked.
    Error,
    /// Pack carries the ignore marker.
    Ignored,
    /// At least one file waiting to deploy, none blocked.
    Pending,
}

/// One file row in the display model.
#[derive(Debug, Clone, Serialize)]
pub struct FileDisplay {
    /// Handler that would process the file.
    pub handler: String,
    /// Pack-relative path.
    pub path: PathBuf,
    /// Classified state.
    pub status: FileState,
    /// Detail line.
    pub message: String,
    /// `true` when routed by a pack override rule.
    pub is_override: bool,
    /// When the once-action last succeeded, from its sentinel mtime.
    pub last_executed: Option<SystemTime>,
    /// Display symbol for the state.
    pub symbol: &'static str,
}

/// One pack row in the display model.
#[derive(Debug, Clone, Serialize)]
pub struct PackDisplay {
    /// Pack name.
    pub name: String,
    /// Aggregated status.
    pub status: PackDisplayStatus,
    /// `true` when a pack config file is present.
    pub has_config: bool,
    /// `true` when the ignore marker is present.
    pub is_ignored: bool,
    /// Per-file rows.
    pub files: Vec<FileDisplay>,
}

/// The full display model for one status run.
#[derive(Debug, Serialize)]
pub struct DisplayResult {
    /// The driving command (always `status` today).
    pub command: String,
    /// Per-pack rows in discovery order.
    pub packs: Vec<PackDisplay>,
    /// Whether the surrounding run was a dry run.
    pub dry_run: bool,
    /// Probe time.
    pub timestamp: SystemTime,
}

/// Probe every pack and build the display model.
#[must_use]
pub fn probe(
    fs: &dyn Fs,
    store: &DataStore,
    registries: &Registries,
    packs: &[Pack],
    global_matchers: &[Matcher],
    env: &HandlerEnv,
    dry_run: bool,
) -> DisplayResult {
    let mut rows = Vec::with_capacity(packs.len());
    for pack in packs {
        rows.push(probe_pack(fs, store, registries, pack, global_matchers, env));
    }
    DisplayResult {
        command: "status".to_string(),
        packs: rows,
        dry_run,
        timestamp: SystemTime::now(),
    }
}

/// Probe one pack.
#[must_use]
pub fn probe_pack(
    fs: &dyn Fs,
    store: &DataStore,
    registries: &Registries,
    pack: &Pack,
    global_matchers: &[Matcher],
    env: &HandlerEnv,
) -> PackDisplay {
    if pack.ignored {
        return PackDisplay {
            name: pack.name.clone(),
            status: PackDisplayStatus::Ignored,
            has_config: pack.has_config,
            is_ignored: true,
            files: Vec::new(),
        };
    }

    let mut files = Vec::new();
    match effective_matcher_set(pack, global_matchers, registries) {
        Ok(set) => {
            let report = scan_pack(fs, pack, &set, registries);
            for err in &report.errors {
                files.push(FileDisplay {
                    handler: String::new(),
                    path: PathBuf::new(),
                    status: FileState::Error,
                    message: err.to_string(),
                    is_override: false,
                    last_executed: None,
                    symbol: FileState::Error.symbol(),
                });
            }
            let overrides: Vec<PathBuf> = report
                .matches
                .iter()
                .filter(|m| m.is_override())
                .map(|m| m.relative_path.clone())
                .collect();
            let outcome = actions_for_matches(&report.matches, registries, env);
            for (handler, err) in &outcome.failures {
                files.push(FileDisplay {
                    handler: handler.clone(),
                    path: PathBuf::new(),
                    status: FileState::Error,
                    message: err.to_string(),
                    is_override: false,
                    last_executed: None,
                    symbol: FileState::Error.symbol(),
                });
            }
            for action in &outcome.actions {
                files.push(file_row(fs, store, pack, &overrides, action));
            }
        }
        Err(err) => {
            files.push(FileDisplay {
                handler: String::new(),
                path: PathBuf::new(),
                status: FileState::Error,
                message: err.to_string(),
                is_override: false,
                last_executed: None,
                symbol: FileState::Error.symbol(),
            });
        }
    }

    PackDisplay {
        name: pack.name.clone(),
        status: rollup(&files),
        has_config: pack.has_config,
        is_ignored: false,
        files,
    }
}

fn file_row(
    fs: &dyn Fs,
    store: &DataStore,
    pack: &Pack,
    overrides: &[PathBuf],
    action: &Action,
) -> FileDisplay {
    let relative = action
        .subject()
        .strip_prefix(&pack.path)
        .map_or_else(|_| action.subject().clone(), std::path::Path::to_path_buf);
    let (state, message, last_executed) = classify(fs, store, pack, action);
    FileDisplay {
        handler: action.handler_name().to_string(),
        path: relative.clone(),
        status: state,
        message,
        is_override: overrides.contains(&relative),
        last_executed,
        symbol: state.symbol(),
    }
}

fn classify(
    fs: &dyn Fs,
    store: &DataStore,
    pack: &Pack,
    action: &Action,
) -> (FileState, String, Option<SystemTime>) {
    match action {
        Action::Link { source, target, .. } => {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let status = store.symlink_status(fs, &pack.name, &name, target);
            (entry_to_file_state(&status.state), status.details, None)
        }
        Action::PathAdd { dir, .. } => {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let status = store.path_status(fs, &pack.name, &name, dir);
            (entry_to_file_state(&status.state), status.details, None)
        }
        Action::ShellSource { script, .. } => {
            let name = script
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let status = store.shell_profile_status(fs, &pack.name, &name, script);
            (entry_to_file_state(&status.state), status.details, None)
        }
        Action::Brew { brewfile, .. } => {
            once_row(fs, store, &store.brew_sentinel_path(&pack.name), brewfile)
        }
        Action::Install {
            script, sentinel, ..
        } => once_row(
            fs,
            store,
            &store.install_sentinel_path(&pack.name, sentinel),
            script,
        ),
        Action::Template {
            source,
            target,
            variables,
            ..
        } => template_row(fs, source, target, variables),
    }
}

fn once_row(
    fs: &dyn Fs,
    store: &DataStore,
    sentinel: &std::path::Path,
    guard_source: &std::path::Path,
) -> (FileState, String, Option<SystemTime>) {
    let checksum = crate::checksum::file_checksum(fs, guard_source);
    if checksum.is_empty() {
        return (
            FileState::Error,
            format!("missing or unreadable: {}", guard_source.display()),
            None,
        );
    }
    let last = store.sentinel_mtime(fs, sentinel);
    match store.needs_provisioning(fs, sentinel, &checksum) {
        Ok(false) => (FileState::Deployed, "up to date".to_string(), last),
        Ok(true) if last.is_some() => {
            (FileState::Pending, "content changed since last run".to_string(), last)
        }
        Ok(true) => (FileState::Pending, "never run".to_string(), None),
        Err(err) => (FileState::Error, err.to_string(), last),
    }
}

fn template_row(
    fs: &dyn Fs,
    source: &std::path::Path,
    target: &std::path::Path,
    variables: &std::collections::BTreeMap<String, String>,
) -> (FileState, String, Option<SystemTime>) {
    let Ok(bytes) = fs.read_file(source) else {
        return (
            FileState::Error,
            format!("missing or unreadable: {}", source.display()),
            None,
        );
    };
    let rendered =
        crate::handlers::template::render(&String::from_utf8_lossy(&bytes), variables);
    match fs.lstat(target) {
        Err(_) => (FileState::Pending, "not rendered".to_string(), None),
        Ok(info) if info.is_dir() => (
            FileState::Conflict,
            format!("{}: directory", target.display()),
            None,
        ),
        Ok(_) => match fs.read_file(target) {
            Ok(existing) if existing == rendered.as_bytes() => {
                (FileState::Deployed, "up to date".to_string(), None)
            }
            Ok(_) => (
                FileState::Conflict,
                "exists with different content".to_string(),
                None,
            ),
            Err(err) => (FileState::Error, err.to_string(), None),
        },
    }
}

const fn entry_to_file_state(state: &EntryState) -> FileState {
    match state {
        EntryState::Deployed => FileState::Deployed,
        EntryState::Pending => FileState::Pending,
        EntryState::Conflict => FileState::Conflict,
    }
}

/// Fixed aggregation: all blocked is error, mixed is partial, any pending
/// without failures is pending, otherwise success.
fn rollup(files: &[FileDisplay]) -> PackDisplayStatus {
    if files.is_empty() {
        return PackDisplayStatus::Success;
    }
    let total = files.len();
    let failed = files
        .iter()
        .filter(|f| matches!(f.status, FileState::Conflict | FileState::Error))
        .count();
    let pending = files.iter().filter(|f| f.status == FileState::Pending).count();
    if failed == total {
        PackDisplayStatus::Error
    } else if failed > 0 {
        PackDisplayStatus::Partial
    } else if pending > 0 {
        PackDisplayStatus::Pending
    } else {
        PackDisplayStatus::Success
    }
}
