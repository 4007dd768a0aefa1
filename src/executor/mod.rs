//! The executor: turning actions into filesystem effects.
//!
//! Actions run in submission order, one pack at a time. Links go through
//! the store's two-link indirection; PATH and shell registrations write
//! store markers (the shell init script is regenerated once per run,
//! after every pack, by the deploy driver); once-actions consult their
//! sentinel before running and write it only on success. Dry-run performs
//! every check (conflict detection, provisioning queries) but mutates
//! nothing.
//!
//! Failure model: an individual action failure is recorded and the pack
//! continues; a conflict leaves sentinels untouched so retry stays
//! possible; a store-root failure aborts the pack's remaining actions; a
//! cancellation request is honoured between actions, reporting the
//! remainder as skipped.

mod conflict;

pub use conflict::{TargetState, inspect_target};

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::checksum::file_checksum;
use crate::error::StoreError;
use crate::exec::{ExecRequest, Executor};
use crate::fsys::{Fs, write_file_atomic};
use crate::handlers::{Action, template};
use crate::results::{ActionStatus, HandlerResult, PackExecutionResult};
use crate::store::DataStore;

/// Cooperative cancellation flag, checked between actions.
pub type CancelFlag = Arc<AtomicBool>;

/// Run-wide execution options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Check everything, mutate nothing.
    pub dry_run: bool,
    /// Displace foreign files into backups instead of conflicting.
    pub force: bool,
    /// Per-command timeout for once-actions.
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            timeout: crate::exec::DEFAULT_TIMEOUT,
        }
    }
}

/// Executes one pack's action list against the filesystem and store.
#[derive(Debug)]
pub struct ActionExecutor<'a> {
    fs: &'a dyn Fs,
    store: &'a DataStore,
    runner: &'a dyn Executor,
    cancel: CancelFlag,
    options: RunOptions,
}

/// Outcome of a single action, before bookkeeping.
type ActionOutcome = (ActionStatus, Option<String>);

impl<'a> ActionExecutor<'a> {
    /// Build an executor over the given collaborators.
    #[must_use]
    pub fn new(
        fs: &'a dyn Fs,
        store: &'a DataStore,
        runner: &'a dyn Executor,
        cancel: CancelFlag,
        options: RunOptions,
    ) -> Self {
        Self {
            fs,
            store,
            runner,
            cancel,
            options,
        }
    }

    /// Execute one pack's ordered actions and roll up the result.
    ///
    /// Shell-init regeneration is the caller's job, once per run after
    /// every pack; see [`crate::store::regenerate_shell_init`]. Markers
    /// written here feed it.
    #[must_use]
    pub fn execute_pack(&self, pack: &str, actions: &[Action]) -> PackExecutionResult {
        let mut order: Vec<String> = Vec::new();
        let mut results: std::collections::BTreeMap<String, HandlerResult> =
            std::collections::BTreeMap::new();

        for (index, action) in actions.iter().enumerate() {
            let handler = action.handler_name().to_string();
            if !order.contains(&handler) {
                order.push(handler.clone());
            }
            let result = results
                .entry(handler.clone())
                .or_insert_with(|| HandlerResult::begin(pack, &handler));
            result.touch_file(action.subject().clone());

            if self.cancel.load(Ordering::SeqCst) {
                result.record(&action.describe(), ActionStatus::Skipped, Some("cancelled"));
                let rest = actions.get(index + 1..).unwrap_or(&[]);
                self.skip_rest(pack, rest, &mut order, &mut results, "cancelled");
                break;
            }

            match self.apply(action) {
                Ok((status, message)) => {
                    result.record(&action.describe(), status, message.as_deref());
                }
                Err(fatal) => {
                    result.record(
                        &action.describe(),
                        ActionStatus::Error,
                        Some(&fatal.to_string()),
                    );
                    let rest = actions.get(index + 1..).unwrap_or(&[]);
                    self.skip_rest(pack, rest, &mut order, &mut results, "aborted: store unavailable");
                    break;
                }
            }
        }

        let mut handler_results = Vec::with_capacity(order.len());
        for name in order {
            if let Some(mut result) = results.remove(&name) {
                result.finish();
                handler_results.push(result);
            }
        }
        PackExecutionResult::from_handlers(pack, handler_results)
    }

    fn skip_rest(
        &self,
        pack: &str,
        rest: &[Action],
        order: &mut Vec<String>,
        results: &mut std::collections::BTreeMap<String, HandlerResult>,
        reason: &str,
    ) {
        for action in rest {
            let handler = action.handler_name().to_string();
            if !order.contains(&handler) {
                order.push(handler.clone());
            }
            let result = results
                .entry(handler.clone())
                .or_insert_with(|| HandlerResult::begin(pack, &handler));
            result.record(&action.describe(), ActionStatus::Skipped, Some(reason));
        }
    }

    /// Translate and apply one action.
    ///
    /// `Ok` carries the per-action status; `Err` is reserved for fatal
    /// store failures that abort the pack.
    fn apply(&self, action: &Action) -> Result<ActionOutcome, StoreError> {
        match action {
            Action::Link {
                pack,
                source,
                target,
                ..
            } => self.apply_link(pack, source, target),
            Action::PathAdd { pack, dir, .. } => self.apply_marker(pack, dir, MarkerKind::Path),
            Action::ShellSource { pack, script, .. } => {
                self.apply_marker(pack, script, MarkerKind::Shell)
            }
            Action::Brew { pack, brewfile, .. } => {
                let sentinel = self.store.brew_sentinel_path(pack);
                self.apply_once(pack, brewfile, &sentinel, &brew_request(brewfile, self.options.timeout))
            }
            Action::Install {
                pack,
                script,
                args,
                sentinel,
                ..
            } => {
                let sentinel = self.store.install_sentinel_path(pack, sentinel);
                self.apply_once(
                    pack,
                    script,
                    &sentinel,
                    &install_request(script, args, self.options.timeout),
                )
            }
            Action::Template {
                source,
                target,
                variables,
                ..
            } => Ok(self.apply_template(source, target, variables)),
        }
    }

    fn apply_link(
        &self,
        pack: &str,
        source: &Path,
        target: &Path,
    ) -> Result<ActionOutcome, StoreError> {
        let state = match inspect_target(self.fs, self.store, target, source) {
            Ok(state) => state,
            Err(err) => {
                return Ok((
                    ActionStatus::Error,
                    Some(format!("inspecting {}: {err}", target.display())),
                ));
            }
        };

        if !state.replaceable() && !self.options.force {
            return Ok((
                ActionStatus::Conflict,
                Some(format!("{}: {}", target.display(), state.describe())),
            ));
        }

        if self.options.dry_run {
            return Ok((ActionStatus::Ready, None));
        }

        if let Some(parent) = target.parent() {
            self.fs
                .mkdir_all(parent, 0o755)
                .map_err(|source| StoreError::RootUnavailable {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.store.record_link(self.fs, pack, &name, source, target)?;

        // Clear whatever occupies the target, backing up anything foreign.
        match state {
            TargetState::Vacant => {}
            TargetState::OwnedSymlink | TargetState::IdenticalFile => {
                if let Err(err) = self.fs.remove(target) {
                    return Ok((
                        ActionStatus::Error,
                        Some(format!("removing {}: {err}", target.display())),
                    ));
                }
            }
            TargetState::DifferingFile | TargetState::ForeignSymlink | TargetState::Directory => {
                match self.store.back_up(self.fs, target) {
                    Ok(backup) => {
                        tracing::info!(
                            "backed up {} to {}",
                            target.display(),
                            backup.display()
                        );
                    }
                    Err(err) => {
                        return Ok((ActionStatus::Error, Some(err.to_string())));
                    }
                }
            }
        }

        let intermediate = self.store.link_intermediate_path(pack, &name);
        match self.fs.symlink(&intermediate, target) {
            Ok(()) => Ok((ActionStatus::Ready, None)),
            Err(err) => Ok((
                ActionStatus::Error,
                Some(format!("linking {}: {err}", target.display())),
            )),
        }
    }

    fn apply_marker(
        &self,
        pack: &str,
        recorded: &Path,
        kind: MarkerKind,
    ) -> Result<ActionOutcome, StoreError> {
        if self.options.dry_run {
            return Ok((ActionStatus::Ready, None));
        }
        let name = recorded
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match kind {
            MarkerKind::Path => self.store.record_path(self.fs, pack, &name, recorded)?,
            MarkerKind::Shell => {
                self.store.record_shell_profile(self.fs, pack, &name, recorded)?;
            }
        }
        Ok((ActionStatus::Ready, None))
    }

    fn apply_once(
        &self,
        _pack: &str,
        guard_source: &Path,
        sentinel: &Path,
        request: &ExecRequest,
    ) -> Result<ActionOutcome, StoreError> {
        let checksum = file_checksum(self.fs, guard_source);
        if checksum.is_empty() {
            return Ok((
                ActionStatus::Error,
                Some(format!("missing or unreadable: {}", guard_source.display())),
            ));
        }
        let needs = self.store.needs_provisioning(self.fs, sentinel, &checksum)?;
        if !needs {
            return Ok((ActionStatus::Skipped, Some("up to date".to_string())));
        }
        if self.options.dry_run {
            return Ok((ActionStatus::Ready, None));
        }

        match self.runner.run(request) {
            Ok(result) if result.success => {
                // The sentinel records the checksum computed before the run,
                // so an edit during execution re-arms the action.
                self.store.write_sentinel(self.fs, sentinel, &checksum)?;
                Ok((ActionStatus::Ready, None))
            }
            Ok(result) => Ok((
                ActionStatus::Error,
                Some(format!(
                    "{} exited {}: {}",
                    request.program,
                    result.code.unwrap_or(-1),
                    result.stderr.trim()
                )),
            )),
            Err(err) => Ok((ActionStatus::Error, Some(err.to_string()))),
        }
    }

    fn apply_template(
        &self,
        source: &Path,
        target: &Path,
        variables: &std::collections::BTreeMap<String, String>,
    ) -> ActionOutcome {
        let content = match self.fs.read_file(source) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(err) => {
                return (
                    ActionStatus::Error,
                    Some(format!("reading {}: {err}", source.display())),
                );
            }
        };
        let rendered = template::render(&content, variables);

        match self.fs.lstat(target) {
            Ok(info) if info.is_dir() => {
                return (
                    ActionStatus::Conflict,
                    Some(format!("{}: directory", target.display())),
                );
            }
            Ok(info) if !info.is_symlink() => {
                if self
                    .fs
                    .read_file(target)
                    .map(|existing| existing == rendered.as_bytes())
                    .unwrap_or(false)
                {
                    return (ActionStatus::Skipped, Some("up to date".to_string()));
                }
                if !self.options.force {
                    return (
                        ActionStatus::Conflict,
                        Some(format!("{}: exists with different content", target.display())),
                    );
                }
            }
            Ok(_) | Err(_) => {}
        }

        if self.options.dry_run {
            return (ActionStatus::Ready, None);
        }
        if let Some(parent) = target.parent()
            && let Err(err) = self.fs.mkdir_all(parent, 0o755)
        {
            return (
                ActionStatus::Error,
                Some(format!("creating {}: {err}", parent.display())),
            );
        }
        if self.options.force && self.fs.exists(target) {
            if let Err(err) = self.store.back_up(self.fs, target) {
                return (ActionStatus::Error, Some(err.to_string()));
            }
        }
        match write_file_atomic(self.fs, target, rendered.as_bytes(), 0o644) {
            Ok(()) => (ActionStatus::Ready, None),
            Err(err) => (
                ActionStatus::Error,
                Some(format!("writing {}: {err}", target.display())),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MarkerKind {
    Path,
    Shell,
}

fn brew_request(brewfile: &Path, timeout: Duration) -> ExecRequest {
    let mut request = ExecRequest::new(
        "brew",
        &["bundle", "--file", &brewfile.to_string_lossy()],
    )
    .with_timeout(timeout);
    if let Some(dir) = brewfile.parent() {
        request = request.in_dir(dir);
    }
    request
}

fn install_request(script: &Path, args: &[String], timeout: Duration) -> ExecRequest {
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let mut request =
        ExecRequest::new(script.to_string_lossy().to_string(), &arg_refs).with_timeout(timeout);
    if let Some(dir) = script.parent() {
        request = request.in_dir(dir);
    }
    request
}
