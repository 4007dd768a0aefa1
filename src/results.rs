//! Execution bookkeeping: per-handler, per-pack, and per-run results.
//!
//! Statuses follow a one-way state machine: a handler result starts
//! `Unknown` and settles into exactly one of `Ready`, `Skipped`,
//! `Conflict`, or `Error`. Pack and run rollups are fixed functions of
//! their children: all-failed is an error, all-skipped is skipped, a mixed
//! outcome is partial, anything else is success.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

/// Terminal (and initial) status of one handler's work within a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// Not yet settled.
    Unknown,
    /// Applied successfully.
    Ready,
    /// Guard said nothing to do.
    Skipped,
    /// Blocked by a foreign file; needs `--force`.
    Conflict,
    /// Failed.
    Error,
}

impl ActionStatus {
    /// `true` for statuses that count as failures in rollups.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Conflict | Self::Error)
    }
}

/// Aggregated status of one pack (or of the whole run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackStatus {
    /// Every handler ready (or nothing to do).
    Success,
    /// Some handlers failed, others did not.
    Partial,
    /// Every handler failed.
    Error,
    /// Every handler skipped.
    Skipped,
    /// Not yet executed.
    Pending,
}

/// One recorded filesystem or command operation.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    /// What was done (or would be done, in dry-run).
    pub description: String,
    /// Outcome.
    pub status: ActionStatus,
    /// Optional failure or skip detail.
    pub message: Option<String>,
}

/// Result of one handler's actions within one pack.
#[derive(Debug)]
pub struct HandlerResult {
    /// Handler name.
    pub handler: String,
    /// Owning pack.
    pub pack: String,
    /// Files the handler acted on.
    pub files: Vec<PathBuf>,
    /// Settled status.
    pub status: ActionStatus,
    /// First error message, when failed.
    pub error: Option<String>,
    /// Display message (e.g. "2 linked, 1 skipped").
    pub message: String,
    /// Individual operations, in execution order.
    pub operations: Vec<OperationRecord>,
    /// Start of the handler's first action.
    pub start: Instant,
    /// End of the handler's last action.
    pub end: Instant,
}

impl HandlerResult {
    /// Start a pending result.
    #[must_use]
    pub fn begin(pack: &str, handler: &str) -> Self {
        let now = Instant::now();
        Self {
            handler: handler.to_string(),
            pack: pack.to_string(),
            files: Vec::new(),
            status: ActionStatus::Unknown,
            error: None,
            message: String::new(),
            operations: Vec::new(),
            start: now,
            end: now,
        }
    }

    /// Record one operation and fold its status into the result.
    ///
    /// The first failure pins the handler's error message; statuses only
    /// escalate (ready < skipped < conflict < error never downgrades a
    /// recorded failure).
    pub fn record(&mut self, description: &str, status: ActionStatus, message: Option<&str>) {
        if status.is_failure() && self.error.is_none() {
            self.error = Some(message.unwrap_or(description).to_string());
        }
        self.operations.push(OperationRecord {
            description: description.to_string(),
            status,
            message: message.map(String::from),
        });
        self.status = fold_status(self.status, status);
        self.end = Instant::now();
    }

    /// Add a file this handler acted on.
    pub fn touch_file(&mut self, file: PathBuf) {
        if !self.files.contains(&file) {
            self.files.push(file);
        }
    }

    /// Close the result, settling an untouched status to `Ready`.
    pub fn finish(&mut self) {
        if self.status == ActionStatus::Unknown {
            self.status = ActionStatus::Ready;
        }
        self.message = summarize(&self.operations);
        self.end = Instant::now();
    }
}

/// Escalating fold over operation statuses.
const fn fold_status(current: ActionStatus, next: ActionStatus) -> ActionStatus {
    match (current, next) {
        (ActionStatus::Error, _) | (_, ActionStatus::Error) => ActionStatus::Error,
        (ActionStatus::Conflict, _) | (_, ActionStatus::Conflict) => ActionStatus::Conflict,
        (ActionStatus::Ready, _) | (_, ActionStatus::Ready) => ActionStatus::Ready,
        (ActionStatus::Skipped, _) | (_, ActionStatus::Skipped) => ActionStatus::Skipped,
        (ActionStatus::Unknown, ActionStatus::Unknown) => ActionStatus::Unknown,
    }
}

fn summarize(operations: &[OperationRecord]) -> String {
    let mut ready = 0u32;
    let mut skipped = 0u32;
    let mut failed = 0u32;
    for op in operations {
        match op.status {
            ActionStatus::Ready => ready += 1,
            ActionStatus::Skipped => skipped += 1,
            ActionStatus::Conflict | ActionStatus::Error => failed += 1,
            ActionStatus::Unknown => {}
        }
    }
    let mut parts = Vec::new();
    if ready > 0 {
        parts.push(format!("{ready} done"));
    }
    if skipped > 0 {
        parts.push(format!("{skipped} skipped"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

/// Counters summed across handlers and packs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunCounters {
    /// Operations applied.
    pub succeeded: u32,
    /// Operations skipped by a guard.
    pub skipped: u32,
    /// Operations blocked on a conflict.
    pub conflicts: u32,
    /// Operations that failed.
    pub failed: u32,
}

impl std::ops::AddAssign for RunCounters {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.conflicts += other.conflicts;
        self.failed += other.failed;
    }
}

impl RunCounters {
    /// Tally one handler result's operations.
    #[must_use]
    pub fn from_operations(operations: &[OperationRecord]) -> Self {
        let mut counters = Self::default();
        for op in operations {
            match op.status {
                ActionStatus::Ready => counters.succeeded += 1,
                ActionStatus::Skipped => counters.skipped += 1,
                ActionStatus::Conflict => counters.conflicts += 1,
                ActionStatus::Error => counters.failed += 1,
                ActionStatus::Unknown => {}
            }
        }
        counters
    }
}

/// Result of executing one pack.
#[derive(Debug)]
pub struct PackExecutionResult {
    /// Pack name.
    pub pack: String,
    /// Per-handler results, in execution order.
    pub handler_results: Vec<HandlerResult>,
    /// Rolled-up status.
    pub status: PackStatus,
    /// Operation counters.
    pub counters: RunCounters,
    /// Start of the pack's first action.
    pub start: Instant,
    /// End of the pack's last action.
    pub end: Instant,
}

impl PackExecutionResult {
    /// Roll up handler results into a pack result.
    #[must_use]
    pub fn from_handlers(pack: &str, handler_results: Vec<HandlerResult>) -> Self {
        let now = Instant::now();
        let start = handler_results.iter().map(|h| h.start).min().unwrap_or(now);
        let end = handler_results.iter().map(|h| h.end).max().unwrap_or(now);
        let status = rollup_pack(&handler_results);
        let mut counters = RunCounters::default();
        for handler in &handler_results {
            counters += RunCounters::from_operations(&handler.operations);
        }
        Self {
            pack: pack.to_string(),
            handler_results,
            status,
            counters,
            start,
            end,
        }
    }

    /// First error message among this pack's handlers.
    #[must_use]
    pub fn first_error(&self) -> Option<&str> {
        self.handler_results.iter().find_map(|h| h.error.as_deref())
    }
}

/// The fixed pack rollup: all-failed is error, all-skipped is skipped, a
/// mix with failures is partial, otherwise success.
#[must_use]
pub fn rollup_pack(handler_results: &[HandlerResult]) -> PackStatus {
    if handler_results.is_empty() {
        return PackStatus::Success;
    }
    let total = handler_results.len();
    let failed = handler_results.iter().filter(|h| h.status.is_failure()).count();
    let skipped = handler_results
        .iter()
        .filter(|h| h.status == ActionStatus::Skipped)
        .count();
    if failed == total {
        PackStatus::Error
    } else if skipped == total {
        PackStatus::Skipped
    } else if failed > 0 {
        PackStatus::Partial
    } else {
        PackStatus::Success
    }
}

/// Result of a whole run.
#[derive(Debug)]
pub struct ExecutionContext {
    /// The driving command (`link`, `provision`, ...).
    pub command: String,
    /// Per-pack results keyed by pack name.
    pub pack_results: BTreeMap<String, PackExecutionResult>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Counters summed across packs.
    pub counters: RunCounters,
    /// Free-form run-level messages.
    pub messages: Vec<String>,
    /// Run start.
    pub start: Instant,
    /// Run end.
    pub end: Instant,
}

impl ExecutionContext {
    /// Start a run context.
    #[must_use]
    pub fn begin(command: &str, dry_run: bool) -> Self {
        let now = Instant::now();
        Self {
            command: command.to_string(),
            pack_results: BTreeMap::new(),
            dry_run,
            counters: RunCounters::default(),
            messages: Vec::new(),
            start: now,
            end: now,
        }
    }

    /// Fold in one pack's result.
    pub fn add_pack(&mut self, result: PackExecutionResult) {
        self.counters += result.counters;
        self.end = Instant::now();
        self.pack_results.insert(result.pack.clone(), result);
    }

    /// `true` when every pack finished `Success` or `Skipped`, the
    /// condition for a zero exit code.
    #[must_use]
    pub fn all_clean(&self) -> bool {
        self.pack_results
            .values()
            .all(|p| matches!(p.status, PackStatus::Success | PackStatus::Skipped))
    }
}
