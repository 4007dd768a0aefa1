//! Logging facade for structured console output.
//!
//! Wraps [`tracing`] with a small [`Logger`] type that knows about dry-run
//! mode and collects per-pack outcomes for the end-of-run summary table.
//! Console verbosity is controlled by the `-v` flag (or `RUST_LOG`); colour
//! is suppressed when `NO_COLOR` is set or stdout is not a terminal.

use std::io::IsTerminal as _;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::results::PackStatus;

/// Install the global tracing subscriber.
///
/// Verbose mode lowers the default filter to `debug`; `RUST_LOG` overrides
/// both. ANSI colour is disabled when `NO_COLOR` is set (any value) or when
/// stderr is not a terminal.
pub fn init_subscriber(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let use_colour = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_colour)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// One recorded pack outcome for the summary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    /// Pack name.
    pub name: String,
    /// Aggregated pack status.
    pub status: PackStatus,
    /// Optional detail (e.g. first error message).
    pub message: Option<String>,
}

/// Structured logger with dry-run awareness and summary collection.
#[derive(Debug)]
pub struct Logger {
    packs: Mutex<Vec<PackEntry>>,
    dry_run: bool,
}

impl Logger {
    /// Create a new logger.
    #[must_use]
    pub const fn new(dry_run: bool) -> Self {
        Self {
            packs: Mutex::new(Vec::new()),
            dry_run,
        }
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "dodot::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed unless verbose).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a would-be action in dry-run mode.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: "dodot::dry_run", "would {msg}");
    }

    /// `true` when this run is a dry run.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Record a pack outcome for the summary.
    pub fn record_pack(&self, name: &str, status: PackStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.packs.lock() {
            guard.push(PackEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Return a clone of all recorded pack entries.
    #[must_use]
    pub fn pack_entries(&self) -> Vec<PackEntry> {
        self.packs.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Count packs that finished in [`PackStatus::Error`] or
    /// [`PackStatus::Partial`].
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.packs.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|p| matches!(p.status, PackStatus::Error | PackStatus::Partial))
                .count()
        })
    }

    /// `true` if any recorded pack failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Print the summary of all recorded packs to stdout.
    #[allow(clippy::print_stdout)]
    pub fn print_summary(&self) {
        let packs = match self.packs.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        if packs.is_empty() {
            return;
        }

        let colour = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
        println!();
        for pack in &packs {
            let (icon, code) = status_icon(pack.status);
            let line = pack.message.as_ref().map_or_else(
                || format!("{icon} {}", pack.name),
                |m| format!("{icon} {} ({m})", pack.name),
            );
            if colour {
                println!("{code}{line}\x1b[0m");
            } else {
                println!("{line}");
            }
        }
        if self.dry_run {
            println!();
            println!("dry run: no changes were made");
        }
    }
}

/// Icon and ANSI colour code for a pack status.
const fn status_icon(status: PackStatus) -> (&'static str, &'static str) {
    match status {
        PackStatus::Success => ("✓", "\x1b[32m"),
        PackStatus::Partial => ("±", "\x1b[33m"),
        PackStatus::Error => ("✗", "\x1b[31m"),
        PackStatus::Skipped => ("·", "\x1b[2m"),
        PackStatus::Pending => ("…", "\x1b[36m"),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn failure_count_counts_error_and_partial() {
        let log = Logger::new(false);
        log.record_pack("vim", PackStatus::Success, None);
        log.record_pack("dev", PackStatus::Error, Some("install.sh exited 1"));
        log.record_pack("misc", PackStatus::Partial, None);
        log.record_pack("tmux", PackStatus::Skipped, None);
        assert_eq!(log.failure_count(), 2);
        assert!(log.has_failures());
    }

    #[test]
    fn no_failures_when_all_success_or_skipped() {
        let log = Logger::new(false);
        log.record_pack("vim", PackStatus::Success, None);
        log.record_pack("tmux", PackStatus::Skipped, None);
        assert!(!log.has_failures());
    }

    #[test]
    fn entries_preserve_order_and_messages() {
        let log = Logger::new(true);
        log.record_pack("a", PackStatus::Success, None);
        log.record_pack("b", PackStatus::Error, Some("boom"));
        let entries = log.pack_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[1].message.as_deref(), Some("boom"));
    }

    #[test]
    fn dry_run_flag_is_exposed() {
        assert!(Logger::new(true).is_dry_run());
        assert!(!Logger::new(false).is_dry_run());
    }

    #[test]
    fn icons_are_distinct() {
        let icons: Vec<&str> = [
            PackStatus::Success,
            PackStatus::Partial,
            PackStatus::Error,
            PackStatus::Skipped,
            PackStatus::Pending,
        ]
        .into_iter()
        .map(|s| status_icon(s).0)
        .collect();
        let unique: std::collections::BTreeSet<&&str> = icons.iter().collect();
        assert_eq!(unique.len(), icons.len());
    }
}
