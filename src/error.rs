//! Domain-specific error types for the dodot engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`RegistryError`],
//! [`StoreError`]) while command handlers at the CLI boundary convert them to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! DodotError
//! ├── Config(ConfigError)       — pack config parsing, matcher validation
//! ├── Registry(RegistryError)   — trigger/handler registry lookups
//! ├── Handler(HandlerError)     — action production and clear failures
//! ├── Store(StoreError)         — data-store layout and sentinel I/O
//! └── Execution(ExecutionError) — conflicts, command failures, timeouts
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the dodot engine.
///
/// Aggregates domain-specific sub-errors and is convertible to
/// [`anyhow::Error`] for use at CLI command boundaries.
#[derive(Error, Debug)]
pub enum DodotError {
    /// Configuration-related error (pack config parsing, matcher validation).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry lookup or registration error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Handler failure producing actions or clearing state.
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    /// Data-store operation error (layout, sentinels, shell init).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Execution error (conflicts, external commands, timeouts).
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Invariant violation that should never escape the engine.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors that arise from configuration loading and matcher validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A matcher references a trigger name absent from the trigger registry.
    #[error("Matcher '{matcher}' references unknown trigger '{trigger}'")]
    UnknownTrigger {
        /// Name of the offending matcher.
        matcher: String,
        /// The unresolved trigger name.
        trigger: String,
    },

    /// A matcher references a handler name absent from the handler registry.
    #[error("Matcher '{matcher}' references unknown handler '{handler}'")]
    UnknownHandler {
        /// Name of the offending matcher.
        matcher: String,
        /// The unresolved handler name.
        handler: String,
    },

    /// A pack config file contains a syntax error that prevents parsing.
    #[error("Invalid TOML in {file}: {message}")]
    InvalidSyntax {
        /// Path of the file that failed to parse.
        file: String,
        /// Parser diagnostic.
        message: String,
    },

    /// An option value has a type the consumer cannot accept.
    #[error("Invalid option '{key}': {message}")]
    InvalidOption {
        /// The offending option key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A glob pattern failed to compile.
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// Compiler diagnostic.
        message: String,
    },

    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that arise from registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An empty name was passed to `register` or `get`.
    #[error("Registry names must not be empty")]
    EmptyName,

    /// An item with the same name is already registered.
    #[error("'{0}' is already registered")]
    AlreadyExists(String),

    /// No item with the given name is registered.
    #[error("'{0}' is not registered")]
    NotFound(String),
}

/// Errors that arise while handlers turn matches into actions or clear state.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// An option map contains a key the handler does not understand.
    #[error("Handler '{handler}' does not accept option '{key}'")]
    UnknownOption {
        /// Handler that rejected the option.
        handler: String,
        /// The unrecognised key.
        key: String,
    },

    /// An option value has the wrong type for the handler's schema.
    #[error("Handler '{handler}' option '{key}': {message}")]
    InvalidOption {
        /// Handler that rejected the option.
        handler: String,
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Two matches within one `process` call map to the same target path.
    #[error("Handler '{handler}': targets collide at {target}")]
    TargetCollision {
        /// Handler that detected the collision.
        handler: String,
        /// The contested target path.
        target: PathBuf,
    },

    /// The handler failed to produce actions for its matches.
    #[error("Handler '{handler}' failed: {message}")]
    ProcessFailed {
        /// Handler that failed.
        handler: String,
        /// Human-readable reason.
        message: String,
    },

    /// The handler failed while enumerating items to clear.
    #[error("Handler '{handler}' clear failed: {message}")]
    ClearFailed {
        /// Handler that failed.
        handler: String,
        /// Human-readable reason.
        message: String,
    },
}

/// Errors that arise from data-store operations.
///
/// `NotFound` is kept distinct from `Io` so callers can treat absent
/// sentinels and intermediate links as "needs work" rather than failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A required store path does not exist.
    #[error("Store entry not found: {0}")]
    NotFound(PathBuf),

    /// An I/O failure that is not a simple not-found.
    #[error("Store I/O error at {path}: {source}")]
    Io {
        /// The path that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The store root directory could not be created.
    ///
    /// Fatal for the affected pack; remaining actions are aborted.
    #[error("Cannot create store directory {path}: {source}")]
    RootUnavailable {
        /// The directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl StoreError {
    /// Build a `StoreError` from an I/O error at `path`, mapping
    /// [`std::io::ErrorKind::NotFound`] to [`StoreError::NotFound`].
    #[must_use]
    pub fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// `true` if this error is a simple not-found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors that arise while the executor applies actions.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The public target collides with a file dodot does not own.
    #[error("Conflict at {target}: {reason} (use --force to replace)")]
    Conflict {
        /// The contested public path.
        target: PathBuf,
        /// What occupies the target.
        reason: String,
    },

    /// An external command exited non-zero.
    #[error("Command '{command}' failed (exit {code})")]
    CommandFailed {
        /// The command that was run.
        command: String,
        /// Its exit code (`-1` when terminated by signal).
        code: i32,
    },

    /// An external command exceeded its timeout.
    #[error("Command '{command}' timed out after {seconds}s")]
    Timeout {
        /// The command that was run.
        command: String,
        /// The configured timeout in seconds.
        seconds: u64,
    },

    /// The run was cancelled between actions.
    #[error("Run cancelled")]
    Cancelled,

    /// An I/O failure while applying a filesystem operation.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path being mutated.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
