//! Shared run context for command orchestration.
//!
//! One [`RunContext`] is built per invocation and threaded through the
//! command layer: the dotfiles root, the data store, the registries, the
//! filesystem and command-runner collaborators, the logger, and the run
//! options. Tests construct it directly over an in-memory filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context as _, Result};

use crate::error::ConfigError;
use crate::exec::{Executor, SystemExecutor};
use crate::executor::{CancelFlag, RunOptions};
use crate::fsys::{Fs, OsFs};
use crate::handlers::HandlerEnv;
use crate::logging::Logger;
use crate::matchers::{Matcher, MatcherRecord};
use crate::registries::{self, Registries};
use crate::store::DataStore;

/// Fixed basename of the optional root-level config file carrying global
/// matchers.
pub const GLOBAL_CONFIG_FILE: &str = "dodot.toml";

/// Everything a command needs to run the pipeline.
#[derive(Debug)]
pub struct RunContext {
    /// Filesystem collaborator.
    pub fs: Arc<dyn Fs>,
    /// Data store handle.
    pub store: DataStore,
    /// Trigger/handler registries.
    pub registries: Registries,
    /// External command runner.
    pub runner: Arc<dyn Executor>,
    /// Logger for console output and the run summary.
    pub log: Arc<Logger>,
    /// Handler environment (home, user, shell, hostname).
    pub env: HandlerEnv,
    /// The dotfiles root.
    pub root: PathBuf,
    /// Dry-run / force / timeout options.
    pub options: RunOptions,
    /// Run packs in parallel when more than one is selected.
    pub parallel: bool,
    /// Cooperative cancellation flag, set from Ctrl-C.
    pub cancel: CancelFlag,
    /// Matchers from the root-level config, layered over the defaults.
    pub global_matchers: Vec<Matcher>,
}

impl RunContext {
    /// Build a context over the real filesystem and system executor.
    ///
    /// # Errors
    ///
    /// Returns an error when the dotfiles root cannot be resolved or the
    /// root-level config fails to parse.
    pub fn from_environment(
        root: Option<&Path>,
        data_dir: Option<&Path>,
        options: RunOptions,
        parallel: bool,
        log: Arc<Logger>,
    ) -> Result<Self> {
        let fs: Arc<dyn Fs> = Arc::new(OsFs);
        let root = resolve_root(root)?;
        let store = DataStore::new(
            data_dir.map_or_else(DataStore::default_root, Path::to_path_buf),
        );
        let global_matchers = load_global_matchers(fs.as_ref(), &root)
            .with_context(|| format!("loading {}", root.join(GLOBAL_CONFIG_FILE).display()))?;
        Ok(Self {
            fs,
            store,
            registries: registries::builtin(),
            runner: Arc::new(SystemExecutor),
            log,
            env: HandlerEnv::detect(),
            root,
            options,
            parallel,
            cancel: Arc::new(AtomicBool::new(false)),
            global_matchers,
        })
    }

    /// Install a Ctrl-C handler that flips this context's cancel flag.
    pub fn install_cancel_handler(&self) {
        let flag = Arc::clone(&self.cancel);
        // Failure means a handler is already installed; the run continues
        // without cooperative cancellation.
        let _ = ctrlc::set_handler(move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });
    }
}

/// Resolve the dotfiles root: explicit flag, then `DOTFILES_ROOT`, then
/// the current directory.
///
/// # Errors
///
/// Returns an error when no candidate resolves to an existing directory.
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        anyhow::ensure!(root.is_dir(), "dotfiles root is not a directory: {}", root.display());
        return Ok(dunce::canonicalize(root)?);
    }
    if let Ok(env_root) = std::env::var("DOTFILES_ROOT") {
        let root = PathBuf::from(env_root);
        anyhow::ensure!(
            root.is_dir(),
            "DOTFILES_ROOT is not a directory: {}",
            root.display()
        );
        return Ok(dunce::canonicalize(&root)?);
    }
    let cwd = std::env::current_dir()?;
    Ok(dunce::canonicalize(&cwd)?)
}

/// Load global matchers from the root-level `dodot.toml`, if present.
///
/// # Errors
///
/// Returns [`ConfigError`] for unreadable or malformed files.
pub fn load_global_matchers(fs: &dyn Fs, root: &Path) -> Result<Vec<Matcher>, ConfigError> {
    #[derive(Debug, Default, serde::Deserialize)]
    struct GlobalConfig {
        #[serde(default)]
        matchers: Vec<MatcherRecord>,
    }

    let path = root.join(GLOBAL_CONFIG_FILE);
    let bytes = match fs.read_file(&path) {
        Ok(bytes) => bytes,
        Err(err) if crate::fsys::is_not_found(&err) => return Ok(Vec::new()),
        Err(err) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source: err,
            });
        }
    };
    let raw: GlobalConfig = toml::from_str(&String::from_utf8_lossy(&bytes)).map_err(|err| {
        ConfigError::InvalidSyntax {
            file: path.display().to_string(),
            message: err.to_string(),
        }
    })?;
    raw.matchers.into_iter().map(MatcherRecord::into_matcher).collect()
}
