//! Handler library: turning matches into actions.
//!
//! A handler is a pure function from trigger matches to actions: it never
//! touches the filesystem while producing actions. Environment-dependent
//! inputs (home directory, user, shell) arrive through [`HandlerEnv`] so
//! the pipeline stays deterministic and testable.
//!
//! Once-per-content handlers emit actions that carry their guard source
//! inline; the executor computes the checksum and consults the sentinel at
//! run time, so no split checksum action leaks out of this layer.

pub mod homebrew;
pub mod install;
pub mod shell_add_path;
pub mod shell_profile;
pub mod symlink;
pub mod template;

pub use homebrew::HomebrewHandler;
pub use install::InstallHandler;
pub use shell_add_path::ShellAddPathHandler;
pub use shell_profile::ShellProfileHandler;
pub use symlink::SymlinkHandler;
pub use template::TemplateHandler;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::fsys::Fs;
use crate::matchers::TriggerMatch;
use crate::options::{OptionMap, get_str};
use crate::registry::Registry;
use crate::store::DataStore;

/// Whether a handler's actions execute on every run or only when the
/// source content changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Idempotent actions, applied on every run.
    EveryRun,
    /// Gated by a content-checksum sentinel.
    OncePerContent,
}

/// A pack-scoped intent the executor turns into filesystem operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Create the two-link symlink chain for one source file.
    Link {
        /// Owning pack.
        pack: String,
        /// Absolute source path inside the pack.
        source: PathBuf,
        /// Absolute public target path.
        target: PathBuf,
        /// Emission priority.
        priority: i32,
        /// Trigger-supplied metadata, carried through for display.
        metadata: OptionMap,
    },
    /// Register a directory for inclusion in `PATH`.
    PathAdd {
        /// Owning pack.
        pack: String,
        /// Absolute directory path.
        dir: PathBuf,
        /// Emission priority.
        priority: i32,
    },
    /// Register a script to be sourced by the shell at startup.
    ShellSource {
        /// Owning pack.
        pack: String,
        /// Absolute script path.
        script: PathBuf,
        /// Emission priority.
        priority: i32,
    },
    /// Run `brew bundle` against a Brewfile, once per content.
    Brew {
        /// Owning pack.
        pack: String,
        /// Absolute Brewfile path; also the checksum guard source.
        brewfile: PathBuf,
        /// Emission priority.
        priority: i32,
    },
    /// Run an install script, once per content.
    Install {
        /// Owning pack.
        pack: String,
        /// Absolute script path; also the checksum guard source.
        script: PathBuf,
        /// Arguments passed to the script.
        args: Vec<String>,
        /// Sentinel file name under the pack's install subtree.
        sentinel: String,
        /// Emission priority.
        priority: i32,
    },
    /// Render a template into the target path by variable substitution.
    Template {
        /// Owning pack.
        pack: String,
        /// Absolute template source path.
        source: PathBuf,
        /// Absolute output path.
        target: PathBuf,
        /// Fully resolved substitution variables.
        variables: BTreeMap<String, String>,
        /// Emission priority.
        priority: i32,
    },
}

impl Action {
    /// The owning pack.
    #[must_use]
    pub fn pack(&self) -> &str {
        match self {
            Self::Link { pack, .. }
            | Self::PathAdd { pack, .. }
            | Self::ShellSource { pack, .. }
            | Self::Brew { pack, .. }
            | Self::Install { pack, .. }
            | Self::Template { pack, .. } => pack,
        }
    }

    /// Emission priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        match self {
            Self::Link { priority, .. }
            | Self::PathAdd { priority, .. }
            | Self::ShellSource { priority, .. }
            | Self::Brew { priority, .. }
            | Self::Install { priority, .. }
            | Self::Template { priority, .. } => *priority,
        }
    }

    /// Name of the handler this action is attributed to in results.
    #[must_use]
    pub const fn handler_name(&self) -> &'static str {
        match self {
            Self::Link { .. } => symlink::NAME,
            Self::PathAdd { .. } => shell_add_path::NAME,
            Self::ShellSource { .. } => shell_profile::NAME,
            Self::Brew { .. } => homebrew::NAME,
            Self::Install { .. } => install::NAME,
            Self::Template { .. } => template::NAME,
        }
    }

    /// The file this action is about, for per-file result reporting.
    #[must_use]
    pub fn subject(&self) -> &PathBuf {
        match self {
            Self::Link { source, .. } | Self::Template { source, .. } => source,
            Self::PathAdd { dir, .. } => dir,
            Self::ShellSource { script, .. } => script,
            Self::Brew { brewfile, .. } => brewfile,
            Self::Install { script, .. } => script,
        }
    }

    /// Human-readable one-liner.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Link { source, target, .. } => {
                format!("link {} -> {}", target.display(), source.display())
            }
            Self::PathAdd { dir, .. } => format!("add {} to PATH", dir.display()),
            Self::ShellSource { script, .. } => {
                format!("source {} at shell startup", script.display())
            }
            Self::Brew { brewfile, .. } => format!("brew bundle {}", brewfile.display()),
            Self::Install { script, .. } => format!("run {}", script.display()),
            Self::Template { source, target, .. } => {
                format!("render {} -> {}", source.display(), target.display())
            }
        }
    }
}

/// Environment-dependent inputs to handlers.
///
/// Built once per run from the real environment (or constructed directly
/// in tests), then passed through `process`.
#[derive(Debug, Clone)]
pub struct HandlerEnv {
    /// The user's home directory; default symlink and template target.
    pub home: PathBuf,
    /// Login name.
    pub user: String,
    /// Login shell.
    pub shell: String,
    /// Host name.
    pub hostname: String,
}

impl HandlerEnv {
    /// Detect from the process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
            user: std::env::var("USER").unwrap_or_default(),
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
        }
    }

    /// Fixed template variables derived from this environment.
    #[must_use]
    pub fn template_vars(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("HOME".to_string(), self.home.to_string_lossy().to_string()),
            ("USER".to_string(), self.user.clone()),
            ("SHELL".to_string(), self.shell.clone()),
            ("HOSTNAME".to_string(), self.hostname.clone()),
        ])
    }
}

/// One artefact a handler removed (or would remove) during clear.
#[derive(Debug, Clone)]
pub struct ClearedItem {
    /// Artefact kind (`"symlink"`, `"path"`, `"shell"`, `"sentinel"`).
    pub kind: &'static str,
    /// The affected path.
    pub path: PathBuf,
    /// Human-readable description.
    pub description: String,
}

/// Context handed to [`Handler::clear`].
#[derive(Debug)]
pub struct ClearContext<'a> {
    /// Pack whose state is being cleared.
    pub pack: &'a str,
    /// Filesystem to operate on.
    pub fs: &'a dyn Fs,
    /// The data store holding the pack's persisted state.
    pub store: &'a DataStore,
    /// When set, enumerate without removing anything.
    pub dry_run: bool,
}

/// An action producer for files a trigger matched.
pub trait Handler: Send + Sync + std::fmt::Debug {
    /// Stable handler name (matches its registration).
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str;

    /// Every-run or once-per-content.
    fn run_mode(&self) -> RunMode;

    /// Validate an option map against this handler's schema.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::UnknownOption`] for unrecognised keys and
    /// [`HandlerError::InvalidOption`] for type mismatches.
    fn validate_options(&self, options: &OptionMap) -> Result<(), HandlerError>;

    /// Turn matches into ordered actions.
    ///
    /// Pure with respect to the filesystem; options are read from each
    /// match's `handler_options`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the matches are contradictory (for
    /// example, colliding targets) or an option value is unusable.
    fn process(
        &self,
        matches: &[TriggerMatch],
        env: &HandlerEnv,
    ) -> Result<Vec<Action>, HandlerError>;

    /// Enumerate and (outside dry-run) remove this handler's public
    /// artefacts for the context's pack.
    ///
    /// Store-internal state is purged by the clear pipeline afterwards;
    /// this method handles only artefacts outside the store, such as
    /// public symlinks.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::ClearFailed`] when enumeration or removal
    /// fails; the pipeline then leaves the store state in place.
    fn clear(&self, ctx: &ClearContext<'_>) -> Result<Vec<ClearedItem>, HandlerError>;
}

/// Constructor for a handler configured by an option map.
///
/// The built-in handlers are stateless; their factories validate the
/// options and hand back the shared instance.
pub type HandlerFactory =
    dyn Fn(&OptionMap) -> Result<Arc<dyn Handler>, HandlerError> + Send + Sync;

/// Register every built-in handler.
///
/// # Errors
///
/// Propagates duplicate-registration errors; only possible if called twice
/// on the same registry.
pub fn register_builtin_handlers(
    registry: &Registry<dyn Handler>,
) -> Result<(), crate::error::RegistryError> {
    registry.register(symlink::NAME, Arc::new(SymlinkHandler))?;
    registry.register(shell_profile::NAME, Arc::new(ShellProfileHandler))?;
    registry.register(shell_add_path::NAME, Arc::new(ShellAddPathHandler))?;
    registry.register(homebrew::NAME, Arc::new(HomebrewHandler))?;
    registry.register(install::NAME, Arc::new(InstallHandler))?;
    registry.register(template::NAME, Arc::new(TemplateHandler))?;
    Ok(())
}

/// Register a factory per built-in handler, each validating options before
/// handing out the shared instance.
///
/// # Errors
///
/// Propagates duplicate-registration errors.
pub fn register_builtin_factories(
    factories: &Registry<HandlerFactory>,
    handlers: &Registry<dyn Handler>,
) -> Result<(), crate::error::RegistryError> {
    for name in handlers.list() {
        let handler = handlers.get(&name)?;
        let factory: Box<HandlerFactory> = Box::new(move |options: &OptionMap| {
            handler.validate_options(options)?;
            Ok(Arc::clone(&handler))
        });
        factories.register(&name, Arc::from(factory))?;
    }
    Ok(())
}

/// Reject option keys outside the allowed set.
pub(crate) fn ensure_known_keys(
    handler: &str,
    options: &OptionMap,
    allowed: &[&str],
) -> Result<(), HandlerError> {
    for key in options.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(HandlerError::UnknownOption {
                handler: handler.to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

/// Resolve the target directory for link-like handlers.
///
/// Reads `target_dir` from the options, expanding a leading `~` against
/// the handler environment's home and `$VAR` references against the
/// process environment. Falls back to the home directory.
pub(crate) fn resolve_target_dir(
    handler: &str,
    options: &OptionMap,
    env: &HandlerEnv,
) -> Result<PathBuf, HandlerError> {
    let raw = get_str(options, "target_dir").map_err(|err| HandlerError::InvalidOption {
        handler: handler.to_string(),
        key: "target_dir".to_string(),
        message: err.to_string(),
    })?;
    let Some(raw) = raw else {
        return Ok(env.home.clone());
    };
    let tilde_expanded = raw.strip_prefix('~').map_or_else(
        || raw.to_string(),
        |rest| format!("{}{rest}", env.home.to_string_lossy()),
    );
    let expanded =
        shellexpand::env(&tilde_expanded).map_err(|err| HandlerError::InvalidOption {
            handler: handler.to_string(),
            key: "target_dir".to_string(),
            message: err.to_string(),
        })?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use std::path::Path;

    /// A fixed handler environment for deterministic tests.
    #[must_use]
    pub fn test_env() -> HandlerEnv {
        HandlerEnv {
            home: PathBuf::from("/home/user"),
            user: "user".to_string(),
            shell: "/bin/zsh".to_string(),
            hostname: "testbox".to_string(),
        }
    }

    /// Build a match for `pack/<name>` with the given handler options.
    #[must_use]
    pub fn match_for(pack: &str, name: &str, handler: &str, options: OptionMap) -> TriggerMatch {
        TriggerMatch {
            trigger_name: "filename".to_string(),
            handler_name: handler.to_string(),
            pack_name: pack.to_string(),
            relative_path: PathBuf::from(name),
            absolute_path: Path::new("/dotfiles").join(pack).join(name),
            metadata: OptionMap::new(),
            handler_options: options,
            priority: 50,
        }
    }
}
