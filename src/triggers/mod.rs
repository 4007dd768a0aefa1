//! Trigger library: predicates that classify pack entries.
//!
//! A trigger tests a pack-relative path plus its entry kind and yields
//! optional metadata on a match. Triggers are stateless after construction;
//! per-matcher options (patterns, excludes) are supplied through the
//! factory registry when the matcher set is built.
//!
//! Specific triggers (filename, directory, extension, path pattern) are
//! evaluated before the catch-all; the scanner stops at the first match in
//! each group.

mod catchall;
mod directory;
mod extension;
mod filename;
mod path_pattern;

pub use catchall::CatchAllTrigger;
pub use directory::DirectoryTrigger;
pub use extension::ExtensionTrigger;
pub use filename::FileNameTrigger;
pub use path_pattern::PathPatternTrigger;

use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::fsys::FileKind;
use crate::options::OptionMap;
use crate::registry::Registry;

/// Whether a trigger participates in the specific pass or the fallback pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Evaluated first; first match wins.
    Specific,
    /// Evaluated only when no specific trigger matched.
    CatchAll,
}

/// A predicate over a pack entry.
pub trait Trigger: Send + Sync + std::fmt::Debug {
    /// Stable trigger name (matches its factory registration).
    fn name(&self) -> &str;

    /// Specific or catch-all.
    fn kind(&self) -> TriggerKind {
        TriggerKind::Specific
    }

    /// Default priority when the matcher does not set one. Orders matchers
    /// only within their own group.
    fn priority(&self) -> i32 {
        0
    }

    /// Test an entry; `Some(metadata)` on a match.
    ///
    /// `relative_path` is relative to the pack root and, because scanning
    /// is flat, always a single component.
    fn matches(&self, relative_path: &Path, kind: FileKind) -> Option<OptionMap>;
}

/// Constructor for a configured trigger instance.
pub type TriggerFactory =
    dyn Fn(&OptionMap) -> Result<Arc<dyn Trigger>, ConfigError> + Send + Sync;

/// Compile a glob pattern with a [`ConfigError`] on failure.
pub(crate) fn compile_pattern(pattern: &str) -> Result<glob::Pattern, ConfigError> {
    glob::Pattern::new(pattern).map_err(|err| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

/// `true` when the pattern contains glob metacharacters.
pub(crate) fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']', '{', '}'])
}

/// Entry basename as a `&str`.
pub(crate) fn basename(relative_path: &Path) -> Option<&str> {
    relative_path.file_name().and_then(|n| n.to_str())
}

/// Register every built-in trigger factory.
///
/// # Errors
///
/// Propagates duplicate-registration errors; only possible if called twice
/// on the same registry.
pub fn register_builtin_factories(
    registry: &Registry<TriggerFactory>,
) -> Result<(), crate::error::RegistryError> {
    let entries: Vec<(&str, Box<TriggerFactory>)> = vec![
        (
            filename::NAME,
            Box::new(|opts: &OptionMap| {
                FileNameTrigger::from_options(opts).map(|t| Arc::new(t) as Arc<dyn Trigger>)
            }),
        ),
        (
            directory::NAME,
            Box::new(|opts: &OptionMap| {
                DirectoryTrigger::from_options(opts).map(|t| Arc::new(t) as Arc<dyn Trigger>)
            }),
        ),
        (
            extension::NAME,
            Box::new(|opts: &OptionMap| {
                ExtensionTrigger::from_options(opts).map(|t| Arc::new(t) as Arc<dyn Trigger>)
            }),
        ),
        (
            path_pattern::NAME,
            Box::new(|opts: &OptionMap| {
                PathPatternTrigger::from_options(opts).map(|t| Arc::new(t) as Arc<dyn Trigger>)
            }),
        ),
        (
            catchall::NAME,
            Box::new(|opts: &OptionMap| {
                CatchAllTrigger::from_options(opts).map(|t| Arc::new(t) as Arc<dyn Trigger>)
            }),
        ),
    ];
    for (name, factory) in entries {
        registry.register(name, Arc::from(factory))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn builtin_factories_register_once() {
        let registry: Registry<TriggerFactory> = Registry::new();
        register_builtin_factories(&registry).unwrap();
        assert_eq!(
            registry.list(),
            vec!["catchall", "directory", "extension", "filename", "path_pattern"]
        );
        assert!(register_builtin_factories(&registry).is_err());
    }

    #[test]
    fn factories_build_configured_triggers() {
        let registry: Registry<TriggerFactory> = Registry::new();
        register_builtin_factories(&registry).unwrap();
        let factory = registry.get("filename").unwrap();
        let mut opts = OptionMap::new();
        opts.insert("pattern".to_string(), "*.sh".into());
        let trigger = factory(&opts).unwrap();
        assert_eq!(trigger.name(), "filename");
        assert!(trigger
            .matches(Path::new("install.sh"), FileKind::File)
            .is_some());
    }

    #[test]
    fn is_glob_detects_metacharacters() {
        assert!(is_glob("*.sh"));
        assert!(is_glob("file?"));
        assert!(is_glob("[ab]c"));
        assert!(!is_glob("Brewfile"));
        assert!(!is_glob(".vimrc"));
    }
}
