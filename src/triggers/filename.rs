//! Filename trigger: match file entries by basename.

use std::path::Path;

use super::{Trigger, basename, compile_pattern, is_glob};
use crate::error::ConfigError;
use crate::fsys::FileKind;
use crate::options::{OptionMap, get_str};

/// Registry name for this trigger.
pub const NAME: &str = "filename";

/// Matches regular files whose basename equals or globs the pattern.
///
/// Glob matching is used only when the pattern carries glob
/// metacharacters; otherwise the comparison is an exact string match.
/// Directory entries never match.
#[derive(Debug)]
pub struct FileNameTrigger {
    pattern: String,
    compiled: Option<glob::Pattern>,
}

impl FileNameTrigger {
    /// Build from a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when a glob pattern fails to
    /// compile.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let compiled = if is_glob(pattern) {
            Some(compile_pattern(pattern)?)
        } else {
            None
        };
        Ok(Self {
            pattern: pattern.to_string(),
            compiled,
        })
    }

    /// Build from a matcher option map (`pattern` key, required).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when `pattern` is missing or
    /// has the wrong type.
    pub fn from_options(options: &OptionMap) -> Result<Self, ConfigError> {
        let pattern = get_str(options, "pattern")?.ok_or_else(|| ConfigError::InvalidOption {
            key: "pattern".to_string(),
            message: "filename trigger requires a pattern".to_string(),
        })?;
        Self::new(pattern)
    }
}

impl Trigger for FileNameTrigger {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        50
    }

    fn matches(&self, relative_path: &Path, kind: FileKind) -> Option<OptionMap> {
        if kind == FileKind::Dir {
            return None;
        }
        let name = basename(relative_path)?;
        let hit = self
            .compiled
            .as_ref()
            .map_or_else(|| name == self.pattern, |p| p.matches(name));
        hit.then(|| {
            let mut meta = OptionMap::new();
            meta.insert("pattern".to_string(), self.pattern.as_str().into());
            meta
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_without_glob_chars() {
        let t = FileNameTrigger::new("Brewfile").unwrap();
        assert!(t.matches(Path::new("Brewfile"), FileKind::File).is_some());
        assert!(t.matches(Path::new("Brewfile.lock"), FileKind::File).is_none());
    }

    #[test]
    fn glob_match_with_star() {
        let t = FileNameTrigger::new("*.sh").unwrap();
        assert!(t.matches(Path::new("install.sh"), FileKind::File).is_some());
        assert!(t.matches(Path::new("install.bash"), FileKind::File).is_none());
    }

    #[test]
    fn directories_never_match() {
        let t = FileNameTrigger::new("bin").unwrap();
        assert!(t.matches(Path::new("bin"), FileKind::Dir).is_none());
        assert!(t.matches(Path::new("bin"), FileKind::File).is_some());
    }

    #[test]
    fn dotfiles_match_exactly() {
        let t = FileNameTrigger::new(".vimrc").unwrap();
        assert!(t.matches(Path::new(".vimrc"), FileKind::File).is_some());
    }

    #[test]
    fn metadata_carries_pattern() {
        let t = FileNameTrigger::new("*.tmpl").unwrap();
        let meta = t.matches(Path::new("gitconfig.tmpl"), FileKind::File).unwrap();
        assert_eq!(
            meta.get("pattern").and_then(crate::options::OptionValue::as_str),
            Some("*.tmpl")
        );
    }

    #[test]
    fn from_options_requires_pattern() {
        assert!(FileNameTrigger::from_options(&OptionMap::new()).is_err());
    }

    #[test]
    fn symlink_entries_match_like_files() {
        let t = FileNameTrigger::new("*.conf").unwrap();
        assert!(t.matches(Path::new("app.conf"), FileKind::Symlink).is_some());
    }
}
