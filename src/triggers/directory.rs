//! Directory trigger: match directory entries by basename.

use std::path::Path;

use super::{Trigger, basename, compile_pattern};
use crate::error::ConfigError;
use crate::fsys::FileKind;
use crate::options::{OptionMap, get_str};

/// Registry name for this trigger.
pub const NAME: &str = "directory";

/// Matches directory entries whose basename matches the glob.
#[derive(Debug)]
pub struct DirectoryTrigger {
    pattern: glob::Pattern,
}

impl DirectoryTrigger {
    /// Build from a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when the glob fails to
    /// compile.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: compile_pattern(pattern)?,
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
            message: "directory trigger requires a pattern".to_string(),
        })?;
        Self::new(pattern)
    }
}

impl Trigger for DirectoryTrigger {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        60
    }

    fn matches(&self, relative_path: &Path, kind: FileKind) -> Option<OptionMap> {
        if kind != FileKind::Dir {
            return None;
        }
        let name = basename(relative_path)?;
        self.pattern.matches(name).then(|| {
            let mut meta = OptionMap::new();
            meta.insert("directory".to_string(), name.into());
            meta
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn matches_directory_by_name() {
        let t = DirectoryTrigger::new("bin").unwrap();
        assert!(t.matches(Path::new("bin"), FileKind::Dir).is_some());
        assert!(t.matches(Path::new("sbin"), FileKind::Dir).is_none());
    }

    #[test]
    fn files_never_match() {
        let t = DirectoryTrigger::new("bin").unwrap();
        assert!(t.matches(Path::new("bin"), FileKind::File).is_none());
    }

    #[test]
    fn glob_patterns_apply_to_basename() {
        let t = DirectoryTrigger::new(".config*").unwrap();
        assert!(t.matches(Path::new(".config"), FileKind::Dir).is_some());
        assert!(t.matches(Path::new(".configs"), FileKind::Dir).is_some());
    }

    #[test]
    fn metadata_carries_directory_name() {
        let t = DirectoryTrigger::new("*").unwrap();
        let meta = t.matches(Path::new("scripts"), FileKind::Dir).unwrap();
        assert_eq!(
            meta.get("directory").and_then(crate::options::OptionValue::as_str),
            Some("scripts")
        );
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(DirectoryTrigger::new("[").is_err());
    }
}
