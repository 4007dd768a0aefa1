//! Path-pattern trigger: glob against the whole pack-relative path.

use std::path::Path;

use super::{Trigger, compile_pattern};
use crate::error::ConfigError;
use crate::fsys::FileKind;
use crate::options::{OptionMap, get_str};

/// Registry name for this trigger.
pub const NAME: &str = "path_pattern";

/// Matches any entry whose relative path (not just basename) matches the
/// glob.
#[derive(Debug)]
pub struct PathPatternTrigger {
    pattern: glob::Pattern,
    raw: String,
}

impl PathPatternTrigger {
    /// Build from a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when the glob fails to
    /// compile.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: compile_pattern(pattern)?,
            raw: pattern.to_string(),
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
            message: "path_pattern trigger requires a pattern".to_string(),
        })?;
        Self::new(pattern)
    }
}

impl Trigger for PathPatternTrigger {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        30
    }

    fn matches(&self, relative_path: &Path, _kind: FileKind) -> Option<OptionMap> {
        self.pattern.matches_path(relative_path).then(|| {
            let mut meta = OptionMap::new();
            meta.insert("pattern".to_string(), self.raw.as_str().into());
            meta
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn matches_relative_path() {
        let t = PathPatternTrigger::new("*.conf").unwrap();
        assert!(t.matches(Path::new("app.conf"), FileKind::File).is_some());
        assert!(t.matches(Path::new("app.txt"), FileKind::File).is_none());
    }

    #[test]
    fn matches_directories_too() {
        let t = PathPatternTrigger::new("nvim*").unwrap();
        assert!(t.matches(Path::new("nvim"), FileKind::Dir).is_some());
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(PathPatternTrigger::new("[oops").is_err());
    }
}
