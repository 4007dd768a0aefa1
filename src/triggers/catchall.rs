//! Catch-all trigger: claim everything the specific pass left behind.

use std::path::Path;

use super::{Trigger, TriggerKind, basename, compile_pattern};
use crate::error::ConfigError;
use crate::fsys::FileKind;
use crate::options::{OptionMap, get_str_list};
use crate::packs;

/// Registry name for this trigger.
pub const NAME: &str = "catchall";

/// Matches every entry not in its exclude set.
///
/// The pack config file and the ignore marker are always excluded, on top
/// of whatever `exclude` patterns the matcher supplies.
#[derive(Debug)]
pub struct CatchAllTrigger {
    excludes: Vec<glob::Pattern>,
}

impl CatchAllTrigger {
    /// Build from explicit exclude patterns; the fixed defaults are always
    /// appended.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when an exclude glob fails
    /// to compile.
    pub fn new(exclude_patterns: &[String]) -> Result<Self, ConfigError> {
        let mut excludes = Vec::with_capacity(exclude_patterns.len() + 2);
        for pattern in exclude_patterns {
            excludes.push(compile_pattern(pattern)?);
        }
        for fixed in [packs::PACK_CONFIG_FILE, packs::IGNORE_MARKER] {
            excludes.push(compile_pattern(fixed)?);
        }
        Ok(Self { excludes })
    }

    /// Build from a matcher option map (`exclude` key, optional list).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when `exclude` has the wrong
    /// type.
    pub fn from_options(options: &OptionMap) -> Result<Self, ConfigError> {
        let excludes = get_str_list(options, "exclude")?.unwrap_or_default();
        Self::new(&excludes)
    }
}

impl Trigger for CatchAllTrigger {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> TriggerKind {
        TriggerKind::CatchAll
    }

    fn priority(&self) -> i32 {
        -100
    }

    fn matches(&self, relative_path: &Path, _kind: FileKind) -> Option<OptionMap> {
        let name = basename(relative_path)?;
        if self.excludes.iter().any(|p| p.matches(name)) {
            return None;
        }
        Some(OptionMap::new())
    }
}
