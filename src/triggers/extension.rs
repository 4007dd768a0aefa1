//! Extension trigger: match files by extension, case-insensitively.

use std::path::Path;

use super::Trigger;
use crate::error::ConfigError;
use crate::fsys::FileKind;
use crate::options::{OptionMap, get_str};

/// Registry name for this trigger.
pub const NAME: &str = "extension";

/// Matches regular files by extension.
///
/// The configured extension is normalised: a leading dot is stripped and
/// comparison is case-insensitive, so `".SH"`, `"sh"`, and `"Sh"` are all
/// the same trigger.
#[derive(Debug)]
pub struct ExtensionTrigger {
    extension: String,
}

impl ExtensionTrigger {
    /// Build from an extension, with or without the leading dot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for an empty extension.
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let normalised = extension.trim_start_matches('.').to_lowercase();
        if normalised.is_empty() {
            return Err(ConfigError::InvalidOption {
                key: "extension".to_string(),
                message: "extension must not be empty".to_string(),
            });
        }
        Ok(Self {
            extension: normalised,
        })
    }

    /// Build from a matcher option map (`extension` key, required).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when `extension` is missing
    /// or has the wrong type.
    pub fn from_options(options: &OptionMap) -> Result<Self, ConfigError> {
        let extension =
            get_str(options, "extension")?.ok_or_else(|| ConfigError::InvalidOption {
                key: "extension".to_string(),
                message: "extension trigger requires an extension".to_string(),
            })?;
        Self::new(extension)
    }
}

impl Trigger for ExtensionTrigger {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        40
    }

    fn matches(&self, relative_path: &Path, kind: FileKind) -> Option<OptionMap> {
        if kind == FileKind::Dir {
            return None;
        }
        let ext = relative_path.extension().and_then(|e| e.to_str())?;
        (ext.to_lowercase() == self.extension).then(|| {
            let mut meta = OptionMap::new();
            meta.insert("extension".to_string(), self.extension.as_str().into());
            meta
        })
    }
}
