//! Packs: self-contained subdirectories of the dotfiles root.
//!
//! A pack is discovered, never declared: every immediate subdirectory of
//! the dotfiles root is a pack, named after its directory. A pack may
//! carry a config file (`.dodot.toml`) with ignore rules, per-file handler
//! overrides, and extra matchers, and may be excluded wholesale with an
//! ignore marker (`.dodotignore`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::fsys::{FileKind, Fs};
use crate::matchers::{Matcher, MatcherRecord};
use crate::options::{OptionMap, option_map_from_toml};

/// Fixed basename of the per-pack config file.
pub const PACK_CONFIG_FILE: &str = ".dodot.toml";

/// Fixed basename of the whole-pack ignore marker.
pub const IGNORE_MARKER: &str = ".dodotignore";

/// A discovered pack.
#[derive(Debug, Clone)]
pub struct Pack {
    /// Directory basename; unique by construction.
    pub name: String,
    /// Absolute pack directory.
    pub path: PathBuf,
    /// Parsed pack configuration (empty when no config file exists).
    pub config: PackConfig,
    /// `true` when the ignore marker is present; the pack is skipped by
    /// scanning but still shown in status.
    pub ignored: bool,
    /// `true` when a config file was present.
    pub has_config: bool,
}

/// One per-file handler override rule.
#[derive(Debug, Clone)]
pub struct OverrideRule {
    /// Glob matched against the pack-relative path.
    pub path: glob::Pattern,
    /// Handler to route the file to.
    pub handler: String,
    /// Handler options for the synthetic match.
    pub options: OptionMap,
}

/// Parsed per-pack configuration.
#[derive(Debug, Clone, Default)]
pub struct PackConfig {
    /// Compiled ignore globs; matching entries are skipped entirely.
    pub ignore: Vec<glob::Pattern>,
    /// Override rules; first match wins and beats every matcher.
    pub overrides: Vec<OverrideRule>,
    /// Pack-level matchers, merged over the default and global sets.
    pub matchers: Vec<Matcher>,
}

impl PackConfig {
    /// `true` when the pack config ignores this relative path.
    #[must_use]
    pub fn ignores(&self, relative_path: &Path) -> bool {
        self.ignore.iter().any(|p| p.matches_path(relative_path))
    }

    /// The first override rule matching this relative path.
    #[must_use]
    pub fn override_for(&self, relative_path: &Path) -> Option<&OverrideRule> {
        self.overrides.iter().find(|r| r.path.matches_path(relative_path))
    }
}

#[derive(Debug, Deserialize)]
struct IgnoreRuleRaw {
    path: String,
}

#[derive(Debug, Deserialize)]
struct OverrideRuleRaw {
    path: String,
    handler: String,
    #[serde(default)]
    with: Option<toml::Table>,
}

#[derive(Debug, Default, Deserialize)]
struct PackConfigRaw {
    #[serde(default)]
    ignore: Vec<IgnoreRuleRaw>,
    #[serde(default, rename = "override")]
    overrides: Vec<OverrideRuleRaw>,
    #[serde(default)]
    matchers: Vec<MatcherRecord>,
}

/// Load a pack's config file; an absent file yields the empty config.
///
/// # Errors
///
/// Returns [`ConfigError`] for unreadable files, TOML syntax errors, bad
/// glob patterns, or option values outside the restricted set.
pub fn load_pack_config(fs: &dyn Fs, pack_dir: &Path) -> Result<PackConfig, ConfigError> {
    let path = pack_dir.join(PACK_CONFIG_FILE);
    let bytes = match fs.read_file(&path) {
        Ok(bytes) => bytes,
        Err(err) if crate::fsys::is_not_found(&err) => return Ok(PackConfig::default()),
        Err(err) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source: err,
            });
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let raw: PackConfigRaw =
        toml::from_str(&text).map_err(|err| ConfigError::InvalidSyntax {
            file: path.display().to_string(),
            message: err.to_string(),
        })?;

    let mut ignore = Vec::with_capacity(raw.ignore.len());
    for rule in raw.ignore {
        ignore.push(compile_glob(&rule.path)?);
    }

    let mut overrides = Vec::with_capacity(raw.overrides.len());
    for rule in raw.overrides {
        let options = match rule.with {
            Some(table) => option_map_from_toml(table)?,
            None => OptionMap::new(),
        };
        overrides.push(OverrideRule {
            path: compile_glob(&rule.path)?,
            handler: rule.handler,
            options,
        });
    }

    let mut matchers = Vec::with_capacity(raw.matchers.len());
    for record in raw.matchers {
        matchers.push(record.into_matcher()?);
    }

    Ok(PackConfig {
        ignore,
        overrides,
        matchers,
    })
}

fn compile_glob(pattern: &str) -> Result<glob::Pattern, ConfigError> {
    glob::Pattern::new(pattern).map_err(|err| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

/// Discover every pack under the dotfiles root.
///
/// Immediate subdirectories become packs; dot-directories (`.git` and
/// friends) are not packs. Packs carrying the ignore marker are returned
/// with `ignored = true` so status can show them.
///
/// # Errors
///
/// Returns [`ConfigError`] when the root cannot be listed or a pack
/// config fails to parse.
pub fn discover_packs(fs: &dyn Fs, root: &Path) -> Result<Vec<Pack>, ConfigError> {
    let entries = fs.read_dir(root).map_err(|err| ConfigError::Io {
        path: root.display().to_string(),
        source: err,
    })?;
    let mut packs = Vec::new();
    for entry in entries {
        if entry.kind != FileKind::Dir || entry.name.starts_with('.') {
            continue;
        }
        let path = root.join(&entry.name);
        let ignored = fs.exists(&path.join(IGNORE_MARKER));
        let has_config = fs.exists(&path.join(PACK_CONFIG_FILE));
        let config = if ignored {
            PackConfig::default()
        } else {
            load_pack_config(fs, &path)?
        };
        packs.push(Pack {
            name: entry.name,
            path,
            config,
            ignored,
            has_config,
        });
    }
    Ok(packs)
}

/// Find one pack by name.
///
/// # Errors
///
/// Propagates discovery errors; a missing pack is reported as an
/// [`ConfigError::Io`] not-found at the pack path.
pub fn find_pack(fs: &dyn Fs, root: &Path, name: &str) -> Result<Pack, ConfigError> {
    discover_packs(fs, root)?
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ConfigError::Io {
            path: root.join(name).display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no pack named '{name}'"),
            ),
        })
}
