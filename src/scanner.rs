//! Pack scanner: flat enumeration and classification.
//!
//! Scanning reads only the immediate children of a pack directory: a
//! directory entry is one logical unit and the handler that claims it owns
//! its contents. For each entry the scanner applies, in order: the
//! pack-config filename skip, the pack's ignore rules, the pack's override
//! rules, the specific matchers, and finally the catch-all matchers. The
//! first hit wins, so a file yields at most one match per run.

use std::path::Path;

use crate::error::ConfigError;
use crate::fsys::Fs;
use crate::matchers::{
    CompiledMatcher, MatcherSet, OVERRIDE_PRIORITY, OVERRIDE_TRIGGER, TriggerMatch, compile,
    default_matchers, merge,
};
use crate::options::OptionMap;
use crate::packs::{IGNORE_MARKER, PACK_CONFIG_FILE, Pack};
use crate::registries::Registries;

/// The outcome of scanning one pack.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Matches in deterministic order.
    pub matches: Vec<TriggerMatch>,
    /// Recoverable per-entry errors (bad overrides); the scan continues.
    pub errors: Vec<ConfigError>,
}

/// Build the effective matcher set for a pack: defaults, then global
/// matchers, then the pack's own, merged right-biased and compiled.
///
/// # Errors
///
/// Returns the first validation error; unknown trigger or handler names
/// fail before any action is emitted.
pub fn effective_matcher_set(
    pack: &Pack,
    global: &[crate::matchers::Matcher],
    registries: &Registries,
) -> Result<MatcherSet, ConfigError> {
    let defaults = default_matchers();
    let merged = merge(&[&defaults, global, &pack.config.matchers]);
    compile(&merged, registries)
}

/// Scan one pack against a compiled matcher set.
///
/// An ignored pack produces an empty report. Invalid override rules are
/// recorded as errors and their entries skipped; they do not abort the
/// scan.
#[must_use]
pub fn scan_pack(
    fs: &dyn Fs,
    pack: &Pack,
    set: &MatcherSet,
    registries: &Registries,
) -> ScanReport {
    let mut report = ScanReport::default();
    if pack.ignored {
        return report;
    }
    let entries = match fs.read_dir(&pack.path) {
        Ok(entries) => entries,
        Err(err) => {
            report.errors.push(ConfigError::Io {
                path: pack.path.display().to_string(),
                source: err,
            });
            return report;
        }
    };

    for entry in entries {
        let relative = Path::new(&entry.name);
        if entry.name == PACK_CONFIG_FILE || entry.name == IGNORE_MARKER {
            continue;
        }
        if pack.config.ignores(relative) {
            tracing::debug!("{}: ignored by pack config: {}", pack.name, entry.name);
            continue;
        }

        // Overrides beat every matcher; bad ones surface as errors.
        if let Some(rule) = pack.config.override_for(relative) {
            match validate_override(registries, &rule.handler, &rule.options) {
                Ok(()) => {
                    report.matches.push(TriggerMatch {
                        trigger_name: OVERRIDE_TRIGGER.to_string(),
                        handler_name: rule.handler.clone(),
                        pack_name: pack.name.clone(),
                        relative_path: relative.to_path_buf(),
                        absolute_path: pack.path.join(relative),
                        metadata: OptionMap::new(),
                        handler_options: rule.options.clone(),
                        priority: OVERRIDE_PRIORITY,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        "{}: skipping '{}': invalid override: {err}",
                        pack.name,
                        entry.name
                    );
                    report.errors.push(err);
                }
            }
            continue;
        }

        // Specific matchers first, then catch-all; first hit wins.
        let hit = first_match(&set.specific, pack, relative, entry.kind)
            .or_else(|| first_match(&set.catchall, pack, relative, entry.kind));
        if let Some(m) = hit {
            report.matches.push(m);
        } else {
            tracing::debug!("{}: no matcher claimed '{}'", pack.name, entry.name);
        }
    }

    // Deterministic order end-to-end: priority descending, then path.
    report
        .matches
        .sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
    report
}

fn first_match(
    group: &[CompiledMatcher],
    pack: &Pack,
    relative: &Path,
    kind: crate::fsys::FileKind,
) -> Option<TriggerMatch> {
    for compiled in group {
        if let Some(metadata) = compiled.trigger.matches(relative, kind) {
            return Some(TriggerMatch {
                trigger_name: compiled.trigger.name().to_string(),
                handler_name: compiled.matcher.handler_name.clone(),
                pack_name: pack.name.clone(),
                relative_path: relative.to_path_buf(),
                absolute_path: pack.path.join(relative),
                metadata,
                handler_options: compiled.matcher.handler_options.clone(),
                priority: compiled.priority,
            });
        }
    }
    None
}

fn validate_override(
    registries: &Registries,
    handler: &str,
    options: &OptionMap,
) -> Result<(), ConfigError> {
    let factory = registries
        .handler_factories
        .get(handler)
        .map_err(|_| ConfigError::UnknownHandler {
            matcher: OVERRIDE_TRIGGER.to_string(),
            handler: handler.to_string(),
        })?;
    factory(options).map(|_| ()).map_err(|err| ConfigError::InvalidOption {
        key: handler.to_string(),
        message: err.to_string(),
    })
}
