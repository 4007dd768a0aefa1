//! Matcher configuration: binding triggers to handlers.
//!
//! A matcher names a trigger, a handler, their option maps, a priority, and
//! an enabled flag. The effective set for a pack is
//! `merge(defaults, global, pack)`, right-biased by matcher name, then
//! filtered to enabled entries, sorted by priority (descending, ties broken
//! by name ascending), and partitioned into specific and catch-all groups
//! by the trigger's declared kind.
//!
//! Compilation validates every reference eagerly: an unknown trigger or
//! handler name is a configuration error before any action is emitted.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::options::{OptionMap, OptionValue, option_map_from_toml};
use crate::registries::Registries;
use crate::triggers::{Trigger, TriggerKind};

/// Trigger name recorded on matches synthesised from pack override rules.
pub const OVERRIDE_TRIGGER: &str = "config-override";

/// Priority assigned to override-derived matches.
pub const OVERRIDE_PRIORITY: i32 = 100;

/// One matcher record: a trigger bound to a handler.
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Matcher name; merge key. May be empty (keyed on trigger+handler).
    pub name: String,
    /// Trigger to evaluate.
    pub trigger_name: String,
    /// Options passed to the trigger factory.
    pub trigger_options: OptionMap,
    /// Handler that will process matches.
    pub handler_name: String,
    /// Options carried onto every match for this handler.
    pub handler_options: OptionMap,
    /// Evaluation priority; `None` falls back to the trigger's default.
    pub priority: Option<i32>,
    /// Disabled matchers are silently skipped.
    pub enabled: bool,
}

impl Matcher {
    /// Build an enabled matcher with explicit priority.
    #[must_use]
    pub fn new(name: &str, trigger: &str, handler: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            trigger_name: trigger.to_string(),
            trigger_options: OptionMap::new(),
            handler_name: handler.to_string(),
            handler_options: OptionMap::new(),
            priority: Some(priority),
            enabled: true,
        }
    }

    /// Set a trigger option, builder-style.
    #[must_use]
    pub fn trigger_option(mut self, key: &str, value: OptionValue) -> Self {
        self.trigger_options.insert(key.to_string(), value);
        self
    }

    /// Set a handler option, builder-style.
    #[must_use]
    pub fn handler_option(mut self, key: &str, value: OptionValue) -> Self {
        self.handler_options.insert(key.to_string(), value);
        self
    }

    /// The merge key: the name when present, otherwise trigger+handler.
    #[must_use]
    pub fn merge_key(&self) -> String {
        if self.name.is_empty() {
            format!("{}+{}", self.trigger_name, self.handler_name)
        } else {
            self.name.clone()
        }
    }
}

/// TOML form of a matcher record, as written in pack or global config.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherRecord {
    /// Matcher name (optional).
    #[serde(default)]
    pub name: String,
    /// Trigger name.
    pub trigger: String,
    /// Handler name.
    pub handler: String,
    /// Convenience pattern, folded into empty trigger options.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Convenience target, folded into empty handler options.
    #[serde(default)]
    pub target: Option<String>,
    /// Raw trigger options.
    #[serde(default)]
    pub trigger_options: Option<toml::Table>,
    /// Raw handler options.
    #[serde(default)]
    pub handler_options: Option<toml::Table>,
    /// Evaluation priority.
    #[serde(default)]
    pub priority: Option<i32>,
    /// Enabled flag; defaults to true.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

impl MatcherRecord {
    /// Convert to a [`Matcher`], folding convenience fields into the option
    /// maps when those maps are empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when an option value falls
    /// outside the restricted container types.
    pub fn into_matcher(self) -> Result<Matcher, ConfigError> {
        let mut trigger_options = match self.trigger_options {
            Some(table) => option_map_from_toml(table)?,
            None => OptionMap::new(),
        };
        let mut handler_options = match self.handler_options {
            Some(table) => option_map_from_toml(table)?,
            None => OptionMap::new(),
        };
        if let Some(pattern) = self.pattern
            && trigger_options.is_empty()
        {
            trigger_options.insert("pattern".to_string(), pattern.into());
        }
        if let Some(target) = self.target
            && handler_options.is_empty()
        {
            handler_options.insert("target_dir".to_string(), target.into());
        }
        Ok(Matcher {
            name: self.name,
            trigger_name: self.trigger,
            trigger_options,
            handler_name: self.handler,
            handler_options,
            priority: self.priority,
            enabled: self.enabled,
        })
    }
}

/// A matcher whose trigger has been constructed and whose references have
/// been validated.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    /// The source record.
    pub matcher: Matcher,
    /// The configured trigger instance.
    pub trigger: Arc<dyn Trigger>,
    /// Effective priority (explicit, or the trigger's default).
    pub priority: i32,
}

/// The effective matcher set for a pack, partitioned and sorted.
#[derive(Debug, Clone, Default)]
pub struct MatcherSet {
    /// Specific matchers, priority descending then name ascending.
    pub specific: Vec<CompiledMatcher>,
    /// Catch-all matchers, same order.
    pub catchall: Vec<CompiledMatcher>,
}

/// Merge matcher lists right-biased by merge key: later lists override
/// earlier entries with the same key.
#[must_use]
pub fn merge(layers: &[&[Matcher]]) -> Vec<Matcher> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: std::collections::BTreeMap<String, Matcher> = std::collections::BTreeMap::new();
    for layer in layers {
        for matcher in *layer {
            let key = matcher.merge_key();
            if !by_key.contains_key(&key) {
                order.push(key.clone());
            }
            by_key.insert(key, matcher.clone());
        }
    }
    order.into_iter().filter_map(|k| by_key.remove(&k)).collect()
}

/// Compile a merged matcher list against the registries.
///
/// Disabled matchers are dropped. Trigger and handler references must
/// resolve; handler options are validated against the handler's schema.
///
/// # Errors
///
/// Returns the first [`ConfigError`] encountered: unknown trigger or
/// handler names, bad patterns, or rejected handler options.
pub fn compile(matchers: &[Matcher], registries: &Registries) -> Result<MatcherSet, ConfigError> {
    let mut set = MatcherSet::default();
    for matcher in matchers {
        if !matcher.enabled {
            continue;
        }
        let factory = registries.trigger_factories.get(&matcher.trigger_name).map_err(|_| {
            ConfigError::UnknownTrigger {
                matcher: matcher.merge_key(),
                trigger: matcher.trigger_name.clone(),
            }
        })?;
        let handler = registries.handlers.get(&matcher.handler_name).map_err(|_| {
            ConfigError::UnknownHandler {
                matcher: matcher.merge_key(),
                handler: matcher.handler_name.clone(),
            }
        })?;
        handler
            .validate_options(&matcher.handler_options)
            .map_err(|err| ConfigError::InvalidOption {
                key: matcher.merge_key(),
                message: err.to_string(),
            })?;
        let trigger = factory(&matcher.trigger_options)?;
        let priority = matcher.priority.unwrap_or_else(|| trigger.priority());
        let compiled = CompiledMatcher {
            matcher: matcher.clone(),
            trigger: Arc::clone(&trigger),
            priority,
        };
        match trigger.kind() {
            TriggerKind::Specific => set.specific.push(compiled),
            TriggerKind::CatchAll => set.catchall.push(compiled),
        }
    }
    sort_group(&mut set.specific);
    sort_group(&mut set.catchall);
    Ok(set)
}

fn sort_group(group: &mut [CompiledMatcher]) {
    group.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.matcher.merge_key().cmp(&b.matcher.merge_key()))
    });
}

/// The built-in default matcher set.
///
/// Covers the common pack shapes: install scripts, Brewfiles, `bin/`
/// directories on `PATH`, shell fragments sourced at startup, templates,
/// and a catch-all that links everything else into the home directory.
#[must_use]
pub fn default_matchers() -> Vec<Matcher> {
    vec![
        Matcher::new("install-scripts", "filename", "install", 100)
            .trigger_option("pattern", "install.sh".into()),
        Matcher::new("homebrew", "filename", "homebrew", 90)
            .trigger_option("pattern", "Brewfile".into()),
        Matcher::new("bin-path", "directory", "shell_add_path", 80)
            .trigger_option("pattern", "bin".into()),
        Matcher::new("shell-profiles", "filename", "shell_profile", 70)
            .trigger_option("pattern", "*.sh".into()),
        Matcher::new("templates", "filename", "template", 60)
            .trigger_option("pattern", "*.tmpl".into()),
        Matcher::new("catchall-link", "catchall", "symlink", 0),
    ]
}

/// One file matched by one matcher: the scanner's output unit.
///
/// A given file in a given pack yields at most one match per run.
#[derive(Debug, Clone)]
pub struct TriggerMatch {
    /// Name of the trigger that matched (or [`OVERRIDE_TRIGGER`]).
    pub trigger_name: String,
    /// Handler that will process this match.
    pub handler_name: String,
    /// Owning pack.
    pub pack_name: String,
    /// Path relative to the pack root (single component; scanning is flat).
    pub relative_path: PathBuf,
    /// Absolute path of the entry.
    pub absolute_path: PathBuf,
    /// Trigger-supplied metadata.
    pub metadata: OptionMap,
    /// Handler options carried from the matcher.
    pub handler_options: OptionMap,
    /// Priority of the producing matcher.
    pub priority: i32,
}

impl TriggerMatch {
    /// `true` when this match came from a pack override rule.
    #[must_use]
    pub fn is_override(&self) -> bool {
        self.trigger_name == OVERRIDE_TRIGGER
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::registries;

    fn builtin() -> Registries {
        registries::builtin()
    }

    #[test]
    fn merge_is_right_biased_by_name() {
        let defaults = vec![Matcher::new("shell-profiles", "filename", "shell_profile", 70)];
        let pack = vec![Matcher::new("shell-profiles", "filename", "symlink", 10)];
        let merged = merge(&[&defaults, &pack]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].handler_name, "symlink");
        assert_eq!(merged[0].priority, Some(10));
    }

    #[test]
    fn merge_keys_unnamed_matchers_on_trigger_and_handler() {
        let a = vec![Matcher::new("", "filename", "symlink", 5)];
        let b = vec![Matcher::new("", "filename", "symlink", 9)];
        let merged = merge(&[&a, &b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].priority, Some(9));
    }

    #[test]
    fn merge_preserves_first_appearance_order() {
        let defaults = default_matchers();
        let pack = vec![Matcher::new("homebrew", "filename", "homebrew", 95)
            .trigger_option("pattern", "Brewfile".into())];
        let merged = merge(&[&defaults, &pack]);
        let names: Vec<&str> = merged.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names[0], "install-scripts");
        assert_eq!(names[1], "homebrew");
    }

    #[test]
    fn compile_partitions_specific_and_catchall() {
        let set = compile(&default_matchers(), &builtin()).unwrap();
        assert_eq!(set.specific.len(), 5);
        assert_eq!(set.catchall.len(), 1);
        assert_eq!(set.catchall[0].matcher.handler_name, "symlink");
    }

    #[test]
    fn compile_sorts_by_priority_then_name() {
        let matchers = vec![
            Matcher::new("b-low", "filename", "symlink", 10)
                .trigger_option("pattern", "x".into()),
            Matcher::new("a-low", "filename", "symlink", 10)
                .trigger_option("pattern", "y".into()),
            Matcher::new("high", "filename", "symlink", 20)
                .trigger_option("pattern", "z".into()),
        ];
        let set = compile(&matchers, &builtin()).unwrap();
        let names: Vec<&str> = set.specific.iter().map(|m| m.matcher.name.as_str()).collect();
        assert_eq!(names, vec!["high", "a-low", "b-low"]);
    }

    #[test]
    fn compile_skips_disabled_matchers() {
        let mut matcher =
            Matcher::new("off", "filename", "symlink", 10).trigger_option("pattern", "x".into());
        matcher.enabled = false;
        let set = compile(&[matcher], &builtin()).unwrap();
        assert!(set.specific.is_empty());
    }

    #[test]
    fn compile_rejects_unknown_trigger() {
        let matcher = Matcher::new("bad", "no-such-trigger", "symlink", 0);
        let err = compile(&[matcher], &builtin()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTrigger { .. }));
    }

    #[test]
    fn compile_rejects_unknown_handler() {
        let matcher = Matcher::new("bad", "catchall", "no-such-handler", 0);
        let err = compile(&[matcher], &builtin()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHandler { .. }));
    }

    #[test]
    fn compile_rejects_bad_handler_options() {
        let matcher = Matcher::new("bad", "catchall", "symlink", 0)
            .handler_option("bogus_key", "x".into());
        let err = compile(&[matcher], &builtin()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { .. }));
    }

    #[test]
    fn record_folds_convenience_fields_into_empty_maps() {
        let record: MatcherRecord = toml::from_str(
            r#"
            name = "zsh-bits"
            trigger = "filename"
            handler = "shell_profile"
            pattern = "*.zsh"
            priority = 85
            "#,
        )
        .unwrap();
        let matcher = record.into_matcher().unwrap();
        assert_eq!(
            matcher.trigger_options.get("pattern").and_then(OptionValue::as_str),
            Some("*.zsh")
        );
        assert_eq!(matcher.priority, Some(85));
        assert!(matcher.enabled);
    }

    #[test]
    fn record_does_not_clobber_explicit_options() {
        let record: MatcherRecord = toml::from_str(
            r#"
            trigger = "filename"
            handler = "symlink"
            pattern = "ignored"
            trigger_options = { pattern = "kept" }
            "#,
        )
        .unwrap();
        let matcher = record.into_matcher().unwrap();
        assert_eq!(
            matcher.trigger_options.get("pattern").and_then(OptionValue::as_str),
            Some("kept")
        );
    }

    #[test]
    fn override_match_is_flagged() {
        let hit = TriggerMatch {
            trigger_name: OVERRIDE_TRIGGER.to_string(),
            handler_name: "shell_profile".to_string(),
            pack_name: "misc".to_string(),
            relative_path: PathBuf::from("custom.conf"),
            absolute_path: PathBuf::from("/packs/misc/custom.conf"),
            metadata: OptionMap::new(),
            handler_options: OptionMap::new(),
            priority: OVERRIDE_PRIORITY,
        };
        assert!(hit.is_override());
    }
}
