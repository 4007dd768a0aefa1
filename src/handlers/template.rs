//! Template handler: render `.tmpl` files by variable substitution.

use std::collections::BTreeMap;

use super::{
    Action, ClearContext, ClearedItem, Handler, HandlerEnv, RunMode, ensure_known_keys,
    resolve_target_dir,
};
use crate::error::HandlerError;
use crate::matchers::TriggerMatch;
use crate::options::OptionMap;

/// Registry name for this handler.
pub const NAME: &str = "template";

/// Suffix stripped from the source basename to form the target name.
const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Renders each matched template into the target directory, substituting
/// `${NAME}` references.
///
/// The variable set is the fixed environment set (`HOME`, `USER`, `SHELL`,
/// `HOSTNAME`) unioned with the handler's `vars` option; handler-supplied
/// variables win on collision. Unknown references are left untouched.
#[derive(Debug)]
pub struct TemplateHandler;

impl TemplateHandler {
    fn vars_from_options(options: &OptionMap) -> Result<BTreeMap<String, String>, HandlerError> {
        let Some(value) = options.get("vars") else {
            return Ok(BTreeMap::new());
        };
        let Some(map) = value.as_map() else {
            return Err(HandlerError::InvalidOption {
                handler: NAME.to_string(),
                key: "vars".to_string(),
                message: format!("expected map, got {}", value.type_name()),
            });
        };
        let mut vars = BTreeMap::new();
        for (key, entry) in map {
            match entry.as_str() {
                Some(s) => {
                    vars.insert(key.clone(), s.to_string());
                }
                None => {
                    return Err(HandlerError::InvalidOption {
                        handler: NAME.to_string(),
                        key: format!("vars.{key}"),
                        message: format!("expected string, got {}", entry.type_name()),
                    });
                }
            }
        }
        Ok(vars)
    }
}

impl Handler for TemplateHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "render templates with environment variables"
    }

    fn run_mode(&self) -> RunMode {
        RunMode::EveryRun
    }

    fn validate_options(&self, options: &OptionMap) -> Result<(), HandlerError> {
        ensure_known_keys(NAME, options, &["target_dir", "vars"])?;
        if let Some(value) = options.get("target_dir")
            && value.as_str().is_none()
        {
            return Err(HandlerError::InvalidOption {
                handler: NAME.to_string(),
                key: "target_dir".to_string(),
                message: format!("expected string, got {}", value.type_name()),
            });
        }
        Self::vars_from_options(options).map(|_| ())
    }

    fn process(
        &self,
        matches: &[TriggerMatch],
        env: &HandlerEnv,
    ) -> Result<Vec<Action>, HandlerError> {
        let mut actions = Vec::with_capacity(matches.len());
        for hit in matches {
            let target_dir = resolve_target_dir(NAME, &hit.handler_options, env)?;
            let Some(basename) = hit.relative_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let output_name = basename.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(basename);

            let mut variables = env.template_vars();
            variables.extend(Self::vars_from_options(&hit.handler_options)?);

            actions.push(Action::Template {
                pack: hit.pack_name.clone(),
                source: hit.absolute_path.clone(),
                target: target_dir.join(output_name),
                variables,
                priority: hit.priority,
            });
        }
        Ok(actions)
    }

    fn clear(&self, _ctx: &ClearContext<'_>) -> Result<Vec<ClearedItem>, HandlerError> {
        // Rendered files carry no store state and belong to the user once
        // generated.
        Ok(Vec::new())
    }
}

/// Substitute `${NAME}` references in template content.
///
/// References without a binding are left verbatim so a template can emit
/// literal shell syntax.
#[must_use]
pub fn render(content: &str, variables: &BTreeMap<String, String>) -> String {
    shellexpand::env_with_context_no_errors(content, |name: &str| {
        variables.get(name).cloned()
    })
    .to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::{match_for, test_env};
    use crate::options::OptionValue;
    use std::path::PathBuf;

    #[test]
    fn strips_template_suffix_from_target() {
        let matches = vec![match_for("git", "gitconfig.tmpl", NAME, OptionMap::new())];
        let actions = TemplateHandler.process(&matches, &test_env()).unwrap();
        let Action::Template { target, .. } = &actions[0] else {
            panic!("expected a template action");
        };
        assert_eq!(target, &PathBuf::from("/home/user/gitconfig"));
    }

    #[test]
    fn fixed_variables_are_present() {
        let matches = vec![match_for("git", "gitconfig.tmpl", NAME, OptionMap::new())];
        let actions = TemplateHandler.process(&matches, &test_env()).unwrap();
        let Action::Template { variables, .. } = &actions[0] else {
            panic!("expected a template action");
        };
        assert_eq!(variables.get("HOME").map(String::as_str), Some("/home/user"));
        assert_eq!(variables.get("HOSTNAME").map(String::as_str), Some("testbox"));
    }

    #[test]
    fn handler_vars_override_fixed_set() {
        let mut vars = OptionMap::new();
        vars.insert("USER".to_string(), "overridden".into());
        vars.insert("EDITOR".to_string(), "vim".into());
        let mut options = OptionMap::new();
        options.insert("vars".to_string(), OptionValue::Map(vars));

        let matches = vec![match_for("git", "gitconfig.tmpl", NAME, options)];
        let actions = TemplateHandler.process(&matches, &test_env()).unwrap();
        let Action::Template { variables, .. } = &actions[0] else {
            panic!("expected a template action");
        };
        assert_eq!(variables.get("USER").map(String::as_str), Some("overridden"));
        assert_eq!(variables.get("EDITOR").map(String::as_str), Some("vim"));
    }

    #[test]
    fn render_substitutes_known_and_keeps_unknown() {
        let vars = BTreeMap::from([("USER".to_string(), "alice".to_string())]);
        let rendered = render("name = ${USER}\npath = ${UNSET_THING}\n", &vars);
        assert_eq!(rendered, "name = alice\npath = ${UNSET_THING}\n");
    }

    #[test]
    fn non_template_name_passes_through_unchanged() {
        let matches = vec![match_for("git", "plainfile", NAME, OptionMap::new())];
        let actions = TemplateHandler.process(&matches, &test_env()).unwrap();
        let Action::Template { target, .. } = &actions[0] else {
            panic!("expected a template action");
        };
        assert_eq!(target, &PathBuf::from("/home/user/plainfile"));
    }

    #[test]
    fn validate_rejects_non_string_vars() {
        let mut vars = OptionMap::new();
        vars.insert("N".to_string(), OptionValue::Int(1));
        let mut options = OptionMap::new();
        options.insert("vars".to_string(), OptionValue::Map(vars));
        assert!(TemplateHandler.validate_options(&options).is_err());
    }
}
