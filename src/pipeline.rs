//! Action pipeline: from matches to an ordered action list.
//!
//! Matches are grouped by handler name (preserving the scanner's
//! deterministic order), each group is handed to its handler's `process`,
//! and the per-group action lists are flattened back in group order. A
//! failing handler is recorded and does not abort the others.

use crate::error::HandlerError;
use crate::handlers::{Action, HandlerEnv};
use crate::matchers::TriggerMatch;
use crate::registries::Registries;

/// The outcome of running the pipeline over one pack's matches.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Flat, ordered action list for the executor.
    pub actions: Vec<Action>,
    /// Handler failures, keyed by handler name.
    pub failures: Vec<(String, HandlerError)>,
}

/// Convert one pack's matches into actions.
///
/// Group order follows each handler's first appearance in the match list,
/// which the scanner already sorted by priority and path, so the flat
/// action list is deterministic end-to-end.
#[must_use]
pub fn actions_for_matches(
    matches: &[TriggerMatch],
    registries: &Registries,
    env: &HandlerEnv,
) -> PipelineOutcome {
    let mut outcome = PipelineOutcome::default();

    let mut group_order: Vec<&str> = Vec::new();
    for hit in matches {
        if !group_order.contains(&hit.handler_name.as_str()) {
            group_order.push(&hit.handler_name);
        }
    }

    for handler_name in group_order {
        let group: Vec<TriggerMatch> = matches
            .iter()
            .filter(|m| m.handler_name == handler_name)
            .cloned()
            .collect();
        let handler = match registries.handlers.get(handler_name) {
            Ok(handler) => handler,
            Err(err) => {
                outcome.failures.push((
                    handler_name.to_string(),
                    HandlerError::ProcessFailed {
                        handler: handler_name.to_string(),
                        message: err.to_string(),
                    },
                ));
                continue;
            }
        };
        match handler.process(&group, env) {
            Ok(actions) => outcome.actions.extend(actions),
            Err(err) => outcome.failures.push((handler_name.to_string(), err)),
        }
    }
    outcome
}
