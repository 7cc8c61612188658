//! Rule evaluation and the container visibility decision
//!
//! One rule yields an outcome: matched with a visibility verdict, or not
//! matched. Rules run in author order and the first matched rule decides
//! the container; everything after it is never evaluated.

use crate::config::ContainerConfig;
use crate::profile::{DiagnosticSink, Profile};
use crate::types::{Logic, Rule, RuleOutcome, Visibility};
use crate::value::{classify, decode_html_entities, display_string, ValueShape};
use serde_json::Value;

const USER_NOT_LOGGED_IN: &str = "User is not logged in";

/// Evaluate one rule against the resolved attribute value.
pub fn evaluate_rule(rule: &Rule, value: &Value) -> RuleOutcome {
    match rule.logic {
        Logic::Equal => {
            if display_string(value) == rule.user_value {
                RuleOutcome::decisive(rule.visibility != Visibility::Hide)
            } else {
                RuleOutcome::unmatched()
            }
        }

        // A not-equal rule is decisive either way: differing values carry
        // the rule's stated visibility, equal values the inverted one.
        Logic::NotEqual => {
            if display_string(value) != rule.user_value {
                RuleOutcome::decisive(rule.visibility != Visibility::Hide)
            } else {
                RuleOutcome::decisive(rule.visibility == Visibility::Hide)
            }
        }

        Logic::Contains => {
            let matched = match classify(value) {
                ValueShape::List(items) => list_contains(&items, &rule.user_value),
                ValueShape::Delimited(raw) => {
                    let needle = decode_html_entities(&rule.user_value);
                    raw.split(',').map(str::trim).any(|segment| segment == needle)
                }
                ValueShape::Scalar(text) => text.contains(&rule.user_value),
            };
            if matched {
                RuleOutcome::decisive(rule.visibility != Visibility::Hide)
            } else {
                RuleOutcome::unmatched()
            }
        }
    }
}

/// List membership for contains rules. Rule values are always textual, so a
/// numeric element also matches when it equals the value parsed as a number.
fn list_contains(items: &[Value], user_value: &str) -> bool {
    let as_number: Option<f64> = user_value.trim().parse().ok();
    items.iter().any(|item| match item {
        Value::String(text) => text == user_value,
        Value::Number(number) => as_number.is_some_and(|n| number.as_f64() == Some(n)),
        _ => false,
    })
}

/// Decide container visibility from the ordered rule list.
///
/// Returns `true` unconditionally when the conditional toggle is off. With
/// no profile (unauthenticated user), no rules, or no matching rule the
/// container stays hidden. Rules whose attribute is absent from the profile
/// are skipped and reported to the optional diagnostic sink.
pub fn decide(
    config: &ContainerConfig,
    profile: Option<&Profile>,
    diagnostics: Option<&dyn DiagnosticSink>,
) -> bool {
    if !config.is_conditional() {
        return true;
    }

    let Some(profile) = profile else {
        if let Some(sink) = diagnostics {
            sink.notify(USER_NOT_LOGGED_IN);
        }
        return false;
    };

    for rule in &config.conditions {
        let Some(value) = profile.get(&rule.user_key) else {
            if let Some(sink) = diagnostics {
                sink.notify(&format!("User doesn't contain key: {}", rule.user_key));
            }
            continue;
        };

        let outcome = evaluate_rule(rule, value);
        if outcome.matched {
            return outcome.visible;
        }
    }

    false
}
