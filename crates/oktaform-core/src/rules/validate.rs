//! Pre-apply checks of a declared rule collection. Nothing here talks to
//! the API; failures are reported before any call is made.

use oktaform_client::PolicyRule;
use std::collections::HashMap;

use super::model::DesiredCollection;
use crate::error::ReconcileError;

pub const ACCESS_TOKEN_LIFETIME_RANGE: (i64, i64) = (5, 1440);
pub const REFRESH_TOKEN_WINDOW_RANGE: (i64, i64) = (5, 2_628_000);

/// Every invariant violation of `collection`, in declaration order.
#[must_use]
pub fn validate_collection(collection: &DesiredCollection) -> Vec<ReconcileError> {
    let mut errors = Vec::new();

    if collection.authorization_server_id.trim().is_empty() {
        errors.push(ReconcileError::validation(
            "authorization_server_id",
            "must not be empty",
        ));
    }
    if collection.policy_id.trim().is_empty() {
        errors.push(ReconcileError::validation("policy_id", "must not be empty"));
    }

    let mut names: HashMap<&str, usize> = HashMap::new();
    let mut priorities: HashMap<i64, usize> = HashMap::new();

    for (idx, rule) in collection.rules.iter().enumerate() {
        let at = |field: &str| format!("rules[{idx}].{field}");

        if rule.name.trim().is_empty() {
            errors.push(ReconcileError::validation(at("name"), "must not be empty"));
        } else if let Some(first) = names.insert(rule.name.as_str(), idx) {
            errors.push(ReconcileError::validation(
                at("name"),
                format!("duplicate rule name '{}' (also rules[{first}])", rule.name),
            ));
        }

        if rule.priority < 1 {
            errors.push(ReconcileError::validation(
                at("priority"),
                format!("must be a positive integer, got {}", rule.priority),
            ));
        } else if let Some(first) = priorities.insert(rule.priority, idx) {
            errors.push(ReconcileError::validation(
                at("priority"),
                format!(
                    "priority {} is also declared by rules[{first}]; priorities must be unique",
                    rule.priority
                ),
            ));
        }

        if rule.grant_type_whitelist.is_empty() {
            errors.push(ReconcileError::validation(
                at("grant_type_whitelist"),
                "at least one grant type is required",
            ));
        }

        if !rule.scope_blacklist.is_empty() {
            errors.push(ReconcileError::validation(
                at("scope_blacklist"),
                "authorization server rules only support a scope allow-list",
            ));
        }

        check_range(
            &mut errors,
            at("access_token_lifetime_minutes"),
            rule.access_token_lifetime_minutes,
            ACCESS_TOKEN_LIFETIME_RANGE,
        );
        check_range(
            &mut errors,
            at("refresh_token_window_minutes"),
            rule.refresh_token_window_minutes,
            REFRESH_TOKEN_WINDOW_RANGE,
        );
        if let Some(lifetime) = rule.refresh_token_lifetime_minutes {
            if lifetime < 0 {
                errors.push(ReconcileError::validation(
                    at("refresh_token_lifetime_minutes"),
                    "must not be negative",
                ));
            }
        }
    }

    errors
}

/// Declared names must not take the slot of the policy's system rule.
#[must_use]
pub fn validate_against_live(
    collection: &DesiredCollection,
    live: &[PolicyRule],
) -> Vec<ReconcileError> {
    let system_names: Vec<&str> = live
        .iter()
        .filter(|r| r.system)
        .map(|r| r.name.as_str())
        .collect();

    collection
        .rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| system_names.contains(&rule.name.as_str()))
        .map(|(idx, rule)| {
            ReconcileError::validation(
                format!("rules[{idx}].name"),
                format!(
                    "'{}' is the name of the policy's system rule, which cannot be managed",
                    rule.name
                ),
            )
        })
        .collect()
}

fn check_range(
    errors: &mut Vec<ReconcileError>,
    attribute: String,
    value: Option<i64>,
    (min, max): (i64, i64),
) {
    if let Some(v) = value {
        if v < min || v > max {
            errors.push(ReconcileError::validation(
                attribute,
                format!("{v} is outside [{min}, {max}]"),
            ));
        }
    }
}
