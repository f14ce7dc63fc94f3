//! State projector: live API objects to persisted state records.

use oktaform_client::{PolicyRule, User};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::error::{ReconcileError, ReconcileResult};
use crate::rules::{RuleState, RuleStatus};
use crate::users::{UserState, UserStatus};
use crate::value::{canonical_json, canonical_value, parse_custom_json, CustomAttributes, CustomValue};

/// Okta base profile attributes: `(snake_case name, Okta name)`.
pub const WELL_KNOWN_PROFILE: &[(&str, &str)] = &[
    ("login", "login"),
    ("email", "email"),
    ("second_email", "secondEmail"),
    ("first_name", "firstName"),
    ("last_name", "lastName"),
    ("middle_name", "middleName"),
    ("honorific_prefix", "honorificPrefix"),
    ("honorific_suffix", "honorificSuffix"),
    ("title", "title"),
    ("display_name", "displayName"),
    ("nick_name", "nickName"),
    ("profile_url", "profileUrl"),
    ("primary_phone", "primaryPhone"),
    ("mobile_phone", "mobilePhone"),
    ("street_address", "streetAddress"),
    ("city", "city"),
    ("state", "state"),
    ("zip_code", "zipCode"),
    ("postal_address", "postalAddress"),
    ("country_code", "countryCode"),
    ("preferred_language", "preferredLanguage"),
    ("locale", "locale"),
    ("timezone", "timezone"),
    ("user_type", "userType"),
    ("employee_number", "employeeNumber"),
    ("cost_center", "costCenter"),
    ("organization", "organization"),
    ("division", "division"),
    ("department", "department"),
    ("manager_id", "managerId"),
    ("manager", "manager"),
];

#[must_use]
pub fn okta_profile_key(snake: &str) -> Option<&'static str> {
    WELL_KNOWN_PROFILE
        .iter()
        .find(|(s, _)| *s == snake)
        .map(|(_, okta)| *okta)
}

#[must_use]
pub fn is_base_attribute(okta_key: &str) -> bool {
    WELL_KNOWN_PROFILE.iter().any(|(_, okta)| *okta == okta_key)
}

/// Project a live rule. `declared_priority` is the ordering key kept in
/// state; the live priority is kept alongside for drift detection.
#[must_use]
pub fn project_rule(live: &PolicyRule, declared_priority: i64) -> RuleState {
    let people = &live.conditions.people;
    let token = &live.actions.token;
    RuleState {
        id: live.id.clone().unwrap_or_default(),
        name: live.name.clone(),
        priority: declared_priority,
        server_priority: live.priority,
        status: RuleStatus::from_wire(live.status.as_deref()),
        grant_type_whitelist: live.conditions.grant_types.include.clone(),
        scope_whitelist: live.conditions.scopes.include.clone(),
        group_whitelist: people.groups.include.clone(),
        group_blacklist: people.groups.exclude.clone(),
        user_whitelist: people.users.include.clone(),
        user_blacklist: people.users.exclude.clone(),
        access_token_lifetime_minutes: token.access_token_lifetime_minutes,
        refresh_token_lifetime_minutes: token.refresh_token_lifetime_minutes,
        refresh_token_window_minutes: token.refresh_token_window_minutes,
        inline_hook_id: token.inline_hook.as_ref().map(|h| h.id.clone()),
    }
}

/// Digest of a write-only value, scoped to the user it was applied to.
#[must_use]
pub fn fingerprint(user_id: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Project a live user.
///
/// `carry` supplies what the server never returns: write-only placeholders
/// and fingerprints, the ignore list and the values kept for ignored
/// attributes, roles, groups and read options. Base attributes that `carry`
/// lists but the server omits project as `None`.
pub fn project_user(live: &User, carry: Option<&UserState>) -> ReconcileResult<UserState> {
    let id = live.id.clone().ok_or_else(|| ReconcileError::Remote {
        operation: "read user".to_string(),
        status: None,
        message: "response carries no user id".to_string(),
    })?;
    let raw_status = live.status.as_deref().unwrap_or_default();
    let status: UserStatus = raw_status.parse().map_err(|_| ReconcileError::Remote {
        operation: format!("read user {id}"),
        status: None,
        message: format!("unrecognised status '{raw_status}'"),
    })?;

    let mut state = carry.cloned().unwrap_or_default();
    state.id = id;
    state.status = status.normalized();
    state.transitioning_to_status = live.pending_status().unwrap_or_default().to_string();

    let tracked: BTreeSet<String> = state.profile.keys().cloned().collect();
    state.profile.clear();
    for (snake, okta) in WELL_KNOWN_PROFILE {
        match live.profile.get(*okta) {
            Some(Value::Null) => {
                state.profile.insert((*snake).to_string(), None);
            }
            Some(Value::String(s)) => {
                state.profile.insert((*snake).to_string(), Some(s.clone()));
            }
            Some(other) => {
                state
                    .profile
                    .insert((*snake).to_string(), Some(other.to_string()));
            }
            None if tracked.contains(*snake) => {
                state.profile.insert((*snake).to_string(), None);
            }
            None => {}
        }
    }

    let ignore = &state.custom_profile_attributes_to_ignore;
    let mut custom: CustomAttributes = live
        .profile
        .iter()
        .filter(|(k, _)| !is_base_attribute(k) && !ignore.contains(k.as_str()))
        .filter_map(|(k, v)| CustomValue::from_json(v).map(|v| (k.clone(), v)))
        .collect();
    keep_ignored(&mut custom, &state.custom_profile_attributes, ignore);
    state.custom_profile_attributes = canonical_json(&custom);

    if let Some(question) = live
        .credentials
        .as_ref()
        .and_then(|c| c.recovery_question.as_ref())
        .and_then(|q| q.question.clone())
    {
        state.recovery_question = Some(question);
    }

    state.links = live
        .links
        .as_ref()
        .map(|links| canonical_value(&Value::Object(links.clone())));
    state.created = live.created;
    state.activated = live.activated;
    state.status_changed = live.status_changed;
    state.last_login = live.last_login;
    state.last_updated = live.last_updated;
    state.password_changed = live.password_changed;

    Ok(state)
}

/// Copy ignored attributes from `source` into `custom`.
pub fn keep_ignored(custom: &mut CustomAttributes, source: &str, ignore: &BTreeSet<String>) {
    if ignore.is_empty() {
        return;
    }
    let Ok(source) = parse_custom_json(source) else {
        return;
    };
    for (key, value) in source {
        if ignore.contains(&key) {
            custom.insert(key, value);
        }
    }
}
