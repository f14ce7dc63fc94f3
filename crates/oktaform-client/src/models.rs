//! Wire models for the Okta management API.
//!
//! Field names follow the Okta JSON shape (camelCase). Only the attributes
//! the reconciliation core reads or writes are modelled; everything else in a
//! response is ignored on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Identifies the policy that owns a rule collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    pub authorization_server_id: String,
    pub policy_id: String,
}

impl PolicyRef {
    #[must_use]
    pub fn new(authorization_server_id: impl Into<String>, policy_id: impl Into<String>) -> Self {
        Self {
            authorization_server_id: authorization_server_id.into(),
            policy_id: policy_id.into(),
        }
    }
}

impl std::fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.authorization_server_id, self.policy_id)
    }
}

// ── Authorization server policy rules ────────────────────────────────────

/// An authorization server policy rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Server-assigned ID; absent on create requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    /// Rule type, always `RESOURCE_ACCESS` for authorization server rules.
    #[serde(rename = "type", default = "default_rule_type")]
    pub rule_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    /// `ACTIVE` or `INACTIVE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Set by the server on the protected default rule.
    #[serde(default, skip_serializing_if = "is_false")]
    pub system: bool,

    #[serde(default)]
    pub conditions: RuleConditions,

    #[serde(default)]
    pub actions: RuleActions,
}

fn default_rule_type() -> String {
    "RESOURCE_ACCESS".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConditions {
    #[serde(default)]
    pub grant_types: IncludeList,
    #[serde(default)]
    pub scopes: IncludeList,
    #[serde(default)]
    pub people: PeopleCondition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeList {
    #[serde(default)]
    pub include: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeopleCondition {
    #[serde(default)]
    pub users: IncludeExclude,
    #[serde(default)]
    pub groups: IncludeExclude,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeExclude {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleActions {
    #[serde(default)]
    pub token: TokenActions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_lifetime_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_window_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_hook: Option<InlineHookRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineHookRef {
    pub id: String,
}

// ── Users ─────────────────────────────────────────────────────────────────

/// An Okta user as returned by `GET /api/v1/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Lifecycle status, e.g. `ACTIVE`, `SUSPENDED`, `DEPROVISIONED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Set while an asynchronous lifecycle change is in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitioning_to_status: Option<String>,

    /// Profile attributes, base and custom, keyed by their Okta names.
    #[serde(default)]
    pub profile: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<UserCredentials>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_changed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_changed: Option<DateTime<Utc>>,

    /// HAL links (`self`, `activate`, `suspend`, ...).
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Map<String, Value>>,
}

impl User {
    /// Profile attribute as a string, if present and a string.
    #[must_use]
    pub fn profile_str(&self, key: &str) -> Option<&str> {
        self.profile.get(key).and_then(Value::as_str)
    }

    /// The pending status, treating an empty string as no transition.
    #[must_use]
    pub fn pending_status(&self) -> Option<&str> {
        self.transitioning_to_status
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_question: Option<RecoveryQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CredentialProvider>,
}

/// Password wrapper. Okta never returns the value, only an empty object.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasswordValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl std::fmt::Debug for PasswordValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordValue")
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl PasswordValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl std::fmt::Debug for RecoveryQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryQuestion")
            .field("question", &self.question)
            .field("answer", &self.answer.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialProvider {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of `POST /api/v1/users` and of partial profile updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub profile: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<UserCredentials>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<String>,
}

/// Body of `POST /api/v1/users/{id}/credentials/change_password`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: PasswordValue,
    pub new_password: PasswordValue,
}

/// Body of `POST /api/v1/users/{id}/credentials/change_recovery_question`.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecoveryQuestionRequest {
    pub password: PasswordValue,
    pub recovery_question: RecoveryQuestion,
}

// ── Roles and groups ──────────────────────────────────────────────────────

/// An administrator role assigned to a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Assignment ID, used to remove the role.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub role_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_type: Option<String>,
}

/// Body of `POST /api/v1/users/{id}/roles`.
#[derive(Debug, Clone, Serialize)]
pub struct AssignRoleRequest {
    #[serde(rename = "type")]
    pub role_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(rename = "type", default)]
    pub group_type: String,
    #[serde(default)]
    pub profile: GroupProfile,
}

impl Group {
    /// Okta's implicit `Everyone` group, which memberships can't be changed for.
    #[must_use]
    pub fn is_built_in(&self) -> bool {
        self.group_type == "BUILT_IN"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
