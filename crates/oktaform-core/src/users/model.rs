//! Declared and observed shapes of a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::status::{Transition, UserStatus};
use crate::error::{ReconcileError, ReconcileResult};
use crate::projector::{okta_profile_key, WELL_KNOWN_PROFILE};
use crate::value::{parse_custom_json, CustomAttributes, Secret};

/// An administrator role the user should hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRoleAssignment {
    /// Role type, e.g. `SUPER_ADMIN` or `ORG_ADMIN`.
    pub role_type: String,
    #[serde(default)]
    pub disable_notifications: bool,
}

/// Declared user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredUser {
    pub login: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// Other base profile attributes, keyed by their snake_case names
    /// (`second_email`, `mobile_phone`, ...). Keys absent here are unmanaged.
    #[serde(default)]
    pub profile: BTreeMap<String, String>,

    /// JSON object of custom profile attributes.
    #[serde(default)]
    pub custom_profile_attributes: Option<String>,

    /// Custom attributes owned by another system.
    #[serde(default)]
    pub custom_profile_attributes_to_ignore: BTreeSet<String>,

    #[serde(default)]
    pub status: UserStatus,

    #[serde(default)]
    pub password: Option<Secret>,
    /// When set, password changes go through the change-password endpoint.
    #[serde(default)]
    pub old_password: Option<Secret>,
    #[serde(default)]
    pub recovery_question: Option<String>,
    #[serde(default)]
    pub recovery_answer: Option<Secret>,

    #[serde(default)]
    pub expire_password_on_create: bool,

    /// `None` leaves roles unmanaged.
    #[serde(default)]
    pub admin_roles: Option<Vec<DesiredRoleAssignment>>,

    /// Group IDs. `None` leaves memberships unmanaged.
    #[serde(default)]
    pub group_memberships: Option<BTreeSet<String>>,

    /// Seconds to wait before reading, for eventually consistent tenants.
    #[serde(default)]
    pub delay_read_seconds: u64,
}

impl DesiredUser {
    #[must_use]
    pub fn new(
        login: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            profile: BTreeMap::new(),
            custom_profile_attributes: None,
            custom_profile_attributes_to_ignore: BTreeSet::new(),
            status: UserStatus::Active,
            password: None,
            old_password: None,
            recovery_question: None,
            recovery_answer: None,
            expire_password_on_create: false,
            admin_roles: None,
            group_memberships: None,
            delay_read_seconds: 0,
        }
    }

    /// Declared base attributes as `(snake_case, value)`, the four required
    /// ones included.
    pub fn base_attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        [
            ("login", self.login.as_str()),
            ("email", self.email.as_str()),
            ("first_name", self.first_name.as_str()),
            ("last_name", self.last_name.as_str()),
        ]
        .into_iter()
        .chain(self.profile.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Parsed custom attributes, minus the ignored ones.
    pub fn managed_custom_attributes(&self) -> ReconcileResult<CustomAttributes> {
        let mut attrs = match &self.custom_profile_attributes {
            Some(raw) => parse_custom_json(raw)?,
            None => CustomAttributes::new(),
        };
        attrs.retain(|k, _| !self.custom_profile_attributes_to_ignore.contains(k));
        Ok(attrs)
    }

    /// Check the declaration before any API call.
    pub fn validate(&self) -> Vec<ReconcileError> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("login", &self.login),
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                errors.push(ReconcileError::validation(name, "must not be empty"));
            }
        }

        for key in self.profile.keys() {
            if matches!(key.as_str(), "login" | "email" | "first_name" | "last_name") {
                errors.push(ReconcileError::validation(
                    format!("profile.{key}"),
                    "set this attribute at the top level",
                ));
            } else if okta_profile_key(key).is_none() {
                errors.push(ReconcileError::validation(
                    format!("profile.{key}"),
                    "not a base profile attribute; declare it in custom_profile_attributes",
                ));
            }
        }

        if let Some(raw) = &self.custom_profile_attributes {
            match parse_custom_json(raw) {
                Ok(attrs) => {
                    for key in attrs.keys() {
                        if WELL_KNOWN_PROFILE.iter().any(|(_, okta)| *okta == key.as_str()) {
                            errors.push(ReconcileError::validation(
                                "custom_profile_attributes",
                                format!("'{key}' is a base profile attribute"),
                            ));
                        }
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        if !self.status.is_declarable() {
            errors.push(ReconcileError::validation(
                "status",
                format!(
                    "{} is set by the server; declare STAGED, ACTIVE, SUSPENDED or DEPROVISIONED",
                    self.status
                ),
            ));
        }

        if self.old_password.is_some() && self.password.is_none() {
            errors.push(ReconcileError::validation(
                "old_password",
                "requires password to be set",
            ));
        }
        if self.recovery_answer.is_some() != self.recovery_question.is_some() {
            errors.push(ReconcileError::validation(
                "recovery_question",
                "recovery_question and recovery_answer must be set together",
            ));
        }
        if self.expire_password_on_create && self.password.is_none() {
            errors.push(ReconcileError::validation(
                "expire_password_on_create",
                "requires password to be set",
            ));
        }

        if let Some(roles) = &self.admin_roles {
            let mut seen = BTreeSet::new();
            for (i, role) in roles.iter().enumerate() {
                if role.role_type.trim().is_empty() {
                    errors.push(ReconcileError::validation(
                        format!("admin_roles[{i}].role_type"),
                        "must not be empty",
                    ));
                } else if !seen.insert(role.role_type.as_str()) {
                    errors.push(ReconcileError::validation(
                        format!("admin_roles[{i}].role_type"),
                        format!("role '{}' declared twice", role.role_type),
                    ));
                }
            }
        }

        errors
    }
}

/// Persisted record of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub id: String,

    /// Base profile attributes by snake_case name. `None` is a null or
    /// absent server value; `Some("")` is an empty string.
    pub profile: BTreeMap<String, Option<String>>,

    /// Canonical JSON of the custom attributes.
    pub custom_profile_attributes: String,
    #[serde(default)]
    pub custom_profile_attributes_to_ignore: BTreeSet<String>,

    /// Observed status, with transient credential states shown as `ACTIVE`.
    pub status: UserStatus,
    /// Empty unless a transition was still in flight when read.
    #[serde(default)]
    pub transitioning_to_status: String,

    /// Write-only values are stored as the redaction placeholder.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub old_password: Option<String>,
    #[serde(default)]
    pub recovery_question: Option<String>,
    #[serde(default)]
    pub recovery_answer: Option<String>,
    /// Digests of the last applied write-only values, for change detection.
    #[serde(default)]
    pub password_fingerprint: Option<String>,
    #[serde(default)]
    pub recovery_answer_fingerprint: Option<String>,

    #[serde(default)]
    pub expire_password_on_create: bool,

    /// Directly assigned admin role types, sorted.
    #[serde(default)]
    pub admin_roles: Vec<String>,
    #[serde(default)]
    pub group_memberships: BTreeSet<String>,

    /// Canonical JSON of the `_links` object.
    #[serde(default)]
    pub links: Option<String>,

    #[serde(default)]
    pub delay_read_seconds: u64,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_changed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_changed: Option<DateTime<Utc>>,
}

impl UserState {
    #[must_use]
    pub fn login(&self) -> Option<&str> {
        self.profile.get("login").and_then(Option::as_deref)
    }
}

/// Changes an apply of a [`DesiredUser`] would make.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserPlan {
    pub login: String,
    /// `None` when the user does not exist yet.
    pub user_id: Option<String>,
    pub create: bool,
    pub current_status: Option<UserStatus>,
    pub transitions: Vec<Transition>,
    /// Changed base attributes, by snake_case name.
    pub profile_changes: Vec<String>,
    /// Custom attributes to set, with `null` for removals.
    pub custom_changes: Vec<String>,
    pub password_change: bool,
    pub recovery_question_change: bool,
    pub roles_to_add: Vec<String>,
    pub roles_to_remove: Vec<String>,
    pub groups_to_add: Vec<String>,
    pub groups_to_remove: Vec<String>,
}

impl UserPlan {
    #[must_use]
    pub fn changes_profile(&self) -> bool {
        !self.profile_changes.is_empty() || !self.custom_changes.is_empty()
    }
}
