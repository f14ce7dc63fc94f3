//! Declared and observed shapes of a policy rule collection.

use oktaform_client::{
    IncludeExclude, IncludeList, InlineHookRef, PeopleCondition, PolicyRef, PolicyRule,
    RuleActions, RuleConditions, TokenActions,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const RULE_TYPE: &str = "RESOURCE_ACCESS";

/// Group Okta uses when a rule names no people at all.
pub const EVERYONE_GROUP: &str = "EVERYONE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    #[default]
    Active,
    Inactive,
}

impl RuleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }

    /// Parse the wire value; anything but `INACTIVE` counts as active.
    #[must_use]
    pub fn from_wire(status: Option<&str>) -> Self {
        match status {
            Some(s) if s.eq_ignore_ascii_case("INACTIVE") => Self::Inactive,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared rule. The server ID is never an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRule {
    /// Business key, unique within the collection.
    pub name: String,

    /// Lower is evaluated earlier. Must be positive and unique.
    pub priority: i64,

    #[serde(default)]
    pub status: RuleStatus,

    pub grant_type_whitelist: Vec<String>,

    #[serde(default)]
    pub scope_whitelist: Vec<String>,

    /// Not supported by the authorization server rule API; must stay empty.
    #[serde(default)]
    pub scope_blacklist: Vec<String>,

    #[serde(default)]
    pub group_whitelist: Vec<String>,
    #[serde(default)]
    pub group_blacklist: Vec<String>,
    #[serde(default)]
    pub user_whitelist: Vec<String>,
    #[serde(default)]
    pub user_blacklist: Vec<String>,

    /// Minutes, within [5, 1440].
    #[serde(default)]
    pub access_token_lifetime_minutes: Option<i64>,
    #[serde(default)]
    pub refresh_token_lifetime_minutes: Option<i64>,
    /// Minutes, within [5, 2628000].
    #[serde(default)]
    pub refresh_token_window_minutes: Option<i64>,

    #[serde(default)]
    pub inline_hook_id: Option<String>,
}

impl DesiredRule {
    /// Minimal rule with one grant type, as used in tests and docs.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: i64, grant_types: &[&str]) -> Self {
        Self {
            name: name.into(),
            priority,
            status: RuleStatus::Active,
            grant_type_whitelist: grant_types.iter().map(|g| (*g).to_string()).collect(),
            scope_whitelist: Vec::new(),
            scope_blacklist: Vec::new(),
            group_whitelist: Vec::new(),
            group_blacklist: Vec::new(),
            user_whitelist: Vec::new(),
            user_blacklist: Vec::new(),
            access_token_lifetime_minutes: None,
            refresh_token_lifetime_minutes: None,
            refresh_token_window_minutes: None,
            inline_hook_id: None,
        }
    }

    /// Request body for this rule at `wire_priority`.
    #[must_use]
    pub fn to_wire(&self, wire_priority: i64) -> PolicyRule {
        let groups_include = if self.group_whitelist.is_empty() && self.user_whitelist.is_empty() {
            vec![EVERYONE_GROUP.to_string()]
        } else {
            self.group_whitelist.clone()
        };
        let scopes = if self.scope_whitelist.is_empty() {
            vec!["*".to_string()]
        } else {
            self.scope_whitelist.clone()
        };

        PolicyRule {
            id: None,
            name: self.name.clone(),
            rule_type: RULE_TYPE.to_string(),
            priority: Some(wire_priority),
            status: Some(self.status.as_str().to_string()),
            system: false,
            conditions: RuleConditions {
                grant_types: IncludeList {
                    include: self.grant_type_whitelist.clone(),
                },
                scopes: IncludeList { include: scopes },
                people: PeopleCondition {
                    users: IncludeExclude {
                        include: self.user_whitelist.clone(),
                        exclude: self.user_blacklist.clone(),
                    },
                    groups: IncludeExclude {
                        include: groups_include,
                        exclude: self.group_blacklist.clone(),
                    },
                },
            },
            actions: RuleActions {
                token: TokenActions {
                    access_token_lifetime_minutes: self.access_token_lifetime_minutes,
                    refresh_token_lifetime_minutes: self.refresh_token_lifetime_minutes,
                    refresh_token_window_minutes: self.refresh_token_window_minutes,
                    inline_hook: self
                        .inline_hook_id
                        .as_ref()
                        .map(|id| InlineHookRef { id: id.clone() }),
                },
            },
        }
    }
}

/// Every rule of one policy, declared as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredCollection {
    pub authorization_server_id: String,
    pub policy_id: String,
    #[serde(default)]
    pub rules: Vec<DesiredRule>,
}

impl DesiredCollection {
    #[must_use]
    pub fn policy(&self) -> PolicyRef {
        PolicyRef::new(&self.authorization_server_id, &self.policy_id)
    }

    /// Rules sorted by declared priority.
    #[must_use]
    pub fn ordered_rules(&self) -> Vec<&DesiredRule> {
        let mut rules: Vec<&DesiredRule> = self.rules.iter().collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }
}

/// Persisted record of one managed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleState {
    pub id: String,
    pub name: String,
    /// Priority as declared; the ordering key.
    pub priority: i64,
    /// Priority last observed on the server, for drift detection.
    #[serde(default)]
    pub server_priority: Option<i64>,
    pub status: RuleStatus,
    pub grant_type_whitelist: Vec<String>,
    #[serde(default)]
    pub scope_whitelist: Vec<String>,
    #[serde(default)]
    pub group_whitelist: Vec<String>,
    #[serde(default)]
    pub group_blacklist: Vec<String>,
    #[serde(default)]
    pub user_whitelist: Vec<String>,
    #[serde(default)]
    pub user_blacklist: Vec<String>,
    #[serde(default)]
    pub access_token_lifetime_minutes: Option<i64>,
    #[serde(default)]
    pub refresh_token_lifetime_minutes: Option<i64>,
    #[serde(default)]
    pub refresh_token_window_minutes: Option<i64>,
    #[serde(default)]
    pub inline_hook_id: Option<String>,
}

/// Persisted record of a rule collection, rules in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCollectionState {
    /// `{authorization_server_id}/{policy_id}`.
    pub id: String,
    pub authorization_server_id: String,
    pub policy_id: String,
    pub rules: Vec<RuleState>,
}

impl RuleCollectionState {
    #[must_use]
    pub fn new(policy: &PolicyRef, rules: Vec<RuleState>) -> Self {
        Self {
            id: policy.to_string(),
            authorization_server_id: policy.authorization_server_id.clone(),
            policy_id: policy.policy_id.clone(),
            rules,
        }
    }

    #[must_use]
    pub fn policy(&self) -> PolicyRef {
        PolicyRef::new(&self.authorization_server_id, &self.policy_id)
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&RuleState> {
        self.rules.iter().find(|r| r.name == name)
    }
}
