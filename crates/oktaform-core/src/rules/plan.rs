//! Diff of a declared collection against the live rules of its policy.

use oktaform_client::{PolicyRef, PolicyRule};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use super::mapper::{resolve, LiveIndex};
use super::model::{DesiredCollection, DesiredRule, RuleCollectionState, RuleStatus};
use super::priority::{reorders_needed, wire_priority};
use super::validate::{validate_against_live, validate_collection};
use crate::diagnostics::{Diagnostic, Diagnostics};

/// Why an existing rule will be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UpdateReason {
    Reorder { from: Option<i64>, to: i64 },
    Attribute { name: String },
}

/// A live rule to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDelete {
    pub id: String,
    pub name: String,
    pub server_priority: Option<i64>,
}

/// What happens to one declared rule, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanStep {
    Create {
        rule: DesiredRule,
        wire_priority: i64,
    },
    Update {
        id: String,
        rule: DesiredRule,
        wire_priority: i64,
        reasons: Vec<UpdateReason>,
        adopted: bool,
    },
    /// Live rule already matches; no call is made.
    Unchanged {
        id: String,
        rule: DesiredRule,
        wire_priority: i64,
        adopted: bool,
    },
}

impl PlanStep {
    #[must_use]
    pub fn rule(&self) -> &DesiredRule {
        match self {
            Self::Create { rule, .. } | Self::Update { rule, .. } | Self::Unchanged { rule, .. } => {
                rule
            }
        }
    }

    #[must_use]
    pub fn wire_priority(&self) -> i64 {
        match self {
            Self::Create { wire_priority, .. }
            | Self::Update { wire_priority, .. }
            | Self::Unchanged { wire_priority, .. } => *wire_priority,
        }
    }

    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

/// Ordered action plan: deletes first, then declared rules in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub policy: PolicyRef,
    pub to_delete: Vec<PlannedDelete>,
    pub steps: Vec<PlanStep>,
}

impl ReconciliationPlan {
    pub fn to_create(&self) -> impl Iterator<Item = &DesiredRule> {
        self.steps.iter().filter_map(|s| match s {
            PlanStep::Create { rule, .. } => Some(rule),
            _ => None,
        })
    }

    pub fn to_update(&self) -> impl Iterator<Item = (&str, &DesiredRule)> {
        self.steps.iter().filter_map(|s| match s {
            PlanStep::Update { id, rule, .. } => Some((id.as_str(), rule)),
            _ => None,
        })
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &DesiredRule> {
        self.steps.iter().filter_map(|s| match s {
            PlanStep::Unchanged { rule, .. } => Some(rule),
            _ => None,
        })
    }

    /// Number of API mutations an apply would issue, ignoring status syncs.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.to_delete.len() + self.steps.iter().filter(|s| s.is_mutation()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutation_count() == 0
    }
}

/// Diff `collection` against `live`.
///
/// Fails with diagnostics, before any mutation, when the declaration breaks
/// an invariant or the live collection has ambiguous names.
pub fn build_plan(
    collection: &DesiredCollection,
    live: &[PolicyRule],
    prior: Option<&RuleCollectionState>,
) -> Result<ReconciliationPlan, Diagnostics> {
    let mut invalid = Diagnostics::new();
    for err in validate_collection(collection)
        .iter()
        .chain(validate_against_live(collection, live).iter())
    {
        invalid.push(Diagnostic::from(err));
    }
    if invalid.has_errors() {
        return Err(invalid);
    }

    let index = LiveIndex::build(live)?;
    let ordered = collection.ordered_rules();
    let resolved = resolve(&index, &ordered, prior);
    let reorders = reorders_needed(index.ordered(), &resolved);

    let declared: HashSet<&str> = ordered.iter().map(|r| r.name.as_str()).collect();
    let to_delete = index
        .ordered()
        .iter()
        .filter(|r| !declared.contains(r.name.as_str()))
        .filter_map(|r| {
            r.id.as_ref().map(|id| PlannedDelete {
                id: id.clone(),
                name: r.name.clone(),
                server_priority: r.priority,
            })
        })
        .collect();

    let steps = resolved
        .iter()
        .zip(reorders)
        .enumerate()
        .map(|(position, (rule, reorder))| {
            let wire = wire_priority(position);
            let (Some(live_rule), Some(id)) = (rule.live, rule.live_id()) else {
                return PlanStep::Create {
                    rule: rule.desired.clone(),
                    wire_priority: wire,
                };
            };

            let mut reasons: Vec<UpdateReason> = Vec::new();
            if reorder {
                reasons.push(UpdateReason::Reorder {
                    from: live_rule.priority,
                    to: wire,
                });
            }
            reasons.extend(
                attribute_diff(rule.desired, live_rule)
                    .into_iter()
                    .map(|name| UpdateReason::Attribute { name }),
            );

            if reasons.is_empty() {
                PlanStep::Unchanged {
                    id: id.to_string(),
                    rule: rule.desired.clone(),
                    wire_priority: wire,
                    adopted: rule.adopted,
                }
            } else {
                PlanStep::Update {
                    id: id.to_string(),
                    rule: rule.desired.clone(),
                    wire_priority: wire,
                    reasons,
                    adopted: rule.adopted,
                }
            }
        })
        .collect();

    Ok(ReconciliationPlan {
        policy: collection.policy(),
        to_delete,
        steps,
    })
}

/// Names of declared attributes that differ from the live rule.
///
/// List attributes compare as sets. Unset lifetimes are left to the server.
#[must_use]
pub fn attribute_diff(desired: &DesiredRule, live: &PolicyRule) -> Vec<String> {
    fn set(items: &[String]) -> BTreeSet<&str> {
        items.iter().map(String::as_str).collect()
    }

    let want = desired.to_wire(live.priority.unwrap_or(1));
    let (wc, lc) = (&want.conditions, &live.conditions);
    let (wt, lt) = (&want.actions.token, &live.actions.token);
    let mut changed = Vec::new();

    if desired.status != RuleStatus::from_wire(live.status.as_deref()) {
        changed.push("status");
    }
    if set(&wc.grant_types.include) != set(&lc.grant_types.include) {
        changed.push("grant_type_whitelist");
    }
    if set(&wc.scopes.include) != set(&lc.scopes.include) {
        changed.push("scope_whitelist");
    }
    if set(&wc.people.groups.include) != set(&lc.people.groups.include) {
        changed.push("group_whitelist");
    }
    if set(&wc.people.groups.exclude) != set(&lc.people.groups.exclude) {
        changed.push("group_blacklist");
    }
    if set(&wc.people.users.include) != set(&lc.people.users.include) {
        changed.push("user_whitelist");
    }
    if set(&wc.people.users.exclude) != set(&lc.people.users.exclude) {
        changed.push("user_blacklist");
    }
    let lifetimes = [
        (
            "access_token_lifetime_minutes",
            wt.access_token_lifetime_minutes,
            lt.access_token_lifetime_minutes,
        ),
        (
            "refresh_token_lifetime_minutes",
            wt.refresh_token_lifetime_minutes,
            lt.refresh_token_lifetime_minutes,
        ),
        (
            "refresh_token_window_minutes",
            wt.refresh_token_window_minutes,
            lt.refresh_token_window_minutes,
        ),
    ];
    for (name, wanted, observed) in lifetimes {
        if wanted.is_some() && wanted != observed {
            changed.push(name);
        }
    }
    if wt.inline_hook.as_ref().map(|h| &h.id) != lt.inline_hook.as_ref().map(|h| &h.id) {
        changed.push("inline_hook_id");
    }

    changed.into_iter().map(str::to_string).collect()
}
