//! Identity mapper: matches declared rules to live rules by name.
//!
//! A previous apply may have created a rule on the server and crashed before
//! its state was persisted. Matching by business name instead of server ID
//! lets the next run adopt that rule rather than create a duplicate.

use oktaform_client::PolicyRule;
use std::collections::HashMap;
use tracing::{info, warn};

use super::model::{DesiredRule, RuleCollectionState};
use crate::diagnostics::{Diagnostic, Diagnostics};

/// Live rules of one policy, indexed for matching.
#[derive(Debug, Default)]
pub struct LiveIndex<'a> {
    by_name: HashMap<&'a str, &'a PolicyRule>,
    /// Non-system rules in server priority order.
    ordered: Vec<&'a PolicyRule>,
    system: Vec<&'a PolicyRule>,
}

impl<'a> LiveIndex<'a> {
    /// Index `live`, skipping system rules.
    ///
    /// Two non-system rules sharing a name block reconciliation: the error
    /// diagnostic names both server IDs.
    pub fn build(live: &'a [PolicyRule]) -> Result<Self, Diagnostics> {
        let mut index = Self::default();
        let mut blocked = Diagnostics::new();

        for rule in live {
            if rule.system {
                index.system.push(rule);
                continue;
            }
            if let Some(existing) = index.by_name.insert(rule.name.as_str(), rule) {
                blocked.push(
                    Diagnostic::error(
                        "Reconciliation blocked",
                        format!(
                            "rules '{}' and '{}' are both named '{}'; rename or delete one of them",
                            existing.id.as_deref().unwrap_or("?"),
                            rule.id.as_deref().unwrap_or("?"),
                            rule.name
                        ),
                    )
                    .with_attribute(format!("rules[\"{}\"]", rule.name)),
                );
            }
            index.ordered.push(rule);
        }

        if !blocked.is_empty() {
            return Err(blocked);
        }
        index
            .ordered
            .sort_by_key(|r| (r.priority.unwrap_or(i64::MAX), r.id.clone()));
        Ok(index)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a PolicyRule> {
        self.by_name.get(name).copied()
    }

    /// Non-system rules in server priority order.
    #[must_use]
    pub fn ordered(&self) -> &[&'a PolicyRule] {
        &self.ordered
    }

    #[must_use]
    pub fn system_rules(&self) -> &[&'a PolicyRule] {
        &self.system
    }

    /// `{name -> id}` of the non-system rules.
    #[must_use]
    pub fn ids_by_name(&self) -> HashMap<&'a str, &'a str> {
        self.by_name
            .iter()
            .filter_map(|(name, rule)| rule.id.as_deref().map(|id| (*name, id)))
            .collect()
    }
}

/// A declared rule with its live counterpart, if any.
#[derive(Debug, Clone)]
pub struct ResolvedRule<'a> {
    pub desired: &'a DesiredRule,
    pub live: Option<&'a PolicyRule>,
    /// Matched by name with no ID in prior state.
    pub adopted: bool,
}

impl ResolvedRule<'_> {
    #[must_use]
    pub fn live_id(&self) -> Option<&str> {
        self.live.and_then(|r| r.id.as_deref())
    }
}

/// Match each declared rule to a live rule by name, back-filling IDs the
/// prior state is missing.
#[must_use]
pub fn resolve<'a>(
    index: &LiveIndex<'a>,
    desired: &[&'a DesiredRule],
    prior: Option<&RuleCollectionState>,
) -> Vec<ResolvedRule<'a>> {
    desired
        .iter()
        .map(|rule| {
            let live = index.get(&rule.name);
            let prior_id = prior
                .and_then(|p| p.rule(&rule.name))
                .map(|r| r.id.as_str())
                .filter(|id| !id.is_empty());
            let live_id = live.and_then(|l| l.id.as_deref());

            let adopted = match (prior_id, live_id) {
                (None, Some(id)) => {
                    info!(rule = %rule.name, id, "Adopting existing rule with matching name");
                    true
                }
                (Some(known), Some(id)) if known != id => {
                    warn!(
                        rule = %rule.name,
                        prior_id = known,
                        live_id = id,
                        "Recorded rule ID is stale, using the live rule with the same name"
                    );
                    false
                }
                (Some(known), None) => {
                    warn!(
                        rule = %rule.name,
                        prior_id = known,
                        "Recorded rule no longer exists, it will be created again"
                    );
                    false
                }
                _ => false,
            };

            ResolvedRule {
                desired: rule,
                live,
                adopted,
            }
        })
        .collect()
}
