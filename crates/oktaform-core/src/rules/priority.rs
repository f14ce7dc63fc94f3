//! Priority coordination.
//!
//! Okta keeps the priorities of a policy's rules unique and contiguous,
//! starting at 1, with the system rule last. Declared priorities only express
//! an order: the rule at declared position `i` is sent with wire priority
//! `i + 1`. The server remains the source of truth for the absolute numbers,
//! which are re-read after every apply.

use oktaform_client::PolicyRule;
use std::collections::HashMap;

use super::mapper::ResolvedRule;
use super::model::RuleState;

/// Wire priority of the rule at zero-based declared position `position`.
#[must_use]
pub fn wire_priority(position: usize) -> i64 {
    i64::try_from(position).map_or(i64::MAX, |p| p + 1)
}

/// For each resolved rule with a live counterpart, whether it must be moved.
///
/// Replays the apply against the live order: deleted rules disappear, each
/// create is inserted at its declared position and shifts the rules below
/// it. A matched rule needs a reorder only when, at its turn, it does not
/// already sit at its declared position. Entries for rules without a live
/// counterpart are `false`.
#[must_use]
pub fn reorders_needed(live_ordered: &[&PolicyRule], resolved: &[ResolvedRule<'_>]) -> Vec<bool> {
    let kept: Vec<&str> = resolved.iter().filter_map(ResolvedRule::live_id).collect();
    let mut order: Vec<Option<&str>> = live_ordered
        .iter()
        .filter_map(|r| r.id.as_deref())
        .filter(|id| kept.contains(id))
        .map(Some)
        .collect();

    resolved
        .iter()
        .enumerate()
        .map(|(position, rule)| match rule.live_id() {
            None => {
                let at = position.min(order.len());
                order.insert(at, None);
                false
            }
            Some(id) => {
                let current = order.iter().position(|slot| *slot == Some(id));
                if current == Some(position) {
                    return false;
                }
                if let Some(from) = current {
                    order.remove(from);
                }
                let at = position.min(order.len());
                order.insert(at, Some(id));
                true
            }
        })
        .collect()
}

/// Order projected rules by declared priority. Rules with no declared
/// counterpart follow, by server priority.
#[must_use]
pub fn arrange_in_declared_order(
    mut rules: Vec<RuleState>,
    declared: &HashMap<&str, i64>,
) -> Vec<RuleState> {
    rules.sort_by_key(|r| match declared.get(r.name.as_str()) {
        Some(p) => (0, *p, 0),
        None => (1, r.server_priority.unwrap_or(i64::MAX), r.priority),
    });
    rules
}
