//! Collection reconciler: plans and applies a declared rule collection.
//!
//! Apply order:
//!
//! 1. validate the declaration (no API call on failure)
//! 2. list every live rule of the policy, following cursors to exhaustion
//! 3. diff by name into a [`ReconciliationPlan`]
//! 4. delete undeclared non-system rules (404 counts as done)
//! 5. create or replace declared rules one at a time, in declared order
//! 6. re-read the policy and return its rules in declared order
//!
//! A permanent error or a cancellation halts the plan. Steps already applied
//! are kept and show up in the returned state.

use async_trait::async_trait;
use oktaform_client::{ListParams, PolicyRef, PolicyRule, PolicyRuleApi};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::model::{DesiredCollection, DesiredRule, RuleCollectionState, RuleState, RuleStatus};
use super::plan::{build_plan, PlanStep, ReconciliationPlan, UpdateReason};
use super::priority::arrange_in_declared_order;
use super::validate::validate_collection;
use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{ReconcileError, ReconcileResult};
use crate::projector::project_rule;
use crate::resource::{Outcome, PlanSummary, Resource};
use crate::retry::{RetryHarness, RetryPolicy};

/// Reconciles the rule collection of one policy at a time.
#[derive(Clone)]
pub struct RuleCollectionReconciler {
    api: Arc<dyn PolicyRuleApi>,
    harness: RetryHarness,
    page_size: u32,
}

impl std::fmt::Debug for RuleCollectionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCollectionReconciler")
            .field("harness", &self.harness)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RuleCollectionReconciler {
    #[must_use]
    pub fn new(api: Arc<dyn PolicyRuleApi>, config: &CoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            harness: RetryHarness::new(RetryPolicy::from_config(config), clock),
            page_size: config.page_size(),
        }
    }

    #[must_use]
    pub fn with_harness(api: Arc<dyn PolicyRuleApi>, harness: RetryHarness, page_size: u32) -> Self {
        Self {
            api,
            harness,
            page_size,
        }
    }

    /// Every rule of `policy`, system rule included.
    pub async fn list_live(
        &self,
        policy: &PolicyRef,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Vec<PolicyRule>> {
        let mut params = ListParams::with_limit(self.page_size);
        let mut rules = Vec::new();
        let operation = format!("list rules of policy {policy}");

        loop {
            let page = self
                .harness
                .read(cancel, &operation, || {
                    self.api.list_policy_rules(policy, &params)
                })
                .await?;
            rules.extend(page.items);

            match page.next_cursor {
                Some(cursor) if params.after.as_deref() != Some(cursor.as_str()) => {
                    params = params.page(Some(cursor));
                }
                Some(cursor) => {
                    warn!(%policy, cursor, "Pagination cursor did not advance, stopping");
                    break;
                }
                None => break,
            }
        }

        debug!(%policy, count = rules.len(), "Listed live policy rules");
        Ok(rules)
    }

    /// Compute the plan without applying it.
    pub async fn plan(
        &self,
        desired: &DesiredCollection,
        prior: Option<&RuleCollectionState>,
        cancel: &CancellationToken,
    ) -> Outcome<ReconciliationPlan> {
        if let Some(diags) = pre_validate(desired) {
            return Outcome::new(None, diags);
        }
        let live = match self.list_live(&desired.policy(), cancel).await {
            Ok(live) => live,
            Err(e) => return Outcome::new(None, e.into()),
        };
        match build_plan(desired, &live, prior) {
            Ok(plan) => Outcome::ok(plan),
            Err(diags) => Outcome::new(None, diags),
        }
    }

    /// Bring the policy's rules to `desired`.
    pub async fn apply(
        &self,
        desired: &DesiredCollection,
        prior: Option<&RuleCollectionState>,
        cancel: &CancellationToken,
    ) -> Outcome<RuleCollectionState> {
        let policy = desired.policy();
        if let Some(diags) = pre_validate(desired) {
            return Outcome::new(prior.cloned(), diags);
        }

        let live = match self.list_live(&policy, cancel).await {
            Ok(live) => live,
            Err(e) => return Outcome::new(prior.cloned(), e.into()),
        };
        let plan = match build_plan(desired, &live, prior) {
            Ok(plan) => plan,
            Err(diags) => return Outcome::new(prior.cloned(), diags),
        };

        info!(
            %policy,
            deletes = plan.to_delete.len(),
            creates = plan.to_create().count(),
            updates = plan.to_update().count(),
            "Applying rule collection plan"
        );

        let mut diagnostics = Diagnostics::new();
        let mut applied = AppliedRules::seed(prior, &live);
        self.execute(&plan, &live, &mut applied, &mut diagnostics, cancel)
            .await;

        // Re-read even after cancellation so the partial result is recorded.
        let rules = match self.list_live(&policy, &CancellationToken::new()).await {
            Ok(after) => declared_from_live(desired, &after),
            Err(e) => {
                diagnostics.push_warning(
                    "Could not re-read rules after apply",
                    format!("{e}; returning the state built from API responses"),
                );
                applied.into_state(desired)
            }
        };

        Outcome::new(
            Some(RuleCollectionState::new(&policy, rules)),
            diagnostics,
        )
    }

    async fn execute(
        &self,
        plan: &ReconciliationPlan,
        live: &[PolicyRule],
        applied: &mut AppliedRules,
        diagnostics: &mut Diagnostics,
        cancel: &CancellationToken,
    ) {
        let policy = &plan.policy;

        for delete in &plan.to_delete {
            if halt_if_cancelled(cancel, diagnostics) {
                return;
            }
            let operation = format!("delete policy rule '{}' ({})", delete.name, delete.id);
            match self
                .harness
                .delete(cancel, &operation, || {
                    self.api.delete_policy_rule(policy, &delete.id)
                })
                .await
            {
                Ok(true) => info!(rule = %delete.name, id = %delete.id, "Deleted rule"),
                Ok(false) => info!(
                    rule = %delete.name,
                    id = %delete.id,
                    "Rule already deleted"
                ),
                Err(e) => {
                    diagnostics.push_error(&e);
                    return;
                }
            }
            applied.remove_id(&delete.id);
        }

        for step in &plan.steps {
            if halt_if_cancelled(cancel, diagnostics) {
                return;
            }
            let rule = step.rule();
            let result = match step {
                PlanStep::Create { wire_priority, .. } => {
                    self.create_rule(policy, rule, *wire_priority, cancel).await
                }
                PlanStep::Update {
                    id,
                    wire_priority,
                    reasons,
                    ..
                } => {
                    debug!(rule = %rule.name, ?reasons, "Updating rule");
                    self.update_rule(policy, id, rule, *wire_priority, reasons, cancel)
                        .await
                }
                PlanStep::Unchanged { id, adopted, .. } => {
                    if *adopted {
                        info!(rule = %rule.name, %id, "Adopted rule already matches");
                    }
                    match live.iter().find(|r| r.id.as_deref() == Some(id.as_str())) {
                        Some(found) => Ok(found.clone()),
                        None => continue,
                    }
                }
            };

            match result {
                Ok(observed) => applied.record(project_rule(&observed, rule.priority)),
                Err(e) => {
                    diagnostics.push_error(&e);
                    return;
                }
            }
        }
    }

    async fn create_rule(
        &self,
        policy: &PolicyRef,
        rule: &DesiredRule,
        wire_priority: i64,
        cancel: &CancellationToken,
    ) -> ReconcileResult<PolicyRule> {
        let body = rule.to_wire(wire_priority);
        let operation = format!("create policy rule '{}'", rule.name);
        let created = self
            .harness
            .mutate(cancel, &operation, || {
                self.api.create_policy_rule(policy, &body)
            })
            .await
            .map_err(|e| name_priority_conflict(e, rule, wire_priority))?;

        info!(
            rule = %rule.name,
            id = created.id.as_deref().unwrap_or_default(),
            priority = rule.priority,
            "Created rule"
        );
        self.sync_status(policy, created, rule, cancel).await
    }

    async fn update_rule(
        &self,
        policy: &PolicyRef,
        id: &str,
        rule: &DesiredRule,
        wire_priority: i64,
        reasons: &[UpdateReason],
        cancel: &CancellationToken,
    ) -> ReconcileResult<PolicyRule> {
        let mut body = rule.to_wire(wire_priority);
        body.id = Some(id.to_string());
        let operation = format!("replace policy rule '{}' ({id})", rule.name);

        match self
            .harness
            .mutate(cancel, &operation, || {
                self.api.replace_policy_rule(policy, id, &body)
            })
            .await
        {
            Ok(replaced) => {
                info!(rule = %rule.name, %id, changes = reasons.len(), "Replaced rule");
                self.sync_status(policy, replaced, rule, cancel).await
            }
            Err(e) if e.is_not_found() => {
                warn!(
                    rule = %rule.name,
                    %id,
                    "Rule disappeared before update, creating it again"
                );
                self.create_rule(policy, rule, wire_priority, cancel)
                    .await
                    .map_err(|create_err| {
                        if create_err.is_cancelled() {
                            return create_err;
                        }
                        ReconcileError::NotFound {
                            operation,
                            message: format!(
                                "rule {id} no longer exists and re-creating it failed: {create_err}"
                            ),
                        }
                    })
            }
            Err(e) => Err(name_priority_conflict(e, rule, wire_priority)),
        }
    }

    /// Activate or deactivate `observed` when its status differs from the
    /// declared one.
    async fn sync_status(
        &self,
        policy: &PolicyRef,
        mut observed: PolicyRule,
        rule: &DesiredRule,
        cancel: &CancellationToken,
    ) -> ReconcileResult<PolicyRule> {
        if RuleStatus::from_wire(observed.status.as_deref()) == rule.status {
            return Ok(observed);
        }
        let Some(id) = observed.id.clone() else {
            return Ok(observed);
        };

        let operation = format!("set status of rule '{}' to {}", rule.name, rule.status);
        match rule.status {
            RuleStatus::Active => {
                self.harness
                    .mutate(cancel, &operation, || {
                        self.api.activate_policy_rule(policy, &id)
                    })
                    .await?;
            }
            RuleStatus::Inactive => {
                self.harness
                    .mutate(cancel, &operation, || {
                        self.api.deactivate_policy_rule(policy, &id)
                    })
                    .await?;
            }
        }
        observed.status = Some(rule.status.as_str().to_string());
        Ok(observed)
    }

    /// Refresh `prior` from the live policy.
    pub async fn read(
        &self,
        prior: &RuleCollectionState,
        cancel: &CancellationToken,
    ) -> Outcome<RuleCollectionState> {
        let policy = prior.policy();
        let live = match self.list_live(&policy, cancel).await {
            Ok(live) => live,
            Err(e) if e.is_not_found() => {
                warn!(%policy, "Policy no longer exists, dropping its rules from state");
                return Outcome::new(None, Diagnostics::new());
            }
            Err(e) => return Outcome::new(Some(prior.clone()), e.into()),
        };

        let managed: Vec<&PolicyRule> = live.iter().filter(|r| !r.system).collect();
        let mut rules = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for recorded in &prior.rules {
            let found = managed
                .iter()
                .find(|r| r.id.as_deref() == Some(recorded.id.as_str()))
                .or_else(|| managed.iter().find(|r| r.name == recorded.name));
            if let Some(found) = found {
                if let Some(id) = found.id.as_deref() {
                    seen.push(id);
                }
                rules.push(project_rule(found, recorded.priority));
            }
        }

        let mut extras: Vec<&&PolicyRule> = managed
            .iter()
            .filter(|r| r.id.as_deref().map_or(true, |id| !seen.contains(&id)))
            .collect();
        extras.sort_by_key(|r| r.priority);
        for extra in extras {
            debug!(rule = %extra.name, "Found unmanaged rule in policy");
            rules.push(project_rule(extra, extra.priority.unwrap_or(i64::MAX)));
        }

        Outcome::ok(RuleCollectionState::new(&policy, rules))
    }

    /// Import the current rules of `{authorization_server_id}/{policy_id}`.
    pub async fn import(&self, id: &str, cancel: &CancellationToken) -> Outcome<RuleCollectionState> {
        let policy = match parse_import_id(id) {
            Ok(policy) => policy,
            Err(e) => return Outcome::new(None, e.into()),
        };
        let live = match self.list_live(&policy, cancel).await {
            Ok(live) => live,
            Err(e) => return Outcome::new(None, e.into()),
        };

        let mut managed: Vec<&PolicyRule> = live.iter().filter(|r| !r.system).collect();
        managed.sort_by_key(|r| r.priority);
        let rules = managed
            .into_iter()
            .map(|r| project_rule(r, r.priority.unwrap_or(i64::MAX)))
            .collect();
        Outcome::ok(RuleCollectionState::new(&policy, rules))
    }

    /// Delete every recorded rule. The system rule is never recorded, so it
    /// survives.
    pub async fn delete(&self, prior: &RuleCollectionState, cancel: &CancellationToken) -> Diagnostics {
        let policy = prior.policy();
        let mut diagnostics = Diagnostics::new();

        for rule in &prior.rules {
            if halt_if_cancelled(cancel, &mut diagnostics) {
                break;
            }
            let operation = format!("delete policy rule '{}' ({})", rule.name, rule.id);
            match self
                .harness
                .delete(cancel, &operation, || {
                    self.api.delete_policy_rule(&policy, &rule.id)
                })
                .await
            {
                Ok(true) => info!(rule = %rule.name, id = %rule.id, "Deleted rule"),
                Ok(false) => info!(rule = %rule.name, id = %rule.id, "Rule already deleted"),
                Err(e) => diagnostics.push_error(&e),
            }
        }
        diagnostics
    }
}

#[async_trait]
impl Resource for RuleCollectionReconciler {
    type Desired = DesiredCollection;
    type State = RuleCollectionState;
    type Plan = ReconciliationPlan;

    async fn plan(
        &self,
        desired: &DesiredCollection,
        prior: Option<&RuleCollectionState>,
        cancel: &CancellationToken,
    ) -> Outcome<ReconciliationPlan> {
        RuleCollectionReconciler::plan(self, desired, prior, cancel).await
    }

    async fn create(
        &self,
        desired: &DesiredCollection,
        cancel: &CancellationToken,
    ) -> Outcome<RuleCollectionState> {
        self.apply(desired, None, cancel).await
    }

    async fn read(
        &self,
        prior: &RuleCollectionState,
        cancel: &CancellationToken,
    ) -> Outcome<RuleCollectionState> {
        RuleCollectionReconciler::read(self, prior, cancel).await
    }

    async fn update(
        &self,
        desired: &DesiredCollection,
        prior: &RuleCollectionState,
        cancel: &CancellationToken,
    ) -> Outcome<RuleCollectionState> {
        self.apply(desired, Some(prior), cancel).await
    }

    async fn delete(&self, prior: &RuleCollectionState, cancel: &CancellationToken) -> Diagnostics {
        RuleCollectionReconciler::delete(self, prior, cancel).await
    }

    async fn import(&self, id: &str, cancel: &CancellationToken) -> Outcome<RuleCollectionState> {
        RuleCollectionReconciler::import(self, id, cancel).await
    }
}

impl PlanSummary for ReconciliationPlan {
    fn is_noop(&self) -> bool {
        self.is_empty()
    }

    fn changes(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .to_delete
            .iter()
            .map(|d| format!("- delete rule '{}' ({})", d.name, d.id))
            .collect();
        for step in &self.steps {
            match step {
                PlanStep::Create {
                    rule,
                    wire_priority,
                } => lines.push(format!(
                    "+ create rule '{}' at position {wire_priority}",
                    rule.name
                )),
                PlanStep::Update {
                    id, rule, reasons, ..
                } => {
                    let why: Vec<String> = reasons
                        .iter()
                        .map(|r| match r {
                            UpdateReason::Reorder { from, to } => {
                                format!("priority {} -> {to}", from.map_or("?".to_string(), |f| f.to_string()))
                            }
                            UpdateReason::Attribute { name } => name.clone(),
                        })
                        .collect();
                    lines.push(format!(
                        "~ update rule '{}' ({id}): {}",
                        rule.name,
                        why.join(", ")
                    ));
                }
                PlanStep::Unchanged { .. } => {}
            }
        }
        lines
    }
}

/// Parse `{authorization_server_id}/{policy_id}`.
pub fn parse_import_id(id: &str) -> ReconcileResult<PolicyRef> {
    match id.split('/').collect::<Vec<_>>().as_slice() {
        [server, policy] if !server.is_empty() && !policy.is_empty() => {
            Ok(PolicyRef::new(*server, *policy))
        }
        _ => Err(ReconcileError::validation(
            "id",
            format!("expected '<authorization_server_id>/<policy_id>', got '{id}'"),
        )),
    }
}

fn pre_validate(desired: &DesiredCollection) -> Option<Diagnostics> {
    let errors = validate_collection(desired);
    if errors.is_empty() {
        return None;
    }
    let mut diags = Diagnostics::new();
    for err in &errors {
        diags.push_error(err);
    }
    Some(diags)
}

fn halt_if_cancelled(cancel: &CancellationToken, diagnostics: &mut Diagnostics) -> bool {
    if cancel.is_cancelled() {
        warn!("Cancelled, halting plan");
        diagnostics.push_error(&ReconcileError::Cancelled { last_error: None });
        return true;
    }
    false
}

/// Point a conflict at the priority it collided on.
fn name_priority_conflict(err: ReconcileError, rule: &DesiredRule, wire_priority: i64) -> ReconcileError {
    match err {
        ReconcileError::TransientConflict { operation, message } => {
            ReconcileError::TransientConflict {
                operation,
                message: format!(
                    "priority {} (sent as {wire_priority}) for rule '{}' kept colliding: {message}",
                    rule.priority, rule.name
                ),
            }
        }
        other => other,
    }
}

/// Declared rules found live, projected in declared order.
fn declared_from_live(desired: &DesiredCollection, live: &[PolicyRule]) -> Vec<RuleState> {
    let declared: HashMap<&str, i64> = desired
        .rules
        .iter()
        .map(|r| (r.name.as_str(), r.priority))
        .collect();
    let rules = live
        .iter()
        .filter(|r| !r.system)
        .filter_map(|r| {
            declared
                .get(r.name.as_str())
                .map(|priority| project_rule(r, *priority))
        })
        .collect();
    arrange_in_declared_order(rules, &declared)
}

/// State built from API responses, used when the final re-read fails.
#[derive(Debug, Default)]
struct AppliedRules {
    rules: Vec<RuleState>,
}

impl AppliedRules {
    /// Prior records whose rule still exists live.
    fn seed(prior: Option<&RuleCollectionState>, live: &[PolicyRule]) -> Self {
        let rules = prior
            .map(|p| {
                p.rules
                    .iter()
                    .filter(|r| live.iter().any(|l| l.id.as_deref() == Some(r.id.as_str())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Self { rules }
    }

    fn remove_id(&mut self, id: &str) {
        self.rules.retain(|r| r.id != id);
    }

    fn record(&mut self, state: RuleState) {
        self.rules
            .retain(|r| r.name != state.name && r.id != state.id);
        self.rules.push(state);
    }

    fn into_state(self, desired: &DesiredCollection) -> Vec<RuleState> {
        let declared: HashMap<&str, i64> = desired
            .rules
            .iter()
            .map(|r| (r.name.as_str(), r.priority))
            .collect();
        let rules = self
            .rules
            .into_iter()
            .filter(|r| declared.contains_key(r.name.as_str()))
            .collect();
        arrange_in_declared_order(rules, &declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_id() {
        let policy = parse_import_id("aus1/pol1").unwrap();
        assert_eq!(policy.authorization_server_id, "aus1");
        assert_eq!(policy.policy_id, "pol1");
        assert!(parse_import_id("aus1").is_err());
        assert!(parse_import_id("aus1/").is_err());
        assert!(parse_import_id("a/b/c").is_err());
    }

    #[test]
    fn test_conflict_names_priority() {
        let rule = DesiredRule::new("r2", 20, &["password"]);
        let err = name_priority_conflict(
            ReconcileError::TransientConflict {
                operation: "create policy rule 'r2'".into(),
                message: "Conflict: priority".into(),
            },
            &rule,
            2,
        );
        let text = err.to_string();
        assert!(text.contains("priority 20"));
        assert!(text.contains("sent as 2"));
    }

    #[test]
    fn test_plan_summary_lines() {
        let plan = ReconciliationPlan {
            policy: PolicyRef::new("aus1", "pol1"),
            to_delete: vec![super::super::plan::PlannedDelete {
                id: "s2".into(),
                name: "r2".into(),
                server_priority: Some(2),
            }],
            steps: vec![PlanStep::Create {
                rule: DesiredRule::new("r4", 40, &["password"]),
                wire_priority: 3,
            }],
        };
        assert!(!plan.is_noop());
        assert_eq!(
            plan.changes(),
            vec![
                "- delete rule 'r2' (s2)".to_string(),
                "+ create rule 'r4' at position 3".to_string()
            ]
        );
    }
}
