//! In-memory Okta tenant implementing the client capability traits.
//!
//! Behaves like the real org where the reconciler depends on it: rule
//! priorities stay contiguous with the system rule last, rule status only
//! changes through activate/deactivate, lifecycle calls set
//! `transitioningToStatus` for a configurable number of reads, and deleting
//! an active user deactivates it instead. Every mutating call is recorded.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use oktaform_client::{
    CreateUserRequest, Group, GroupProfile, ListParams, OktaClientError, OktaClientResult, Page,
    PolicyRef, PolicyRule, PolicyRuleApi, Role, User, UserApi,
};

pub const AUTHZ_SERVER: &str = "aus1";
pub const POLICY: &str = "pol1";
pub const SYSTEM_RULE: &str = "Default Policy Rule";
pub const EVERYONE_GROUP_ID: &str = "00gEveryone";

#[derive(Default)]
struct Tenant {
    rules: Vec<PolicyRule>,
    users: BTreeMap<String, User>,
    passwords: BTreeSet<String>,
    roles: BTreeMap<String, Vec<Role>>,
    groups: BTreeMap<String, BTreeSet<String>>,
    /// Reads left before a pending transition settles, per user.
    pending: BTreeMap<String, usize>,
    next_id: u64,
}

impl Tenant {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    /// Renumber 1..n, keeping the system rule last.
    fn renumber(&mut self) {
        self.rules.sort_by_key(|r| (r.system, r.priority.unwrap_or(i64::MAX)));
        for (i, rule) in self.rules.iter_mut().enumerate() {
            rule.priority = Some(i as i64 + 1);
        }
    }

    /// Insert a non-system rule at `priority`, shifting the rules below it.
    fn insert_rule(&mut self, mut rule: PolicyRule) {
        let non_system = self.rules.iter().filter(|r| !r.system).count();
        let at = usize::try_from(rule.priority.unwrap_or(1).max(1) - 1)
            .unwrap_or(0)
            .min(non_system);
        rule.system = false;
        let mut ordered: Vec<PolicyRule> = self.rules.drain(..).collect();
        ordered.sort_by_key(|r| (r.system, r.priority.unwrap_or(i64::MAX)));
        ordered.insert(at, rule);
        for (i, r) in ordered.iter_mut().enumerate() {
            r.priority = Some(i as i64 + 1);
        }
        self.rules = ordered;
        self.renumber();
    }
}

/// Fake org with one authorization server policy.
pub struct FakeTenant {
    tenant: Mutex<Tenant>,
    calls: Mutex<Vec<String>>,
    page_size: AtomicUsize,
    create_conflicts: AtomicUsize,
    vanish_on_replace: AtomicBool,
    vanish_on_delete: AtomicBool,
    transition_reads: AtomicUsize,
    roles_forbidden: AtomicBool,
}

impl Default for FakeTenant {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTenant {
    /// A tenant whose policy holds only the system rule.
    pub fn new() -> Self {
        let fake = Self {
            tenant: Mutex::new(Tenant::default()),
            calls: Mutex::new(Vec::new()),
            page_size: AtomicUsize::new(usize::MAX),
            create_conflicts: AtomicUsize::new(0),
            vanish_on_replace: AtomicBool::new(false),
            vanish_on_delete: AtomicBool::new(false),
            transition_reads: AtomicUsize::new(0),
            roles_forbidden: AtomicBool::new(false),
        };
        fake.tenant.lock().unwrap().rules.push(PolicyRule {
            id: Some("0prSystem".into()),
            name: SYSTEM_RULE.into(),
            rule_type: "RESOURCE_ACCESS".into(),
            priority: Some(1),
            status: Some("ACTIVE".into()),
            system: true,
            ..Default::default()
        });
        fake
    }

    pub fn policy() -> PolicyRef {
        PolicyRef::new(AUTHZ_SERVER, POLICY)
    }

    /// Serve rule listings in pages of `size`.
    pub fn with_page_size(self, size: usize) -> Self {
        self.page_size.store(size, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` rule creates with 409.
    pub fn fail_next_creates(&self, n: usize) {
        self.create_conflicts.store(n, Ordering::SeqCst);
    }

    /// Make the next rule replace find its rule deleted by someone else.
    pub fn vanish_on_next_replace(&self) {
        self.vanish_on_replace.store(true, Ordering::SeqCst);
    }

    /// Make the next rule delete find its rule deleted by someone else.
    pub fn vanish_on_next_delete(&self) {
        self.vanish_on_delete.store(true, Ordering::SeqCst);
    }

    /// Keep `transitioningToStatus` set for `reads` reads after each
    /// lifecycle call.
    pub fn set_transition_reads(&self, reads: usize) {
        self.transition_reads.store(reads, Ordering::SeqCst);
    }

    pub fn forbid_role_reads(&self) {
        self.roles_forbidden.store(true, Ordering::SeqCst);
    }

    // ── Seeding and inspection ───────────────────────────────────────────

    /// Create a rule directly, as a prior run or another admin would.
    pub fn seed_rule(&self, id: &str, name: &str, grant_type: &str) {
        let mut tenant = self.tenant.lock().unwrap();
        let priority = tenant.rules.iter().filter(|r| !r.system).count() as i64 + 1;
        let mut rule = oktaform_core::DesiredRule::new(name, priority, &[grant_type]).to_wire(priority);
        rule.id = Some(id.into());
        tenant.insert_rule(rule);
    }

    /// Remove a rule behind the reconciler's back.
    pub fn remove_rule(&self, name: &str) {
        let mut tenant = self.tenant.lock().unwrap();
        tenant.rules.retain(|r| r.name != name);
        tenant.renumber();
    }

    /// Live rules in priority order, system rule included.
    pub fn rules(&self) -> Vec<PolicyRule> {
        self.tenant.lock().unwrap().rules.clone()
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules().into_iter().map(|r| r.name).collect()
    }

    pub fn seed_user(&self, status: &str, profile: Value) -> String {
        let mut tenant = self.tenant.lock().unwrap();
        let id = tenant.id("00u");
        let user: User = serde_json::from_value(json!({
            "id": id,
            "status": status,
            "profile": profile,
            "_links": { "self": { "href": format!("https://example.okta.com/api/v1/users/{id}") } }
        }))
        .unwrap();
        tenant.users.insert(id.clone(), user);
        tenant.passwords.insert(id.clone());
        id
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.tenant.lock().unwrap().users.get(id).cloned()
    }

    /// Edit a user's profile behind the reconciler's back.
    pub fn set_profile_attribute(&self, id: &str, key: &str, value: Value) {
        let mut tenant = self.tenant.lock().unwrap();
        if let Some(user) = tenant.users.get_mut(id) {
            user.profile.insert(key.into(), value);
        }
    }

    pub fn set_status(&self, id: &str, status: &str) {
        let mut tenant = self.tenant.lock().unwrap();
        if let Some(user) = tenant.users.get_mut(id) {
            user.status = Some(status.into());
        }
    }

    pub fn user_roles(&self, id: &str) -> Vec<String> {
        let tenant = self.tenant.lock().unwrap();
        tenant
            .roles
            .get(id)
            .map(|roles| roles.iter().map(|r| r.role_type.clone()).collect())
            .unwrap_or_default()
    }

    pub fn user_groups(&self, id: &str) -> BTreeSet<String> {
        let tenant = self.tenant.lock().unwrap();
        tenant.groups.get(id).cloned().unwrap_or_default()
    }

    /// Every mutating call so far, e.g. `create_rule r1` or `suspend 00u1`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_policy(policy: &PolicyRef) -> OktaClientResult<()> {
        if policy.authorization_server_id == AUTHZ_SERVER && policy.policy_id == POLICY {
            Ok(())
        } else {
            Err(OktaClientError::NotFound(format!("policy {policy}")))
        }
    }

    fn bad_request(summary: &str) -> OktaClientError {
        OktaClientError::Api {
            status: 400,
            error_code: "E0000001".into(),
            summary: summary.into(),
        }
    }

    /// Start a transition towards `target`.
    fn begin_transition(&self, tenant: &mut Tenant, id: &str, target: &str) {
        let reads = self.transition_reads.load(Ordering::SeqCst);
        let Some(user) = tenant.users.get_mut(id) else {
            return;
        };
        if reads == 0 {
            user.status = Some(target.into());
            user.transitioning_to_status = None;
        } else {
            user.transitioning_to_status = Some(target.into());
            tenant.pending.insert(id.to_string(), reads);
        }
    }

    fn lifecycle(&self, id: &str, verb: &str, allowed: &[&str], target: &str) -> OktaClientResult<()> {
        let mut tenant = self.tenant.lock().unwrap();
        let status = tenant
            .users
            .get(id)
            .ok_or_else(|| OktaClientError::NotFound(format!("user {id}")))?
            .status
            .clone()
            .unwrap_or_default();
        if !allowed.is_empty() && !allowed.contains(&status.as_str()) {
            return Err(Self::bad_request(&format!("cannot {verb} a {status} user")));
        }
        self.record(format!("{verb} {id}"));
        self.begin_transition(&mut tenant, id, target);
        Ok(())
    }

    fn find_user_id(tenant: &Tenant, id_or_login: &str) -> Option<String> {
        if tenant.users.contains_key(id_or_login) {
            return Some(id_or_login.to_string());
        }
        tenant
            .users
            .iter()
            .find(|(_, u)| u.profile_str("login") == Some(id_or_login))
            .map(|(id, _)| id.clone())
    }
}

#[async_trait]
impl PolicyRuleApi for FakeTenant {
    async fn list_policy_rules(
        &self,
        policy: &PolicyRef,
        params: &ListParams,
    ) -> OktaClientResult<Page<PolicyRule>> {
        Self::check_policy(policy)?;
        let rules = self.rules();
        let size = self
            .page_size
            .load(Ordering::SeqCst)
            .min(params.limit.map_or(usize::MAX, |l| l as usize));
        let start: usize = params
            .after
            .as_deref()
            .and_then(|a| a.parse().ok())
            .unwrap_or(0);
        let end = start.saturating_add(size).min(rules.len());
        let next_cursor = (end < rules.len()).then(|| end.to_string());
        Ok(Page {
            items: rules[start.min(end)..end].to_vec(),
            next_cursor,
        })
    }

    async fn get_policy_rule(&self, policy: &PolicyRef, rule_id: &str) -> OktaClientResult<PolicyRule> {
        Self::check_policy(policy)?;
        self.rules()
            .into_iter()
            .find(|r| r.id.as_deref() == Some(rule_id))
            .ok_or_else(|| OktaClientError::NotFound(format!("rule {rule_id}")))
    }

    async fn create_policy_rule(&self, policy: &PolicyRef, rule: &PolicyRule) -> OktaClientResult<PolicyRule> {
        Self::check_policy(policy)?;
        let conflicts = self.create_conflicts.load(Ordering::SeqCst);
        if conflicts > 0 {
            self.create_conflicts.store(conflicts - 1, Ordering::SeqCst);
            self.record(format!("create_rule {} (409)", rule.name));
            return Err(OktaClientError::Conflict(format!(
                "priority {} is being reassigned",
                rule.priority.unwrap_or_default()
            )));
        }

        let mut tenant = self.tenant.lock().unwrap();
        let id = tenant.id("0pr");
        let mut created = rule.clone();
        created.id = Some(id.clone());
        created.status = Some("ACTIVE".into());
        tenant.insert_rule(created);
        self.record(format!("create_rule {}", rule.name));
        tenant
            .rules
            .iter()
            .find(|r| r.id.as_deref() == Some(id.as_str()))
            .cloned()
            .ok_or_else(|| OktaClientError::NotFound(id))
    }

    async fn replace_policy_rule(
        &self,
        policy: &PolicyRef,
        rule_id: &str,
        rule: &PolicyRule,
    ) -> OktaClientResult<PolicyRule> {
        Self::check_policy(policy)?;
        let mut tenant = self.tenant.lock().unwrap();
        if self.vanish_on_replace.swap(false, Ordering::SeqCst) {
            tenant.rules.retain(|r| r.id.as_deref() != Some(rule_id));
            tenant.renumber();
            self.record(format!("replace_rule {} (404)", rule.name));
            return Err(OktaClientError::NotFound(format!("rule {rule_id}")));
        }
        let index = tenant
            .rules
            .iter()
            .position(|r| r.id.as_deref() == Some(rule_id))
            .ok_or_else(|| OktaClientError::NotFound(format!("rule {rule_id}")))?;
        if tenant.rules[index].system {
            return Err(Self::bad_request("the default rule cannot be modified"));
        }
        let previous = tenant.rules.remove(index);
        let mut replaced = rule.clone();
        replaced.id = Some(rule_id.to_string());
        replaced.status = previous.status;
        tenant.insert_rule(replaced);
        self.record(format!("replace_rule {}", rule.name));
        tenant
            .rules
            .iter()
            .find(|r| r.id.as_deref() == Some(rule_id))
            .cloned()
            .ok_or_else(|| OktaClientError::NotFound(rule_id.to_string()))
    }

    async fn delete_policy_rule(&self, policy: &PolicyRef, rule_id: &str) -> OktaClientResult<()> {
        Self::check_policy(policy)?;
        let mut tenant = self.tenant.lock().unwrap();
        let rule = tenant
            .rules
            .iter()
            .find(|r| r.id.as_deref() == Some(rule_id))
            .cloned()
            .ok_or_else(|| OktaClientError::NotFound(format!("rule {rule_id}")))?;
        if self.vanish_on_delete.swap(false, Ordering::SeqCst) {
            tenant.rules.retain(|r| r.id.as_deref() != Some(rule_id));
            tenant.renumber();
            self.record(format!("delete_rule {} (404)", rule.name));
            return Err(OktaClientError::NotFound(format!("rule {rule_id}")));
        }
        if rule.system {
            return Err(Self::bad_request("the default rule cannot be deleted"));
        }
        tenant.rules.retain(|r| r.id.as_deref() != Some(rule_id));
        tenant.renumber();
        self.record(format!("delete_rule {}", rule.name));
        Ok(())
    }

    async fn activate_policy_rule(&self, policy: &PolicyRef, rule_id: &str) -> OktaClientResult<()> {
        self.set_rule_status(policy, rule_id, "ACTIVE")
    }

    async fn deactivate_policy_rule(&self, policy: &PolicyRef, rule_id: &str) -> OktaClientResult<()> {
        self.set_rule_status(policy, rule_id, "INACTIVE")
    }
}

impl FakeTenant {
    fn set_rule_status(&self, policy: &PolicyRef, rule_id: &str, status: &str) -> OktaClientResult<()> {
        Self::check_policy(policy)?;
        let mut tenant = self.tenant.lock().unwrap();
        let rule = tenant
            .rules
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(rule_id))
            .ok_or_else(|| OktaClientError::NotFound(format!("rule {rule_id}")))?;
        rule.status = Some(status.into());
        let name = rule.name.clone();
        self.record(format!("set_rule_status {name} {status}"));
        Ok(())
    }
}

#[async_trait]
impl UserApi for FakeTenant {
    async fn list_users(&self, params: &ListParams) -> OktaClientResult<Page<User>> {
        let tenant = self.tenant.lock().unwrap();
        let email = params
            .search
            .as_deref()
            .and_then(|s| s.strip_prefix("profile.email eq \""))
            .and_then(|s| s.strip_suffix('"'));
        let items = tenant
            .users
            .values()
            .filter(|u| email.map_or(true, |e| u.profile_str("email") == Some(e)))
            .cloned()
            .collect();
        Ok(Page::last(items))
    }

    async fn get_user(&self, id_or_login: &str) -> OktaClientResult<User> {
        let mut tenant = self.tenant.lock().unwrap();
        let id = Self::find_user_id(&tenant, id_or_login)
            .ok_or_else(|| OktaClientError::NotFound(format!("user {id_or_login}")))?;

        match tenant.pending.get(&id).copied() {
            Some(0) => {
                tenant.pending.remove(&id);
                if let Some(user) = tenant.users.get_mut(&id) {
                    user.status = user.transitioning_to_status.take();
                }
            }
            Some(n) if n != usize::MAX => {
                tenant.pending.insert(id.clone(), n - 1);
            }
            _ => {}
        }
        tenant
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| OktaClientError::NotFound(format!("user {id}")))
    }

    async fn create_user(&self, body: &CreateUserRequest, activate: bool) -> OktaClientResult<User> {
        let mut tenant = self.tenant.lock().unwrap();
        let login = body.profile.get("login").and_then(Value::as_str).unwrap_or_default();
        if Self::find_user_id(&tenant, login).is_some() {
            return Err(Self::bad_request("login: An object with this field already exists"));
        }

        let id = tenant.id("00u");
        let has_password = body
            .credentials
            .as_ref()
            .and_then(|c| c.password.as_ref())
            .is_some();
        let status = match (activate, has_password) {
            (false, _) => "STAGED",
            (true, true) => "ACTIVE",
            (true, false) => "PROVISIONED",
        };
        let question = body
            .credentials
            .as_ref()
            .and_then(|c| c.recovery_question.as_ref())
            .and_then(|q| q.question.clone());

        let mut user: User = serde_json::from_value(json!({
            "id": id,
            "status": status,
            "profile": Value::Object(body.profile.clone()),
            "created": "2024-05-01T10:00:00.000Z",
            "_links": { "self": { "href": format!("https://example.okta.com/api/v1/users/{id}") } }
        }))
        .unwrap();
        if let Some(question) = question {
            user.credentials = serde_json::from_value(json!({
                "password": {},
                "recovery_question": { "question": question }
            }))
            .ok();
        }

        if has_password {
            tenant.passwords.insert(id.clone());
        }
        tenant
            .groups
            .insert(id.clone(), body.group_ids.iter().cloned().collect());
        tenant.users.insert(id.clone(), user.clone());
        self.record(format!("create_user {login} activate={activate}"));
        Ok(user)
    }

    async fn update_user(&self, user_id: &str, body: &CreateUserRequest) -> OktaClientResult<User> {
        let mut tenant = self.tenant.lock().unwrap();
        let has_password = body
            .credentials
            .as_ref()
            .and_then(|c| c.password.as_ref())
            .is_some();
        let user = tenant
            .users
            .get_mut(user_id)
            .ok_or_else(|| OktaClientError::NotFound(format!("user {user_id}")))?;
        if user.status.as_deref() == Some("DEPROVISIONED") {
            return Err(Self::bad_request("cannot update a deprovisioned user"));
        }
        for (key, value) in &body.profile {
            user.profile.insert(key.clone(), value.clone());
        }
        let updated = user.clone();
        let mut keys: Vec<&String> = body.profile.keys().collect();
        keys.sort();
        if has_password {
            tenant.passwords.insert(user_id.to_string());
            self.record(format!("set_password {user_id}"));
        }
        if !keys.is_empty() {
            let keys: Vec<String> = keys.into_iter().cloned().collect();
            self.record(format!("update_profile {user_id} {}", keys.join(",")));
        }
        Ok(updated)
    }

    async fn delete_user(&self, user_id: &str) -> OktaClientResult<()> {
        let status = self
            .user(user_id)
            .ok_or_else(|| OktaClientError::NotFound(format!("user {user_id}")))?
            .status;
        if status.as_deref() == Some("DEPROVISIONED") {
            let mut tenant = self.tenant.lock().unwrap();
            tenant.users.remove(user_id);
            tenant.roles.remove(user_id);
            tenant.groups.remove(user_id);
            self.record(format!("delete_user {user_id}"));
            Ok(())
        } else {
            self.lifecycle(user_id, "deactivate", &[], "DEPROVISIONED")
        }
    }

    async fn activate_user(&self, user_id: &str, _send_email: bool) -> OktaClientResult<()> {
        let target = if self.tenant.lock().unwrap().passwords.contains(user_id) {
            "ACTIVE"
        } else {
            "PROVISIONED"
        };
        self.lifecycle(user_id, "activate", &["STAGED", "DEPROVISIONED"], target)
    }

    async fn deactivate_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.lifecycle(
            user_id,
            "deactivate",
            &["STAGED", "PROVISIONED", "ACTIVE", "RECOVERY", "LOCKED_OUT", "PASSWORD_EXPIRED", "SUSPENDED"],
            "DEPROVISIONED",
        )
    }

    async fn suspend_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.lifecycle(user_id, "suspend", &["ACTIVE", "PASSWORD_EXPIRED", "RECOVERY"], "SUSPENDED")
    }

    async fn unsuspend_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.lifecycle(user_id, "unsuspend", &["SUSPENDED"], "ACTIVE")
    }

    async fn unlock_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.lifecycle(user_id, "unlock", &["LOCKED_OUT"], "ACTIVE")
    }

    async fn expire_password(&self, user_id: &str) -> OktaClientResult<()> {
        let mut tenant = self.tenant.lock().unwrap();
        let user = tenant
            .users
            .get_mut(user_id)
            .ok_or_else(|| OktaClientError::NotFound(format!("user {user_id}")))?;
        user.status = Some("PASSWORD_EXPIRED".into());
        self.record(format!("expire_password {user_id}"));
        Ok(())
    }

    async fn change_password(&self, user_id: &str, _old: &str, _new: &str) -> OktaClientResult<()> {
        if self.user(user_id).is_none() {
            return Err(OktaClientError::NotFound(format!("user {user_id}")));
        }
        self.record(format!("change_password {user_id}"));
        Ok(())
    }

    async fn change_recovery_question(
        &self,
        user_id: &str,
        _password: &str,
        question: &str,
        _answer: &str,
    ) -> OktaClientResult<()> {
        let mut tenant = self.tenant.lock().unwrap();
        let user = tenant
            .users
            .get_mut(user_id)
            .ok_or_else(|| OktaClientError::NotFound(format!("user {user_id}")))?;
        user.credentials = serde_json::from_value(json!({
            "password": {},
            "recovery_question": { "question": question }
        }))
        .ok();
        self.record(format!("change_recovery_question {user_id}"));
        Ok(())
    }

    async fn list_assigned_roles(&self, user_id: &str) -> OktaClientResult<Vec<Role>> {
        if self.roles_forbidden.load(Ordering::SeqCst) {
            return Err(OktaClientError::Forbidden(
                "You do not have permission to perform the requested action".into(),
            ));
        }
        let tenant = self.tenant.lock().unwrap();
        if !tenant.users.contains_key(user_id) {
            return Err(OktaClientError::NotFound(format!("user {user_id}")));
        }
        Ok(tenant.roles.get(user_id).cloned().unwrap_or_default())
    }

    async fn assign_role(&self, user_id: &str, role_type: &str, disable_notifications: bool) -> OktaClientResult<Role> {
        let mut tenant = self.tenant.lock().unwrap();
        if !tenant.users.contains_key(user_id) {
            return Err(OktaClientError::NotFound(format!("user {user_id}")));
        }
        let role = Role {
            id: tenant.id("ra"),
            role_type: role_type.to_string(),
            label: None,
            status: Some("ACTIVE".into()),
            assignment_type: Some("USER".into()),
        };
        tenant.roles.entry(user_id.to_string()).or_default().push(role.clone());
        self.record(format!(
            "assign_role {user_id} {role_type} notify={}",
            !disable_notifications
        ));
        Ok(role)
    }

    async fn remove_role(&self, user_id: &str, role_assignment_id: &str) -> OktaClientResult<()> {
        let mut tenant = self.tenant.lock().unwrap();
        let roles = tenant.roles.entry(user_id.to_string()).or_default();
        let before = roles.len();
        roles.retain(|r| r.id != role_assignment_id);
        if roles.len() == before {
            return Err(OktaClientError::NotFound(format!("role {role_assignment_id}")));
        }
        self.record(format!("remove_role {user_id} {role_assignment_id}"));
        Ok(())
    }

    async fn list_user_groups(&self, user_id: &str) -> OktaClientResult<Vec<Group>> {
        let tenant = self.tenant.lock().unwrap();
        if !tenant.users.contains_key(user_id) {
            return Err(OktaClientError::NotFound(format!("user {user_id}")));
        }
        let mut groups = vec![Group {
            id: EVERYONE_GROUP_ID.into(),
            group_type: "BUILT_IN".into(),
            profile: GroupProfile {
                name: "Everyone".into(),
                description: None,
            },
        }];
        groups.extend(
            tenant
                .groups
                .get(user_id)
                .into_iter()
                .flatten()
                .map(|id| Group {
                    id: id.clone(),
                    group_type: "OKTA_GROUP".into(),
                    profile: GroupProfile::default(),
                }),
        );
        Ok(groups)
    }

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> OktaClientResult<()> {
        let mut tenant = self.tenant.lock().unwrap();
        tenant
            .groups
            .entry(user_id.to_string())
            .or_default()
            .insert(group_id.to_string());
        self.record(format!("add_to_group {user_id} {group_id}"));
        Ok(())
    }

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str) -> OktaClientResult<()> {
        let mut tenant = self.tenant.lock().unwrap();
        let removed = tenant
            .groups
            .get_mut(user_id)
            .is_some_and(|groups| groups.remove(group_id));
        if !removed {
            return Err(OktaClientError::NotFound(format!("group {group_id}")));
        }
        self.record(format!("remove_from_group {user_id} {group_id}"));
        Ok(())
    }
}

/// Base profile of a seeded user.
pub fn profile(login: &str, first: &str, last: &str) -> Value {
    let mut map = Map::new();
    map.insert("login".into(), json!(login));
    map.insert("email".into(), json!(login));
    map.insert("firstName".into(), json!(first));
    map.insert("lastName".into(), json!(last));
    Value::Object(map)
}
