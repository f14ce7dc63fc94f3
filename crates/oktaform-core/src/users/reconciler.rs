//! User reconciler: profile, credentials, admin roles, group memberships and
//! lifecycle status of one user.
//!
//! Update order is fixed: profile, password, recovery question, roles,
//! groups, then the status transition. Interlocks are checked against the
//! observed status before the first mutation, so a rejected update leaves
//! the user untouched.

use async_trait::async_trait;
use oktaform_client::{
    CreateUserRequest, ListParams, PasswordValue, RecoveryQuestion, User, UserApi,
    UserCredentials,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::lifecycle::StatusReconciler;
use super::model::{DesiredUser, UserPlan, UserState};
use super::status::{select_transitions, UserStatus};
use crate::cancel::{interruptible_sleep, CancellationToken};
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{ReconcileError, ReconcileResult};
use crate::projector::{fingerprint, okta_profile_key, project_user};
use crate::resource::{Outcome, PlanSummary, Resource};
use crate::retry::{RetryHarness, RetryPolicy};
use crate::value::{canonical_json, parse_custom_json, CustomAttributes, REDACTED};

/// Role assignments inherited through a group; never managed per user.
const GROUP_ASSIGNMENT: &str = "GROUP";

#[derive(Clone)]
pub struct UserReconciler {
    api: Arc<dyn UserApi>,
    harness: RetryHarness,
    lifecycle: StatusReconciler,
}

impl std::fmt::Debug for UserReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserReconciler")
            .field("harness", &self.harness)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl UserReconciler {
    #[must_use]
    pub fn new(api: Arc<dyn UserApi>, config: &CoreConfig, clock: Arc<dyn Clock>) -> Self {
        let harness = RetryHarness::new(RetryPolicy::from_config(config), clock);
        let lifecycle = StatusReconciler::new(
            Arc::clone(&api),
            harness.clone(),
            config.status_transition_deadline(),
            config.status_poll_interval(),
        );
        Self {
            api,
            harness,
            lifecycle,
        }
    }

    #[must_use]
    pub fn lifecycle(&self) -> &StatusReconciler {
        &self.lifecycle
    }

    // ── Plan ─────────────────────────────────────────────────────────────

    pub async fn plan(
        &self,
        desired: &DesiredUser,
        prior: Option<&UserState>,
        cancel: &CancellationToken,
    ) -> Outcome<UserPlan> {
        if let Some(diags) = pre_validate(desired) {
            return Outcome::new(None, diags);
        }
        let Some(prior) = prior else {
            return Outcome::ok(creation_plan(desired));
        };

        let mut diagnostics = Diagnostics::new();
        let user = match self.fetch(&prior.id, cancel).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                diagnostics.push_warning(
                    "User no longer exists",
                    format!("user {} was deleted outside of oktaform and will be re-created", prior.id),
                );
                return Outcome::new(Some(creation_plan(desired)), diagnostics);
            }
            Err(e) => return Outcome::new(None, e.into()),
        };

        let carry = carry_from(desired, Some(prior));
        let state = match self
            .observe_user(&user, &carry, desired, cancel, &mut diagnostics)
            .await
        {
            Ok(state) => state,
            Err(e) => {
                diagnostics.push_error(&e);
                return Outcome::new(None, diagnostics);
            }
        };

        warn_if_awaiting_activation(desired, &state, &mut diagnostics);
        match diff(desired, &state) {
            Ok(plan) => {
                for err in interlocks(desired, &plan, state.status) {
                    diagnostics.push_error(&err);
                }
                Outcome::new(Some(plan), diagnostics)
            }
            Err(e) => {
                diagnostics.push_error(&e);
                Outcome::new(None, diagnostics)
            }
        }
    }

    // ── Create ───────────────────────────────────────────────────────────

    pub async fn create(&self, desired: &DesiredUser, cancel: &CancellationToken) -> Outcome<UserState> {
        if let Some(diags) = pre_validate(desired) {
            return Outcome::new(None, diags);
        }

        let body = match creation_body(desired) {
            Ok(body) => body,
            Err(e) => return Outcome::new(None, e.into()),
        };
        let activate = matches!(desired.status, UserStatus::Active | UserStatus::Suspended);
        let operation = format!("create user {}", desired.login);
        let created = match self
            .harness
            .mutate(cancel, &operation, || self.api.create_user(&body, activate))
            .await
        {
            Ok(user) => user,
            Err(e) => return Outcome::new(None, e.into()),
        };

        let mut carry = carry_from(desired, None);
        let mut diagnostics = Diagnostics::new();
        let mut state = match project_user(&created, Some(&carry)) {
            Ok(state) => state,
            Err(e) => return Outcome::new(None, e.into()),
        };
        let id = state.id.clone();
        info!(user_id = %id, login = %desired.login, status = %state.status, "Created user");

        if let Some(pw) = &desired.password {
            carry.password_fingerprint = Some(fingerprint(&id, pw.expose()));
        }
        if let Some(answer) = &desired.recovery_answer {
            carry.recovery_answer_fingerprint = Some(fingerprint(&id, answer.expose()));
        }
        state.password_fingerprint = carry.password_fingerprint.clone();
        state.recovery_answer_fingerprint = carry.recovery_answer_fingerprint.clone();
        if let Some(groups) = &desired.group_memberships {
            state.group_memberships = groups.clone();
        }

        if let Err(e) = self
            .after_create(desired, &mut state, cancel)
            .await
        {
            diagnostics.push_error(&e);
            return Outcome::new(Some(state), diagnostics);
        }

        carry.admin_roles = state.admin_roles.clone();
        carry.group_memberships = state.group_memberships.clone();
        match self.observe(&id, &carry, desired, cancel, &mut diagnostics).await {
            Ok(observed) => state = observed,
            Err(e) => diagnostics.push_warning(
                "Could not re-read user after create",
                format!("{e}; returning the state built from API responses"),
            ),
        }

        warn_if_awaiting_activation(desired, &state, &mut diagnostics);
        Outcome::new(Some(state), diagnostics)
    }

    async fn after_create(
        &self,
        desired: &DesiredUser,
        state: &mut UserState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let id = state.id.clone();

        if desired.expire_password_on_create {
            let operation = format!("expire password of user {id}");
            self.harness
                .mutate(cancel, &operation, || self.api.expire_password(&id))
                .await?;
            debug!(user_id = %id, "Expired password after create");
        }

        if matches!(desired.status, UserStatus::Suspended | UserStatus::Deprovisioned) {
            if let Some(user) = self
                .lifecycle
                .transition(&id, state.status, desired.status, cancel)
                .await?
            {
                refresh_from(state, &user)?;
            }
        }

        if let Some(roles) = &desired.admin_roles {
            for role in roles {
                self.assign_role(&id, &role.role_type, role.disable_notifications, cancel)
                    .await?;
                state.admin_roles.push(role.role_type.clone());
                state.admin_roles.sort();
            }
        }
        Ok(())
    }

    // ── Read ─────────────────────────────────────────────────────────────

    /// Refresh `prior`. A deleted user reads as `None` with no error.
    pub async fn read(&self, prior: &UserState, cancel: &CancellationToken) -> Outcome<UserState> {
        if prior.delay_read_seconds > 0 {
            let delay = Duration::from_secs(prior.delay_read_seconds);
            debug!(user_id = %prior.id, delay_secs = prior.delay_read_seconds, "Delaying read");
            if !interruptible_sleep(self.harness.clock().as_ref(), cancel, delay).await {
                return Outcome::new(
                    Some(prior.clone()),
                    ReconcileError::Cancelled { last_error: None }.into(),
                );
            }
        }

        let user = match self.fetch(&prior.id, cancel).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                warn!(user_id = %prior.id, "User no longer exists, dropping it from state");
                return Outcome::new(None, Diagnostics::new());
            }
            Err(e) => return Outcome::new(Some(prior.clone()), e.into()),
        };

        let mut diagnostics = Diagnostics::new();
        match self
            .observe_memberships(&user, prior, false, false, cancel, &mut diagnostics)
            .await
        {
            Ok(state) => Outcome::new(Some(state), diagnostics),
            Err(e) => {
                diagnostics.push_error(&e);
                Outcome::new(Some(prior.clone()), diagnostics)
            }
        }
    }

    // ── Update ───────────────────────────────────────────────────────────

    pub async fn update(
        &self,
        desired: &DesiredUser,
        prior: &UserState,
        cancel: &CancellationToken,
    ) -> Outcome<UserState> {
        if let Some(diags) = pre_validate(desired) {
            return Outcome::new(Some(prior.clone()), diags);
        }

        let mut diagnostics = Diagnostics::new();
        let carry = carry_from(desired, Some(prior));

        // A transition still in flight must settle before anything else.
        let user = match self.lifecycle.drain(&prior.id, cancel).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                warn!(
                    user_id = %prior.id,
                    login = %desired.login,
                    "User deleted outside of oktaform, re-creating"
                );
                return self.create(desired, cancel).await;
            }
            Err(e) => return Outcome::new(Some(prior.clone()), e.into()),
        };
        let mut state = match self
            .observe_user(&user, &carry, desired, cancel, &mut diagnostics)
            .await
        {
            Ok(state) => state,
            Err(e) => {
                diagnostics.push_error(&e);
                return Outcome::new(Some(prior.clone()), diagnostics);
            }
        };

        let plan = match diff(desired, &state) {
            Ok(plan) => plan,
            Err(e) => {
                diagnostics.push_error(&e);
                return Outcome::new(Some(state), diagnostics);
            }
        };
        let blocked = interlocks(desired, &plan, state.status);
        if !blocked.is_empty() {
            for err in &blocked {
                diagnostics.push_error(err);
            }
            return Outcome::new(Some(state), diagnostics);
        }

        if let Err(e) = self.apply_plan(desired, &plan, &mut state, cancel).await {
            diagnostics.push_error(&e);
            return Outcome::new(Some(state), diagnostics);
        }

        let id = state.id.clone();
        match self.observe(&id, &state.clone(), desired, cancel, &mut diagnostics).await {
            Ok(observed) => state = observed,
            Err(e) => diagnostics.push_warning(
                "Could not re-read user after update",
                format!("{e}; returning the state built from API responses"),
            ),
        }
        warn_if_awaiting_activation(desired, &state, &mut diagnostics);
        Outcome::new(Some(state), diagnostics)
    }

    async fn apply_plan(
        &self,
        desired: &DesiredUser,
        plan: &UserPlan,
        state: &mut UserState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let id = state.id.clone();

        if plan.changes_profile() {
            let body = profile_update_body(desired, plan)?;
            let operation = format!("update profile of user {id}");
            let user = self
                .harness
                .mutate(cancel, &operation, || self.api.update_user(&id, &body))
                .await?;
            info!(
                user_id = %id,
                attributes = plan.profile_changes.len() + plan.custom_changes.len(),
                "Updated profile"
            );
            refresh_from(state, &user)?;
        }

        if plan.password_change {
            if let Some(new) = &desired.password {
                self.change_password(&id, desired, new.expose(), cancel)
                    .await?;
                state.password = Some(REDACTED.to_string());
                state.password_fingerprint = Some(fingerprint(&id, new.expose()));
            }
        }

        if plan.recovery_question_change {
            if let (Some(password), Some(question), Some(answer)) = (
                &desired.password,
                &desired.recovery_question,
                &desired.recovery_answer,
            ) {
                let operation = format!("change recovery question of user {id}");
                self.harness
                    .mutate(cancel, &operation, || {
                        self.api.change_recovery_question(
                            &id,
                            password.expose(),
                            question,
                            answer.expose(),
                        )
                    })
                    .await?;
                info!(user_id = %id, "Changed recovery question");
                state.recovery_question = Some(question.clone());
                state.recovery_answer = Some(REDACTED.to_string());
                state.recovery_answer_fingerprint = Some(fingerprint(&id, answer.expose()));
            }
        }

        self.sync_roles(desired, plan, state, cancel).await?;
        self.sync_groups(plan, state, cancel).await?;

        if !plan.transitions.is_empty() {
            if let Some(user) = self.lifecycle.run(&id, &plan.transitions, cancel).await? {
                refresh_from(state, &user)?;
            }
        }
        Ok(())
    }

    async fn change_password(
        &self,
        id: &str,
        desired: &DesiredUser,
        new: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let operation = format!("change password of user {id}");
        match &desired.old_password {
            Some(old) => {
                self.harness
                    .mutate(cancel, &operation, || {
                        self.api.change_password(id, old.expose(), new)
                    })
                    .await?;
            }
            None => {
                let body = CreateUserRequest {
                    profile: Map::new(),
                    credentials: Some(UserCredentials {
                        password: Some(PasswordValue::new(new)),
                        ..Default::default()
                    }),
                    group_ids: Vec::new(),
                };
                self.harness
                    .mutate(cancel, &operation, || self.api.update_user(id, &body))
                    .await?;
            }
        }
        info!(user_id = %id, via_old_password = desired.old_password.is_some(), "Changed password");
        Ok(())
    }

    async fn assign_role(
        &self,
        id: &str,
        role_type: &str,
        disable_notifications: bool,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let operation = format!("assign role {role_type} to user {id}");
        self.harness
            .mutate(cancel, &operation, || {
                self.api.assign_role(id, role_type, disable_notifications)
            })
            .await?;
        info!(user_id = %id, role_type, "Assigned admin role");
        Ok(())
    }

    async fn sync_roles(
        &self,
        desired: &DesiredUser,
        plan: &UserPlan,
        state: &mut UserState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let id = state.id.clone();

        for role_type in &plan.roles_to_add {
            let disable = desired
                .admin_roles
                .iter()
                .flatten()
                .find(|r| &r.role_type == role_type)
                .is_some_and(|r| r.disable_notifications);
            self.assign_role(&id, role_type, disable, cancel).await?;
            state.admin_roles.push(role_type.clone());
        }

        if !plan.roles_to_remove.is_empty() {
            let operation = format!("list roles of user {id}");
            let assigned = self
                .harness
                .read(cancel, &operation, || self.api.list_assigned_roles(&id))
                .await?;
            for role_type in &plan.roles_to_remove {
                let Some(role) = assigned.iter().find(|r| {
                    &r.role_type == role_type
                        && r.assignment_type.as_deref() != Some(GROUP_ASSIGNMENT)
                }) else {
                    continue;
                };
                let operation = format!("remove role {role_type} from user {id}");
                if self
                    .harness
                    .delete(cancel, &operation, || self.api.remove_role(&id, &role.id))
                    .await?
                {
                    info!(user_id = %id, role_type = %role_type, "Removed admin role");
                } else {
                    // Deleted concurrently or a stale assignment ID; the
                    // two cases can't be told apart.
                    warn!(user_id = %id, role_type = %role_type, "Role assignment already gone");
                }
                state.admin_roles.retain(|r| r != role_type);
            }
        }

        state.admin_roles.sort();
        state.admin_roles.dedup();
        Ok(())
    }

    async fn sync_groups(
        &self,
        plan: &UserPlan,
        state: &mut UserState,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let id = state.id.clone();

        for group_id in &plan.groups_to_add {
            let operation = format!("add user {id} to group {group_id}");
            self.harness
                .mutate(cancel, &operation, || self.api.add_user_to_group(group_id, &id))
                .await?;
            info!(user_id = %id, %group_id, "Added group membership");
            state.group_memberships.insert(group_id.clone());
        }

        for group_id in &plan.groups_to_remove {
            let operation = format!("remove user {id} from group {group_id}");
            if !self
                .harness
                .delete(cancel, &operation, || {
                    self.api.remove_user_from_group(group_id, &id)
                })
                .await?
            {
                warn!(user_id = %id, %group_id, "Group membership already gone");
            }
            state.group_memberships.remove(group_id);
        }
        Ok(())
    }

    // ── Delete ───────────────────────────────────────────────────────────

    /// Deactivate when needed, then delete. A user already gone at any step
    /// counts as deleted.
    pub async fn delete(&self, prior: &UserState, cancel: &CancellationToken) -> Diagnostics {
        match self.delete_user(&prior.id, cancel).await {
            Ok(()) => Diagnostics::new(),
            Err(e) => e.into(),
        }
    }

    async fn delete_user(&self, id: &str, cancel: &CancellationToken) -> ReconcileResult<()> {
        let user = match self.fetch(id, cancel).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                info!(user_id = id, "User already deleted");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if user.status.as_deref() != Some(UserStatus::Deprovisioned.as_str()) {
            let operation = format!("deactivate user {id}");
            let existed = self
                .harness
                .delete(cancel, &operation, || self.api.deactivate_user(id))
                .await?;
            if !existed {
                return Ok(());
            }
            match self.lifecycle.drain(id, cancel).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            }
        }

        let operation = format!("delete user {id}");
        self.harness
            .delete(cancel, &operation, || self.api.delete_user(id))
            .await?;
        info!(user_id = id, "Deleted user");
        Ok(())
    }

    // ── Import ───────────────────────────────────────────────────────────

    /// Import by user ID, login or primary email.
    pub async fn import(&self, id: &str, cancel: &CancellationToken) -> Outcome<UserState> {
        let user = match self.fetch(id, cancel).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() && id.contains('@') => {
                match self.find_by_email(id, cancel).await {
                    Ok(user) => user,
                    Err(e) => return Outcome::new(None, e.into()),
                }
            }
            Err(e) => return Outcome::new(None, e.into()),
        };

        let mut diagnostics = Diagnostics::new();
        match self
            .observe_memberships(&user, &UserState::default(), false, false, cancel, &mut diagnostics)
            .await
        {
            Ok(state) => Outcome::new(Some(state), diagnostics),
            Err(e) => {
                diagnostics.push_error(&e);
                Outcome::new(None, diagnostics)
            }
        }
    }

    async fn find_by_email(&self, email: &str, cancel: &CancellationToken) -> ReconcileResult<User> {
        let mut params = ListParams::with_limit(2);
        params.search = Some(format!("profile.email eq \"{email}\""));
        let operation = format!("search users by email {email}");
        let page = self
            .harness
            .read(cancel, &operation, || self.api.list_users(&params))
            .await?;

        match page.items.as_slice() {
            [user] => Ok(user.clone()),
            [] => Err(ReconcileError::NotFound {
                operation,
                message: "no user has this ID, login or email".to_string(),
            }),
            _ => Err(ReconcileError::validation(
                "id",
                format!("more than one user has email {email}; import by ID instead"),
            )),
        }
    }

    // ── Observation ──────────────────────────────────────────────────────

    async fn fetch(&self, id: &str, cancel: &CancellationToken) -> ReconcileResult<User> {
        let operation = format!("get user {id}");
        self.harness
            .read(cancel, &operation, || self.api.get_user(id))
            .await
    }

    async fn observe(
        &self,
        id: &str,
        carry: &UserState,
        desired: &DesiredUser,
        cancel: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> ReconcileResult<UserState> {
        let user = self.fetch(id, cancel).await?;
        self.observe_user(&user, carry, desired, cancel, diagnostics)
            .await
    }

    /// Project `user` with its roles and groups. Memberships the declaration
    /// manages must be readable; the others degrade to a warning.
    async fn observe_user(
        &self,
        user: &User,
        carry: &UserState,
        desired: &DesiredUser,
        cancel: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> ReconcileResult<UserState> {
        self.observe_memberships(
            user,
            carry,
            desired.admin_roles.is_some(),
            desired.group_memberships.is_some(),
            cancel,
            diagnostics,
        )
        .await
    }

    async fn observe_memberships(
        &self,
        user: &User,
        carry: &UserState,
        roles_required: bool,
        groups_required: bool,
        cancel: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> ReconcileResult<UserState> {
        let mut state = project_user(user, Some(carry))?;
        let id = state.id.clone();

        let operation = format!("list roles of user {id}");
        match self
            .harness
            .read(cancel, &operation, || self.api.list_assigned_roles(&id))
            .await
        {
            Ok(roles) => {
                let mut types: Vec<String> = roles
                    .into_iter()
                    .filter(|r| r.assignment_type.as_deref() != Some(GROUP_ASSIGNMENT))
                    .map(|r| r.role_type)
                    .collect();
                types.sort();
                types.dedup();
                state.admin_roles = types;
            }
            Err(e) if e.is_permission_denied() && !roles_required => {
                diagnostics.push_warning("Could not read admin roles", e.to_string());
                state.admin_roles = Vec::new();
            }
            Err(e) => return Err(e),
        }

        let operation = format!("list groups of user {id}");
        match self
            .harness
            .read(cancel, &operation, || self.api.list_user_groups(&id))
            .await
        {
            Ok(groups) => {
                state.group_memberships = groups
                    .into_iter()
                    .filter(|g| !g.is_built_in())
                    .map(|g| g.id)
                    .collect();
            }
            Err(e) if e.is_permission_denied() && !groups_required => {
                diagnostics.push_warning("Could not read group memberships", e.to_string());
                state.group_memberships = BTreeSet::new();
            }
            Err(e) => return Err(e),
        }

        Ok(state)
    }
}

#[async_trait]
impl Resource for UserReconciler {
    type Desired = DesiredUser;
    type State = UserState;
    type Plan = UserPlan;

    async fn plan(
        &self,
        desired: &DesiredUser,
        prior: Option<&UserState>,
        cancel: &CancellationToken,
    ) -> Outcome<UserPlan> {
        UserReconciler::plan(self, desired, prior, cancel).await
    }

    async fn create(&self, desired: &DesiredUser, cancel: &CancellationToken) -> Outcome<UserState> {
        UserReconciler::create(self, desired, cancel).await
    }

    async fn read(&self, prior: &UserState, cancel: &CancellationToken) -> Outcome<UserState> {
        UserReconciler::read(self, prior, cancel).await
    }

    async fn update(
        &self,
        desired: &DesiredUser,
        prior: &UserState,
        cancel: &CancellationToken,
    ) -> Outcome<UserState> {
        UserReconciler::update(self, desired, prior, cancel).await
    }

    async fn delete(&self, prior: &UserState, cancel: &CancellationToken) -> Diagnostics {
        UserReconciler::delete(self, prior, cancel).await
    }

    async fn import(&self, id: &str, cancel: &CancellationToken) -> Outcome<UserState> {
        UserReconciler::import(self, id, cancel).await
    }
}

impl PlanSummary for UserPlan {
    fn is_noop(&self) -> bool {
        !self.create
            && self.transitions.is_empty()
            && !self.changes_profile()
            && !self.password_change
            && !self.recovery_question_change
            && self.roles_to_add.is_empty()
            && self.roles_to_remove.is_empty()
            && self.groups_to_add.is_empty()
            && self.groups_to_remove.is_empty()
    }

    fn changes(&self) -> Vec<String> {
        let who = match &self.user_id {
            Some(id) => format!("user '{}' ({id})", self.login),
            None => format!("user '{}'", self.login),
        };
        let mut lines = Vec::new();
        if self.create {
            lines.push(format!("+ create {who}"));
        }
        for name in self.profile_changes.iter().chain(&self.custom_changes) {
            lines.push(format!("~ {who}: profile.{name}"));
        }
        if self.password_change {
            lines.push(format!("~ {who}: password"));
        }
        if self.recovery_question_change {
            lines.push(format!("~ {who}: recovery question"));
        }
        for role in &self.roles_to_add {
            lines.push(format!("+ {who}: admin role {role}"));
        }
        for role in &self.roles_to_remove {
            lines.push(format!("- {who}: admin role {role}"));
        }
        for group in &self.groups_to_add {
            lines.push(format!("+ {who}: group {group}"));
        }
        for group in &self.groups_to_remove {
            lines.push(format!("- {who}: group {group}"));
        }
        for step in &self.transitions {
            lines.push(format!("~ {who}: {step} (-> {})", step.target()));
        }
        lines
    }
}

fn pre_validate(desired: &DesiredUser) -> Option<Diagnostics> {
    let errors = desired.validate();
    if errors.is_empty() {
        return None;
    }
    let mut diags = Diagnostics::new();
    for err in &errors {
        diags.push_error(err);
    }
    Some(diags)
}

/// A user created without a password stays `PROVISIONED` until they
/// complete activation themselves.
fn warn_if_awaiting_activation(
    desired: &DesiredUser,
    state: &UserState,
    diagnostics: &mut Diagnostics,
) {
    if state.status == UserStatus::Provisioned && desired.status == UserStatus::Active {
        diagnostics.push_warning(
            "User is PROVISIONED",
            format!(
                "user {} has no password yet; the status becomes ACTIVE once they complete activation",
                desired.login
            ),
        );
    }
}

/// Starting point for projecting a user managed by `desired`.
fn carry_from(desired: &DesiredUser, prior: Option<&UserState>) -> UserState {
    let mut carry = prior.cloned().unwrap_or_default();

    for (snake, _) in desired.base_attributes() {
        carry.profile.entry(snake.to_string()).or_insert(None);
    }

    // Ignored attributes keep the prior value, or the declared one on
    // first sight.
    let ignore = desired.custom_profile_attributes_to_ignore.clone();
    let mut kept: CustomAttributes = desired
        .custom_profile_attributes
        .as_deref()
        .and_then(|raw| parse_custom_json(raw).ok())
        .unwrap_or_default();
    if let Some(prior) = prior {
        if let Ok(previous) = parse_custom_json(&prior.custom_profile_attributes) {
            kept.extend(previous.into_iter().filter(|(k, _)| ignore.contains(k)));
        }
    }
    kept.retain(|k, _| ignore.contains(k));
    carry.custom_profile_attributes = canonical_json(&kept);
    carry.custom_profile_attributes_to_ignore = ignore;

    let redact = |declared: bool| declared.then(|| REDACTED.to_string());
    carry.password = redact(desired.password.is_some());
    carry.old_password = redact(desired.old_password.is_some());
    carry.recovery_answer = redact(desired.recovery_answer.is_some());
    if desired.recovery_question.is_some() {
        carry.recovery_question = desired.recovery_question.clone();
    }
    carry.expire_password_on_create = desired.expire_password_on_create;
    carry.delay_read_seconds = desired.delay_read_seconds;
    carry
}

/// Re-project `state` from a mutation response, keeping what the response
/// does not carry.
fn refresh_from(state: &mut UserState, user: &User) -> ReconcileResult<()> {
    let carry = state.clone();
    *state = project_user(user, Some(&carry))?;
    Ok(())
}

fn creation_plan(desired: &DesiredUser) -> UserPlan {
    let start = if desired.status == UserStatus::Deprovisioned {
        UserStatus::Staged
    } else {
        UserStatus::Active
    };
    UserPlan {
        login: desired.login.clone(),
        user_id: None,
        create: true,
        current_status: None,
        transitions: select_transitions(start, desired.status).unwrap_or_default(),
        roles_to_add: desired
            .admin_roles
            .iter()
            .flatten()
            .map(|r| r.role_type.clone())
            .collect(),
        groups_to_add: desired
            .group_memberships
            .iter()
            .flatten()
            .cloned()
            .collect(),
        ..Default::default()
    }
}

/// Diff `desired` against the observed `current` state.
pub fn diff(desired: &DesiredUser, current: &UserState) -> ReconcileResult<UserPlan> {
    let mut plan = UserPlan {
        login: desired.login.clone(),
        user_id: Some(current.id.clone()),
        current_status: Some(current.status),
        ..Default::default()
    };

    let declared: BTreeMap<&str, &str> = desired.base_attributes().collect();
    for (snake, value) in &declared {
        let observed = current.profile.get(*snake).and_then(Option::as_deref);
        if observed != Some(*value) {
            plan.profile_changes.push((*snake).to_string());
        }
    }
    // Undeclared base attributes are cleared.
    for (snake, observed) in &current.profile {
        if observed.is_some() && !declared.contains_key(snake.as_str()) {
            plan.profile_changes.push(snake.clone());
        }
    }

    let wanted = desired.managed_custom_attributes()?;
    let mut observed = parse_custom_json(&current.custom_profile_attributes)?;
    observed.retain(|k, _| !desired.custom_profile_attributes_to_ignore.contains(k));
    let custom: BTreeSet<&String> = wanted
        .iter()
        .filter(|(k, v)| observed.get(*k) != Some(*v))
        .map(|(k, _)| k)
        .chain(observed.keys().filter(|k| !wanted.contains_key(*k)))
        .collect();
    plan.custom_changes = custom.into_iter().cloned().collect();

    if let Some(pw) = desired.password.as_ref().filter(|p| !p.is_redacted()) {
        let fp = fingerprint(&current.id, pw.expose());
        plan.password_change = current.password_fingerprint.as_deref() != Some(fp.as_str());
    }
    if let (Some(question), Some(answer)) = (&desired.recovery_question, &desired.recovery_answer) {
        if !answer.is_redacted() {
            let fp = fingerprint(&current.id, answer.expose());
            plan.recovery_question_change = current.recovery_question.as_ref() != Some(question)
                || current.recovery_answer_fingerprint.as_deref() != Some(fp.as_str());
        }
    }

    plan.transitions = select_transitions(current.status, desired.status)?;

    if let Some(roles) = &desired.admin_roles {
        let wanted: BTreeSet<&str> = roles.iter().map(|r| r.role_type.as_str()).collect();
        let held: BTreeSet<&str> = current.admin_roles.iter().map(String::as_str).collect();
        plan.roles_to_add = wanted.difference(&held).map(|s| (*s).to_string()).collect();
        plan.roles_to_remove = held.difference(&wanted).map(|s| (*s).to_string()).collect();
    }
    if let Some(groups) = &desired.group_memberships {
        plan.groups_to_add = groups
            .difference(&current.group_memberships)
            .cloned()
            .collect();
        plan.groups_to_remove = current
            .group_memberships
            .difference(groups)
            .cloned()
            .collect();
    }

    Ok(plan)
}

/// Changes the observed status forbids.
fn interlocks(desired: &DesiredUser, plan: &UserPlan, status: UserStatus) -> Vec<ReconcileError> {
    let mut errors = Vec::new();

    if status == UserStatus::Deprovisioned {
        let changed = plan
            .profile_changes
            .iter()
            .chain(&plan.custom_changes)
            .map(|name| format!("profile.{name}"))
            .chain(plan.password_change.then(|| "password".to_string()))
            .chain(
                plan.recovery_question_change
                    .then(|| "recovery_question".to_string()),
            );
        for attribute in changed {
            errors.push(ReconcileError::ImmutableState {
                attribute,
                status: status.to_string(),
            });
        }
    }

    if status == UserStatus::Provisioned && plan.password_change {
        errors.push(ReconcileError::ActivationNotComplete);
    }

    if plan.recovery_question_change && desired.password.as_ref().map_or(true, |p| p.is_redacted()) {
        errors.push(ReconcileError::validation(
            "recovery_question",
            "changing the recovery question requires the current password",
        ));
    }

    errors
}

fn creation_body(desired: &DesiredUser) -> ReconcileResult<CreateUserRequest> {
    let mut profile = Map::new();
    for (snake, value) in desired.base_attributes() {
        let key = okta_profile_key(snake)
            .ok_or_else(|| ReconcileError::validation(format!("profile.{snake}"), "unknown attribute"))?;
        profile.insert(key.to_string(), Value::String(value.to_string()));
    }
    if let Some(raw) = &desired.custom_profile_attributes {
        for (key, value) in parse_custom_json(raw)? {
            profile.insert(key, value.to_json());
        }
    }

    let password = desired.password.as_ref().map(|p| PasswordValue::new(p.expose()));
    let recovery_question = match (&desired.recovery_question, &desired.recovery_answer) {
        (Some(question), Some(answer)) => Some(RecoveryQuestion {
            question: Some(question.clone()),
            answer: Some(answer.expose().to_string()),
        }),
        _ => None,
    };
    let credentials = (password.is_some() || recovery_question.is_some()).then(|| UserCredentials {
        password,
        recovery_question,
        provider: None,
    });

    Ok(CreateUserRequest {
        profile,
        credentials,
        group_ids: desired
            .group_memberships
            .iter()
            .flatten()
            .cloned()
            .collect(),
    })
}

/// Partial update carrying only the changed attributes. Undeclared base and
/// custom attributes are cleared with `null`.
fn profile_update_body(desired: &DesiredUser, plan: &UserPlan) -> ReconcileResult<CreateUserRequest> {
    let mut profile = Map::new();
    let base: BTreeMap<&str, &str> = desired.base_attributes().collect();
    for name in &plan.profile_changes {
        let key = okta_profile_key(name)
            .ok_or_else(|| ReconcileError::validation(format!("profile.{name}"), "unknown attribute"))?;
        let value = base
            .get(name.as_str())
            .map_or(Value::Null, |v| Value::String((*v).to_string()));
        profile.insert(key.to_string(), value);
    }

    let wanted = desired.managed_custom_attributes()?;
    for name in &plan.custom_changes {
        let value = wanted.get(name).map_or(Value::Null, |v| v.to_json());
        profile.insert(name.clone(), value);
    }

    Ok(CreateUserRequest {
        profile,
        credentials: None,
        group_ids: Vec::new(),
    })
}
