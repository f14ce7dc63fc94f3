//! Capability traits over the Okta management API.
//!
//! The reconciliation core is written against these traits rather than the
//! concrete [`crate::OktaClient`], so an in-memory tenant can stand in for
//! the network in tests.

use async_trait::async_trait;

use crate::error::OktaClientResult;
use crate::models::{CreateUserRequest, Group, PolicyRef, PolicyRule, Role, User};
use crate::pagination::{ListParams, Page};

/// Authorization server policy rule operations.
#[async_trait]
pub trait PolicyRuleApi: Send + Sync {
    /// List one page of rules of a policy.
    async fn list_policy_rules(
        &self,
        policy: &PolicyRef,
        params: &ListParams,
    ) -> OktaClientResult<Page<PolicyRule>>;

    async fn get_policy_rule(&self, policy: &PolicyRef, rule_id: &str)
        -> OktaClientResult<PolicyRule>;

    async fn create_policy_rule(
        &self,
        policy: &PolicyRef,
        rule: &PolicyRule,
    ) -> OktaClientResult<PolicyRule>;

    async fn replace_policy_rule(
        &self,
        policy: &PolicyRef,
        rule_id: &str,
        rule: &PolicyRule,
    ) -> OktaClientResult<PolicyRule>;

    async fn delete_policy_rule(&self, policy: &PolicyRef, rule_id: &str) -> OktaClientResult<()>;

    async fn activate_policy_rule(&self, policy: &PolicyRef, rule_id: &str)
        -> OktaClientResult<()>;

    async fn deactivate_policy_rule(
        &self,
        policy: &PolicyRef,
        rule_id: &str,
    ) -> OktaClientResult<()>;
}

/// User operations, including lifecycle and credential sub-verbs.
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn list_users(&self, params: &ListParams) -> OktaClientResult<Page<User>>;

    /// Fetch a user by ID or by login.
    async fn get_user(&self, id_or_login: &str) -> OktaClientResult<User>;

    /// Create a user. With `activate == false` the user is left `STAGED`.
    async fn create_user(&self, body: &CreateUserRequest, activate: bool)
        -> OktaClientResult<User>;

    /// Partial update: only the supplied profile keys and credentials change.
    async fn update_user(&self, user_id: &str, body: &CreateUserRequest) -> OktaClientResult<User>;

    /// Delete a user. Okta only deletes `DEPROVISIONED` users; on any other
    /// status the call deactivates instead.
    async fn delete_user(&self, user_id: &str) -> OktaClientResult<()>;

    async fn activate_user(&self, user_id: &str, send_email: bool) -> OktaClientResult<()>;
    async fn deactivate_user(&self, user_id: &str) -> OktaClientResult<()>;
    async fn suspend_user(&self, user_id: &str) -> OktaClientResult<()>;
    async fn unsuspend_user(&self, user_id: &str) -> OktaClientResult<()>;
    async fn unlock_user(&self, user_id: &str) -> OktaClientResult<()>;
    async fn expire_password(&self, user_id: &str) -> OktaClientResult<()>;

    async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> OktaClientResult<()>;

    async fn change_recovery_question(
        &self,
        user_id: &str,
        password: &str,
        question: &str,
        answer: &str,
    ) -> OktaClientResult<()>;

    async fn list_assigned_roles(&self, user_id: &str) -> OktaClientResult<Vec<Role>>;

    async fn assign_role(
        &self,
        user_id: &str,
        role_type: &str,
        disable_notifications: bool,
    ) -> OktaClientResult<Role>;

    async fn remove_role(&self, user_id: &str, role_assignment_id: &str) -> OktaClientResult<()>;

    async fn list_user_groups(&self, user_id: &str) -> OktaClientResult<Vec<Group>>;

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> OktaClientResult<()>;

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str)
        -> OktaClientResult<()>;
}
