//! Okta management API HTTP client (reqwest-based).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{PolicyRuleApi, UserApi};
use crate::auth::OktaCredentials;
use crate::error::{OktaClientError, OktaClientResult};
use crate::models::{
    AssignRoleRequest, ChangePasswordRequest, ChangeRecoveryQuestionRequest, CreateUserRequest,
    Group, PasswordValue, PolicyRef, PolicyRule, RecoveryQuestion, Role, User,
};
use crate::pagination::{cursor_from_url, parse_next_link, ListParams, Page};

const USER_AGENT: &str = concat!("oktaform/", env!("CARGO_PKG_VERSION"));

/// Upper bound on pages followed by the internal "fetch everything" helper.
const MAX_FOLLOWED_PAGES: usize = 1_000;

/// Connection settings for [`OktaClient`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OktaClientConfig {
    /// Org URL, e.g. `https://example.okta.com`.
    pub org_url: String,
    pub credentials: OktaCredentials,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl OktaClientConfig {
    #[must_use]
    pub fn new(org_url: impl Into<String>, credentials: OktaCredentials) -> Self {
        Self {
            org_url: org_url.into(),
            credentials,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Check the org URL and credentials.
    pub fn validate(&self) -> OktaClientResult<()> {
        if !(self.org_url.starts_with("https://") || self.org_url.starts_with("http://")) {
            return Err(OktaClientError::InvalidConfig(format!(
                "org_url must be an http(s) URL, got '{}'",
                self.org_url
            )));
        }
        if self.credentials.is_empty() {
            return Err(OktaClientError::InvalidConfig(
                "credentials must carry a non-empty token".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(OktaClientError::InvalidConfig(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP client for the Okta management API.
#[derive(Debug, Clone)]
pub struct OktaClient {
    /// Org URL without trailing slash.
    base_url: String,
    credentials: OktaCredentials,
    http_client: Client,
}

impl OktaClient {
    /// Create a new client from configuration.
    pub fn new(config: OktaClientConfig) -> OktaClientResult<Self> {
        config.validate()?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                OktaClientError::InvalidConfig(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self::with_http_client(
            config.org_url,
            config.credentials,
            http_client,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(
        org_url: String,
        credentials: OktaCredentials,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: org_url.trim_end_matches('/').to_string(),
            credentials,
            http_client,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── URL builders ──────────────────────────────────────────────────

    fn rules_url(&self, policy: &PolicyRef) -> String {
        format!(
            "{}/api/v1/authorizationServers/{}/policies/{}/rules",
            self.base_url,
            encode(&policy.authorization_server_id),
            encode(&policy.policy_id)
        )
    }

    fn rule_url(&self, policy: &PolicyRef, rule_id: &str) -> String {
        format!("{}/{}", self.rules_url(policy), encode(rule_id))
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/api/v1/users/{}", self.base_url, encode(user_id))
    }

    fn lifecycle_url(&self, user_id: &str, verb: &str) -> String {
        format!("{}/lifecycle/{verb}", self.user_url(user_id))
    }

    // ── Internal HTTP methods ─────────────────────────────────────────

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        self.credentials
            .apply(builder)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> OktaClientResult<T> {
        debug!("Okta GET {}", url);
        let response = self.request(self.http_client.get(url)).send().await?;
        self.handle_response(response).await
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &ListParams,
    ) -> OktaClientResult<Page<T>> {
        debug!("Okta GET {} (after={:?})", url, params.after);
        let mut builder = self.request(self.http_client.get(url));
        let query = params.to_query();
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        let response = builder.send().await?;

        let next_cursor = response
            .headers()
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(parse_next_link)
            .and_then(|next| cursor_from_url(&next));

        let items = self.handle_response(response).await?;
        Ok(Page { items, next_cursor })
    }

    /// Follow `next` cursors until the collection is exhausted.
    async fn get_all<T: DeserializeOwned>(&self, url: &str) -> OktaClientResult<Vec<T>> {
        let mut params = ListParams::default();
        let mut items = Vec::new();
        for _ in 0..MAX_FOLLOWED_PAGES {
            let page: Page<T> = self.get_page(url, &params).await?;
            items.extend(page.items);
            match page.next_cursor {
                Some(cursor) => params = params.page(Some(cursor)),
                None => return Ok(items),
            }
        }
        warn!(url, "Stopped following pagination links after page cap");
        Ok(items)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> OktaClientResult<T> {
        debug!("Okta POST {}", url);
        let response = self
            .request(self.http_client.post(url))
            .query(query)
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// POST whose response body is ignored (lifecycle verbs, credential changes).
    async fn post_no_content<B: Serialize>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> OktaClientResult<()> {
        debug!("Okta POST {}", url);
        let mut builder = self.request(self.http_client.post(url)).query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        self.expect_success(response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> OktaClientResult<T> {
        debug!("Okta PUT {}", url);
        let response = self
            .request(self.http_client.put(url))
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn put_no_content(&self, url: &str) -> OktaClientResult<()> {
        debug!("Okta PUT {}", url);
        let response = self.request(self.http_client.put(url)).send().await?;
        self.expect_success(response).await
    }

    async fn delete(&self, url: &str) -> OktaClientResult<()> {
        debug!("Okta DELETE {}", url);
        let response = self.request(self.http_client.delete(url)).send().await?;
        self.expect_success(response).await
    }

    // ── Response handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> OktaClientResult<T> {
        if response.status().is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| OktaClientError::ParseError(format!("Failed to parse response: {e}")))
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn expect_success(&self, response: Response) -> OktaClientResult<()> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn error_from_response(response: Response) -> OktaClientError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Okta rate limited, retry after {:?}s", retry_after);
        }
        OktaClientError::from_response(status.as_u16(), &body, retry_after)
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn flag(value: bool) -> String {
    value.to_string()
}

#[async_trait]
impl PolicyRuleApi for OktaClient {
    async fn list_policy_rules(
        &self,
        policy: &PolicyRef,
        params: &ListParams,
    ) -> OktaClientResult<Page<PolicyRule>> {
        self.get_page(&self.rules_url(policy), params).await
    }

    async fn get_policy_rule(
        &self,
        policy: &PolicyRef,
        rule_id: &str,
    ) -> OktaClientResult<PolicyRule> {
        self.get(&self.rule_url(policy, rule_id)).await
    }

    async fn create_policy_rule(
        &self,
        policy: &PolicyRef,
        rule: &PolicyRule,
    ) -> OktaClientResult<PolicyRule> {
        self.post(&self.rules_url(policy), &[], rule).await
    }

    async fn replace_policy_rule(
        &self,
        policy: &PolicyRef,
        rule_id: &str,
        rule: &PolicyRule,
    ) -> OktaClientResult<PolicyRule> {
        self.put(&self.rule_url(policy, rule_id), rule).await
    }

    async fn delete_policy_rule(&self, policy: &PolicyRef, rule_id: &str) -> OktaClientResult<()> {
        self.delete(&self.rule_url(policy, rule_id)).await
    }

    async fn activate_policy_rule(
        &self,
        policy: &PolicyRef,
        rule_id: &str,
    ) -> OktaClientResult<()> {
        let url = format!("{}/lifecycle/activate", self.rule_url(policy, rule_id));
        self.post_no_content::<()>(&url, &[], None).await
    }

    async fn deactivate_policy_rule(
        &self,
        policy: &PolicyRef,
        rule_id: &str,
    ) -> OktaClientResult<()> {
        let url = format!("{}/lifecycle/deactivate", self.rule_url(policy, rule_id));
        self.post_no_content::<()>(&url, &[], None).await
    }
}

#[async_trait]
impl UserApi for OktaClient {
    async fn list_users(&self, params: &ListParams) -> OktaClientResult<Page<User>> {
        let url = format!("{}/api/v1/users", self.base_url);
        self.get_page(&url, params).await
    }

    async fn get_user(&self, id_or_login: &str) -> OktaClientResult<User> {
        self.get(&self.user_url(id_or_login)).await
    }

    async fn create_user(
        &self,
        body: &CreateUserRequest,
        activate: bool,
    ) -> OktaClientResult<User> {
        let url = format!("{}/api/v1/users", self.base_url);
        self.post(&url, &[("activate", flag(activate))], body).await
    }

    async fn update_user(&self, user_id: &str, body: &CreateUserRequest) -> OktaClientResult<User> {
        self.post(&self.user_url(user_id), &[], body).await
    }

    async fn delete_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.delete(&self.user_url(user_id)).await
    }

    async fn activate_user(&self, user_id: &str, send_email: bool) -> OktaClientResult<()> {
        self.post_no_content::<()>(
            &self.lifecycle_url(user_id, "activate"),
            &[("sendEmail", flag(send_email))],
            None,
        )
        .await
    }

    async fn deactivate_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.post_no_content::<()>(&self.lifecycle_url(user_id, "deactivate"), &[], None)
            .await
    }

    async fn suspend_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.post_no_content::<()>(&self.lifecycle_url(user_id, "suspend"), &[], None)
            .await
    }

    async fn unsuspend_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.post_no_content::<()>(&self.lifecycle_url(user_id, "unsuspend"), &[], None)
            .await
    }

    async fn unlock_user(&self, user_id: &str) -> OktaClientResult<()> {
        self.post_no_content::<()>(&self.lifecycle_url(user_id, "unlock"), &[], None)
            .await
    }

    async fn expire_password(&self, user_id: &str) -> OktaClientResult<()> {
        self.post_no_content::<()>(&self.lifecycle_url(user_id, "expire_password"), &[], None)
            .await
    }

    async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> OktaClientResult<()> {
        let url = format!("{}/credentials/change_password", self.user_url(user_id));
        let body = ChangePasswordRequest {
            old_password: PasswordValue::new(old_password),
            new_password: PasswordValue::new(new_password),
        };
        self.post_no_content(&url, &[], Some(&body)).await
    }

    async fn change_recovery_question(
        &self,
        user_id: &str,
        password: &str,
        question: &str,
        answer: &str,
    ) -> OktaClientResult<()> {
        let url = format!(
            "{}/credentials/change_recovery_question",
            self.user_url(user_id)
        );
        let body = ChangeRecoveryQuestionRequest {
            password: PasswordValue::new(password),
            recovery_question: RecoveryQuestion {
                question: Some(question.to_string()),
                answer: Some(answer.to_string()),
            },
        };
        self.post_no_content(&url, &[], Some(&body)).await
    }

    async fn list_assigned_roles(&self, user_id: &str) -> OktaClientResult<Vec<Role>> {
        self.get_all(&format!("{}/roles", self.user_url(user_id)))
            .await
    }

    async fn assign_role(
        &self,
        user_id: &str,
        role_type: &str,
        disable_notifications: bool,
    ) -> OktaClientResult<Role> {
        let url = format!("{}/roles", self.user_url(user_id));
        let body = AssignRoleRequest {
            role_type: role_type.to_string(),
        };
        self.post(
            &url,
            &[("disableNotifications", flag(disable_notifications))],
            &body,
        )
        .await
    }

    async fn remove_role(&self, user_id: &str, role_assignment_id: &str) -> OktaClientResult<()> {
        let url = format!(
            "{}/roles/{}",
            self.user_url(user_id),
            encode(role_assignment_id)
        );
        self.delete(&url).await
    }

    async fn list_user_groups(&self, user_id: &str) -> OktaClientResult<Vec<Group>> {
        self.get_all(&format!("{}/groups", self.user_url(user_id)))
            .await
    }

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> OktaClientResult<()> {
        let url = format!(
            "{}/api/v1/groups/{}/users/{}",
            self.base_url,
            encode(group_id),
            encode(user_id)
        );
        self.put_no_content(&url).await
    }

    async fn remove_user_from_group(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> OktaClientResult<()> {
        let url = format!(
            "{}/api/v1/groups/{}/users/{}",
            self.base_url,
            encode(group_id),
            encode(user_id)
        );
        self.delete(&url).await
    }
}
