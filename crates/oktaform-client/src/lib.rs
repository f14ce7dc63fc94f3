//! Okta management API client.
//!
//! This crate is the downward collaborator of the oktaform reconciliation
//! core. It exposes two capability traits, [`PolicyRuleApi`] and [`UserApi`],
//! and a reqwest-backed implementation, [`OktaClient`].
//!
//! The core only depends on the traits and on the HTTP status convention
//! carried by [`OktaClientError::status`], so tests substitute an in-memory
//! tenant for the HTTP client.
//!
//! # Example
//!
//! ```ignore
//! use oktaform_client::{OktaClient, OktaClientConfig, OktaCredentials, PolicyRef, ListParams};
//! use oktaform_client::PolicyRuleApi;
//!
//! let client = OktaClient::new(OktaClientConfig::new(
//!     "https://example.okta.com",
//!     OktaCredentials::ApiToken { token: "00abc".into() },
//! ))?;
//! let policy = PolicyRef::new("aus1", "pol1");
//! let page = client.list_policy_rules(&policy, &ListParams::default()).await?;
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod pagination;

pub use api::{PolicyRuleApi, UserApi};
pub use auth::OktaCredentials;
pub use client::{OktaClient, OktaClientConfig};
pub use error::{OktaClientError, OktaClientResult};
pub use models::{
    CreateUserRequest, Group, GroupProfile, IncludeExclude, IncludeList, InlineHookRef,
    PasswordValue, PeopleCondition, PolicyRef, PolicyRule, RecoveryQuestion, Role, RuleActions,
    RuleConditions, TokenActions, User, UserCredentials,
};
pub use pagination::{ListParams, Page};
