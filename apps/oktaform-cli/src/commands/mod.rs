//! CLI command implementations

pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;

use std::sync::Arc;

use oktaform_client::{OktaClient, PolicyRuleApi, UserApi};
use oktaform_core::{CoreConfig, RuleCollectionReconciler, TokioClock, UserReconciler};

use crate::document::ProviderBlock;
use crate::error::CliResult;
use crate::provider;

/// The reconcilers every command drives, sharing one API client.
pub struct Engine {
    pub rules: RuleCollectionReconciler,
    pub users: UserReconciler,
}

impl Engine {
    pub fn new<A>(api: Arc<A>, config: &CoreConfig) -> Self
    where
        A: PolicyRuleApi + UserApi + 'static,
    {
        let rule_api: Arc<dyn PolicyRuleApi> = api.clone();
        let user_api: Arc<dyn UserApi> = api;
        Self {
            rules: RuleCollectionReconciler::new(rule_api, config, Arc::new(TokioClock)),
            users: UserReconciler::new(user_api, config, Arc::new(TokioClock)),
        }
    }

    /// Build an `OktaClient` from the provider block and `lookup`, and the
    /// core options from the `OKTAFORM_*` variables.
    pub fn connect<F>(provider: Option<&ProviderBlock>, lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_config = provider::client_config(provider, &lookup)?;
        let core_config = CoreConfig::from_lookup(&lookup)?;
        tracing::debug!(org_url = %client_config.org_url, "Connecting to Okta");
        let client = OktaClient::new(client_config)?;
        Ok(Self::new(Arc::new(client), &core_config))
    }

    /// [`Engine::connect`] against the process environment.
    pub fn from_env(provider: Option<&ProviderBlock>) -> CliResult<Self> {
        Self::connect(provider, |var| std::env::var(var).ok())
    }
}
