//! Okta connection settings from the document's provider block and the environment.

use oktaform_client::{OktaClientConfig, OktaCredentials};

use crate::document::ProviderBlock;
use crate::error::{CliError, CliResult};

pub const ORG_URL_VAR: &str = "OKTA_ORG_URL";
pub const API_TOKEN_VAR: &str = "OKTA_API_TOKEN";
pub const ACCESS_TOKEN_VAR: &str = "OKTA_ACCESS_TOKEN";

/// Build the client configuration. Document values win over variables, and
/// an API token wins over an access token.
pub fn client_config<F>(
    provider: Option<&ProviderBlock>,
    lookup: F,
) -> CliResult<OktaClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let block = provider.cloned().unwrap_or_default();
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let org_url = non_empty(block.org_url)
        .or_else(|| non_empty(lookup(ORG_URL_VAR)))
        .ok_or_else(|| {
            CliError::Config(format!(
                "Okta org URL is not set (provider.org_url or {ORG_URL_VAR})"
            ))
        })?;

    let credentials = if let Some(token) = non_empty(block.api_token) {
        OktaCredentials::ApiToken { token }
    } else if let Some(token) = non_empty(block.access_token) {
        OktaCredentials::Bearer { token }
    } else if let Some(token) = non_empty(lookup(API_TOKEN_VAR)) {
        OktaCredentials::ApiToken { token }
    } else if let Some(token) = non_empty(lookup(ACCESS_TOKEN_VAR)) {
        OktaCredentials::Bearer { token }
    } else {
        return Err(CliError::Config(format!(
            "No Okta credentials (provider.api_token, provider.access_token, {API_TOKEN_VAR} or {ACCESS_TOKEN_VAR})"
        )));
    };

    let mut config = OktaClientConfig::new(org_url.trim_end_matches('/'), credentials);
    if let Some(timeout) = block.request_timeout_secs {
        config.request_timeout_secs = timeout;
    }
    config.validate()?;
    Ok(config)
}
