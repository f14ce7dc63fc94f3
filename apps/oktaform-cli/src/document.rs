//! Desired-state YAML document.
//!
//! ```yaml
//! version: "1"
//! provider:
//!   org_url: https://example.okta.com
//! rule_collections:
//!   - authorization_server_id: aus1
//!     policy_id: pol1
//!     rules:
//!       - name: web-login
//!         priority: 1
//!         grant_type_whitelist: [authorization_code]
//! users:
//!   - login: ada@example.com
//!     email: ada@example.com
//!     first_name: Ada
//!     last_name: Lovelace
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use oktaform_core::{DesiredCollection, DesiredUser};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

pub const DOCUMENT_VERSION: &str = "1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredDocument {
    pub version: String,

    #[serde(default)]
    pub provider: Option<ProviderBlock>,

    #[serde(default)]
    pub rule_collections: Vec<DesiredCollection>,

    #[serde(default)]
    pub users: Vec<DesiredUser>,
}

/// Connection settings. Unset fields fall back to `OKTA_*` variables.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderBlock {
    #[serde(default)]
    pub org_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ProviderBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ProviderBlock")
            .field("org_url", &self.org_url)
            .field("api_token", &redact(&self.api_token))
            .field("access_token", &redact(&self.access_token))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl DesiredDocument {
    /// Identifier a rule collection is tracked under in the state file.
    pub fn collection_key(collection: &DesiredCollection) -> String {
        collection.policy().to_string()
    }

    pub fn collection_keys(&self) -> BTreeSet<String> {
        self.rule_collections.iter().map(Self::collection_key).collect()
    }

    pub fn user_keys(&self) -> BTreeSet<String> {
        self.users.iter().map(|u| u.login.clone()).collect()
    }

    /// Document-level checks. Entity contents are validated by the core.
    pub fn validate(&self) -> CliResult<()> {
        if self.version != DOCUMENT_VERSION {
            return Err(CliError::Validation(format!(
                "Unsupported document version '{}' (expected '{DOCUMENT_VERSION}')",
                self.version
            )));
        }

        let mut seen = BTreeSet::new();
        for collection in &self.rule_collections {
            let key = Self::collection_key(collection);
            if !seen.insert(key.clone()) {
                return Err(CliError::Validation(format!(
                    "Rule collection '{key}' is declared more than once"
                )));
            }
        }

        let mut logins = BTreeSet::new();
        for user in &self.users {
            if !logins.insert(user.login.to_lowercase()) {
                return Err(CliError::Validation(format!(
                    "User '{}' is declared more than once",
                    user.login
                )));
            }
        }
        Ok(())
    }
}

/// Parse and validate a document.
pub fn parse(content: &str) -> CliResult<DesiredDocument> {
    let document: DesiredDocument = serde_yaml::from_str(content).map_err(|e| {
        let location = if let Some(loc) = e.location() {
            format!(" at line {}, column {}", loc.line(), loc.column())
        } else {
            String::new()
        };
        CliError::Validation(format!("Invalid YAML{location}: {e}"))
    })?;
    document.validate()?;
    Ok(document)
}

/// Read, parse and validate the document at `path`.
pub fn load(path: &Path) -> CliResult<DesiredDocument> {
    if !path.exists() {
        return Err(CliError::Validation(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("Failed to read file {}: {}", path.display(), e)))?;
    parse(&content)
}
