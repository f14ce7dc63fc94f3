//! Persisted JSON state: the last known state of every managed entity.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use oktaform_core::{RuleCollectionState, UserState};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

pub const STATE_VERSION: u32 = 1;

pub const DEFAULT_STATE_PATH: &str = "oktaform.state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,

    /// Bumped on every save.
    #[serde(default)]
    pub serial: u64,

    /// Keyed by `{authorization_server_id}/{policy_id}`.
    #[serde(default)]
    pub rule_collections: BTreeMap<String, RuleCollectionState>,

    /// Keyed by login.
    #[serde(default)]
    pub users: BTreeMap<String, UserState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            rule_collections: BTreeMap::new(),
            users: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load state, or an empty state when the file does not exist yet.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            CliError::State(format!("{} is not a valid state file: {}", path.display(), e))
        })?;
        if state.version != STATE_VERSION {
            return Err(CliError::State(format!(
                "{} has version {}, expected {STATE_VERSION}",
                path.display(),
                state.version
            )));
        }
        Ok(state)
    }

    /// Write through a sibling temp file so a crash never truncates the state.
    pub fn save(&mut self, path: &Path) -> CliResult<()> {
        self.serial += 1;
        let body = serde_json::to_string_pretty(self)?;
        let tmp = temp_path(path);
        fs::write(&tmp, body)
            .map_err(|e| CliError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, path).map_err(|e| {
            CliError::Io(format!("Failed to replace {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), serial = self.serial, "State saved");
        Ok(())
    }

    /// Key a user is stored under: its login, or its ID when the login is unknown.
    pub fn user_key(state: &UserState) -> String {
        state.login().map_or_else(|| state.id.clone(), str::to_string)
    }

    pub fn is_empty(&self) -> bool {
        self.rule_collections.is_empty() && self.users.is_empty()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_STATE_PATH.into());
    name.push(".tmp");
    path.with_file_name(name)
}
