//! CLI error types and exit codes

use oktaform_client::OktaClientError;
use oktaform_core::ConfigError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Invalid configuration or desired-state document
/// - 3: At least one error diagnostic was reported
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Okta client error: {0}")]
    Client(String),

    #[error("{count} error diagnostic(s) reported")]
    Diagnostics { count: usize },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation(_) | CliError::Config(_) => 2,
            CliError::Diagnostics { .. } => 3,
            CliError::Io(_) | CliError::State(_) | CliError::Client(_) => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => Some(
                "Set OKTA_ORG_URL and OKTA_API_TOKEN (or OKTA_ACCESS_TOKEN), or fill in the document's provider block.",
            ),
            CliError::State(_) => {
                Some("Restore the state file from a backup or re-import the entities.")
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::State(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<OktaClientError> for CliError {
    fn from(e: OktaClientError) -> Self {
        match e {
            OktaClientError::InvalidConfig(message) => CliError::Config(message),
            other => CliError::Client(other.to_string()),
        }
    }
}
