//! Transport-independent failure taxonomy of the reconciliation core.

use oktaform_client::OktaClientError;
use thiserror::Error;

/// Why a reconciliation step failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReconcileError {
    /// Conflict that kept recurring until the retry deadline ran out.
    #[error("{operation}: conflict persisted after retries: {message}")]
    TransientConflict { operation: String, message: String },

    #[error("{operation}: not found: {message}")]
    NotFound { operation: String, message: String },

    #[error("{operation}: permission denied: {message}")]
    PermissionDenied { operation: String, message: String },

    /// Declared configuration violates an invariant.
    #[error("invalid {attribute}: {message}")]
    Validation { attribute: String, message: String },

    /// Mutation requested on an entity in a terminal state.
    #[error("cannot change {attribute} while the user is {status}")]
    ImmutableState { attribute: String, status: String },

    #[error("password cannot be changed until the user completes activation (status PROVISIONED)")]
    ActivationNotComplete,

    #[error("user still transitioning to {target} after {waited_secs}s")]
    TransitionTimeout { target: String, waited_secs: u64 },

    #[error("{operation}: remote error{}: {message}", status_suffix(.status))]
    Remote {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// The caller cancelled the run; carries the last error seen, if any.
    #[error("cancelled{}", last_error_suffix(.last_error))]
    Cancelled { last_error: Option<String> },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last error: {e})"))
        .unwrap_or_default()
}

/// Result alias for core operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl ReconcileError {
    /// Map a client error raised while performing `operation`.
    #[must_use]
    pub fn from_client(operation: &str, err: &OktaClientError) -> Self {
        let operation = operation.to_string();
        let message = err.to_string();
        match err {
            OktaClientError::NotFound(_) => Self::NotFound { operation, message },
            OktaClientError::Conflict(_) => Self::TransientConflict { operation, message },
            OktaClientError::Forbidden(_) => Self::PermissionDenied { operation, message },
            _ => Self::Remote {
                operation,
                status: err.status(),
                message,
            },
        }
    }

    #[must_use]
    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Short kind label, used as the diagnostic summary.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransientConflict { .. } => "Conflict",
            Self::NotFound { .. } => "Not found",
            Self::PermissionDenied { .. } => "Permission denied",
            Self::Validation { .. } => "Invalid configuration",
            Self::ImmutableState { .. } => "Immutable state",
            Self::ActivationNotComplete => "Activation not complete",
            Self::TransitionTimeout { .. } => "Transition timeout",
            Self::Remote { .. } => "Remote API error",
            Self::Cancelled { .. } => "Cancelled",
        }
    }

    /// Attribute path the error points at, when it concerns one.
    #[must_use]
    pub fn attribute_path(&self) -> Option<&str> {
        match self {
            Self::Validation { attribute, .. } | Self::ImmutableState { attribute, .. } => {
                Some(attribute)
            }
            Self::ActivationNotComplete => Some("password"),
            Self::TransitionTimeout { .. } => Some("status"),
            _ => None,
        }
    }
}
