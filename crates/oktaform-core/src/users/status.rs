//! User lifecycle states and the legal moves between them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReconcileError, ReconcileResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Staged,
    Provisioned,
    #[default]
    Active,
    Recovery,
    LockedOut,
    PasswordExpired,
    Suspended,
    Deprovisioned,
}

impl UserStatus {
    pub const ALL: [UserStatus; 8] = [
        Self::Staged,
        Self::Provisioned,
        Self::Active,
        Self::Recovery,
        Self::LockedOut,
        Self::PasswordExpired,
        Self::Suspended,
        Self::Deprovisioned,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staged => "STAGED",
            Self::Provisioned => "PROVISIONED",
            Self::Active => "ACTIVE",
            Self::Recovery => "RECOVERY",
            Self::LockedOut => "LOCKED_OUT",
            Self::PasswordExpired => "PASSWORD_EXPIRED",
            Self::Suspended => "SUSPENDED",
            Self::Deprovisioned => "DEPROVISIONED",
        }
    }

    /// `PASSWORD_EXPIRED` and `RECOVERY` are active users with a pending
    /// credential action.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::PasswordExpired | Self::Recovery => Self::Active,
            other => other,
        }
    }

    #[must_use]
    pub fn equivalent(self, other: Self) -> bool {
        self.normalized() == other.normalized()
    }

    /// Statuses a declaration may ask for.
    #[must_use]
    pub fn is_declarable(self) -> bool {
        matches!(
            self,
            Self::Staged | Self::Active | Self::Suspended | Self::Deprovisioned
        )
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ReconcileError::validation("status", format!("unknown user status '{s}'")))
    }
}

/// A lifecycle verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Activate,
    Unsuspend,
    Unlock,
    Suspend,
    Deactivate,
}

impl Transition {
    /// Status the user settles in once the verb completes.
    #[must_use]
    pub fn target(self) -> UserStatus {
        match self {
            Self::Activate | Self::Unsuspend | Self::Unlock => UserStatus::Active,
            Self::Suspend => UserStatus::Suspended,
            Self::Deactivate => UserStatus::Deprovisioned,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Activate => "activate",
            Self::Unsuspend => "unsuspend",
            Self::Unlock => "unlock",
            Self::Suspend => "suspend",
            Self::Deactivate => "deactivate",
        })
    }
}

/// Verbs that move a user from `current` to `desired`, in call order.
///
/// Equivalent statuses need no call. `STAGED` can only be requested at
/// creation time. A `PROVISIONED` user becomes `ACTIVE` by completing
/// activation, so no verb is sent for it.
pub fn select_transitions(current: UserStatus, desired: UserStatus) -> ReconcileResult<Vec<Transition>> {
    if current.equivalent(desired) {
        return Ok(Vec::new());
    }

    let bad = |reason: &str| {
        Err(ReconcileError::validation(
            "status",
            format!("cannot move user from {current} to {desired}: {reason}"),
        ))
    };

    match desired {
        UserStatus::Staged => bad("STAGED is only reachable when creating the user"),
        UserStatus::Active => Ok(match current {
            UserStatus::Provisioned => Vec::new(),
            UserStatus::Suspended => vec![Transition::Unsuspend],
            UserStatus::LockedOut => vec![Transition::Unlock],
            _ => vec![Transition::Activate],
        }),
        UserStatus::Suspended => match current.normalized() {
            UserStatus::Active => Ok(vec![Transition::Suspend]),
            UserStatus::LockedOut => Ok(vec![Transition::Unlock, Transition::Suspend]),
            _ => bad("only active users can be suspended"),
        },
        UserStatus::Deprovisioned => Ok(vec![Transition::Deactivate]),
        UserStatus::Provisioned
        | UserStatus::Recovery
        | UserStatus::LockedOut
        | UserStatus::PasswordExpired => bad("status is set by the server, not declared"),
    }
}
