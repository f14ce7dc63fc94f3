//! Okta users: profile, credentials, admin roles, group memberships and the
//! lifecycle status state machine.

pub mod lifecycle;
pub mod model;
pub mod reconciler;
pub mod status;

pub use lifecycle::StatusReconciler;
pub use model::{DesiredRoleAssignment, DesiredUser, UserPlan, UserState};
pub use reconciler::UserReconciler;
pub use status::{select_transitions, Transition, UserStatus};
