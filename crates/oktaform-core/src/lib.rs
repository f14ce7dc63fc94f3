//! # oktaform reconciliation core
//!
//! Turns a declared desired state into the sequence of Okta management API
//! calls that brings a tenant into that state, then reports the observed
//! state back to the caller.
//!
//! Two entity kinds are managed:
//!
//! - **Policy rule collections**: every rule of one authorization server
//!   policy, reconciled as a single ordered unit keyed by rule name
//!   ([`rules::RuleCollectionReconciler`]).
//! - **Users**: profile, credentials, admin roles, group memberships and the
//!   lifecycle status state machine ([`users::UserReconciler`]).
//!
//! Every remote call goes through the [`retry::RetryHarness`]. Failures are
//! returned as [`diagnostics::Diagnostics`] next to a best-effort state, so
//! the caller can always persist what actually happened.
//!
//! ```ignore
//! let reconciler = RuleCollectionReconciler::new(api, &config, Arc::new(TokioClock));
//! let outcome = reconciler.create(&desired, &CancellationToken::new()).await;
//! for diag in outcome.diagnostics.iter() {
//!     eprintln!("{diag}");
//! }
//! ```

pub mod cancel;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod projector;
pub mod resource;
pub mod retry;
pub mod rules;
pub mod users;
pub mod value;

pub use cancel::CancellationToken;
pub use clock::{Clock, TokioClock};
pub use config::{ConfigError, CoreConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{ReconcileError, ReconcileResult};
pub use resource::{Outcome, PlanSummary, Resource};
pub use retry::{OperationKind, RetryHarness, RetryPolicy};
pub use rules::{
    DesiredCollection, DesiredRule, ReconciliationPlan, RuleCollectionReconciler,
    RuleCollectionState, RuleState, RuleStatus,
};
pub use users::{
    DesiredRoleAssignment, DesiredUser, UserPlan, UserReconciler, UserState, UserStatus,
};
