//! Policy rule collections: every rule of one authorization server policy,
//! managed as a single declarative unit.

pub mod mapper;
pub mod model;
pub mod plan;
pub mod priority;
pub mod reconciler;
pub mod validate;

pub use model::{DesiredCollection, DesiredRule, RuleCollectionState, RuleState, RuleStatus};
pub use plan::{build_plan, PlanStep, PlannedDelete, ReconciliationPlan, UpdateReason};
pub use reconciler::RuleCollectionReconciler;
