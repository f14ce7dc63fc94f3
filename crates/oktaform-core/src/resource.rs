//! Upward interface: the operations an orchestrator drives per entity kind.

use async_trait::async_trait;

use crate::cancel::CancellationToken;
use crate::diagnostics::Diagnostics;

/// Result of an operation: a value, if one could be produced, and every
/// diagnostic raised on the way.
///
/// A failing operation still returns the best state it knows of, so the
/// caller's state store never lags behind what was applied remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: Option<T>,
    pub diagnostics: Diagnostics,
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn new(value: Option<T>, diagnostics: Diagnostics) -> Self {
        Self { value, diagnostics }
    }

    #[must_use]
    pub fn ok(value: T) -> Self {
        Self::new(Some(value), Diagnostics::new())
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        Outcome {
            value: self.value.map(f),
            diagnostics: self.diagnostics,
        }
    }
}

/// Human-readable view of a plan.
pub trait PlanSummary {
    /// Whether applying would change nothing.
    fn is_noop(&self) -> bool;

    /// One line per planned change.
    fn changes(&self) -> Vec<String>;
}

/// A managed entity kind.
#[async_trait]
pub trait Resource: Send + Sync {
    type Desired: Send + Sync;
    type State: Send + Sync;
    type Plan: PlanSummary + Send + Sync;

    /// Mutations an apply of `desired` over `prior` would perform.
    async fn plan(
        &self,
        desired: &Self::Desired,
        prior: Option<&Self::State>,
        cancel: &CancellationToken,
    ) -> Outcome<Self::Plan>;

    async fn create(&self, desired: &Self::Desired, cancel: &CancellationToken)
        -> Outcome<Self::State>;

    /// Refresh `prior` from the remote. `value == None` with no errors means
    /// the entity no longer exists.
    async fn read(&self, prior: &Self::State, cancel: &CancellationToken) -> Outcome<Self::State>;

    async fn update(
        &self,
        desired: &Self::Desired,
        prior: &Self::State,
        cancel: &CancellationToken,
    ) -> Outcome<Self::State>;

    async fn delete(&self, prior: &Self::State, cancel: &CancellationToken) -> Diagnostics;

    /// Build state for an existing remote entity from its import ID.
    async fn import(&self, id: &str, cancel: &CancellationToken) -> Outcome<Self::State>;
}
