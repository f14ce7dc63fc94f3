//! Executes lifecycle verbs and waits for Okta to finish applying them.

use oktaform_client::{User, UserApi};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::status::{select_transitions, Transition, UserStatus};
use crate::cancel::{interruptible_sleep, CancellationToken};
use crate::error::{ReconcileError, ReconcileResult};
use crate::retry::RetryHarness;

/// Drives a user from one lifecycle status to another.
#[derive(Clone)]
pub struct StatusReconciler {
    api: Arc<dyn UserApi>,
    harness: RetryHarness,
    deadline: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for StatusReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReconciler")
            .field("deadline", &self.deadline)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl StatusReconciler {
    #[must_use]
    pub fn new(
        api: Arc<dyn UserApi>,
        harness: RetryHarness,
        deadline: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            harness,
            deadline,
            poll_interval,
        }
    }

    /// Move `user_id` from `current` to `desired` and wait for it to settle.
    ///
    /// Returns the last observed user, or `None` when no call was needed.
    pub async fn transition(
        &self,
        user_id: &str,
        current: UserStatus,
        desired: UserStatus,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Option<User>> {
        let steps = select_transitions(current, desired)?;
        self.run(user_id, &steps, cancel).await
    }

    /// Execute `steps` in order, draining after each one.
    pub async fn run(
        &self,
        user_id: &str,
        steps: &[Transition],
        cancel: &CancellationToken,
    ) -> ReconcileResult<Option<User>> {
        let mut observed = None;
        for step in steps {
            self.execute(user_id, *step, cancel).await?;
            observed = Some(self.drain(user_id, cancel).await?);
        }
        Ok(observed)
    }

    async fn execute(
        &self,
        user_id: &str,
        step: Transition,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let operation = format!("{step} user {user_id}");
        let api = &self.api;
        match step {
            Transition::Activate => {
                self.harness
                    .mutate(cancel, &operation, || api.activate_user(user_id, false))
                    .await
            }
            Transition::Unsuspend => {
                self.harness
                    .mutate(cancel, &operation, || api.unsuspend_user(user_id))
                    .await
            }
            Transition::Unlock => {
                self.harness
                    .mutate(cancel, &operation, || api.unlock_user(user_id))
                    .await
            }
            Transition::Suspend => {
                self.harness
                    .mutate(cancel, &operation, || api.suspend_user(user_id))
                    .await
            }
            Transition::Deactivate => {
                self.harness
                    .mutate(cancel, &operation, || api.deactivate_user(user_id))
                    .await
            }
        }?;
        info!(user_id, transition = %step, "Lifecycle transition requested");
        Ok(())
    }

    /// Poll until the user has no pending status.
    pub async fn drain(&self, user_id: &str, cancel: &CancellationToken) -> ReconcileResult<User> {
        let clock = self.harness.clock();
        let start = clock.now();
        let operation = format!("get user {user_id}");

        loop {
            let user = self
                .harness
                .read(cancel, &operation, || self.api.get_user(user_id))
                .await?;
            let Some(target) = user.pending_status().map(str::to_string) else {
                return Ok(user);
            };

            let waited = clock.now().saturating_duration_since(start);
            if waited >= self.deadline {
                warn!(user_id, %target, waited_secs = waited.as_secs(), "Gave up waiting for transition");
                return Err(ReconcileError::TransitionTimeout {
                    target,
                    waited_secs: waited.as_secs(),
                });
            }

            debug!(user_id, %target, "User still transitioning");
            let pause = self.poll_interval.min(self.deadline - waited);
            if !interruptible_sleep(clock.as_ref(), cancel, pause).await {
                return Err(ReconcileError::Cancelled {
                    last_error: Some(format!("user {user_id} still transitioning to {target}")),
                });
            }
        }
    }
}
