//! Exponential backoff retry harness for Okta API calls.
//!
//! Every remote call made by the core runs through [`RetryHarness`]. Errors
//! are classified by HTTP status:
//!
//! | status | read / mutate | delete |
//! |---|---|---|
//! | 404 | permanent | suppressed (already gone) |
//! | 409, 429, 5xx except 501/505 | retryable | retryable |
//! | no response (transport) | retryable | retryable |
//! | anything else | permanent | permanent |
//!
//! Retries back off exponentially with jitter until the overall deadline
//! would be exceeded. Sleeps observe the caller's cancellation token.

use oktaform_client::{OktaClientError, OktaClientResult};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cancel::{interruptible_sleep, CancellationToken};
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::error::{ReconcileError, ReconcileResult};

/// What a call does, which decides how a 404 is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Mutate,
    Delete,
}

/// Outcome of classifying a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Treated as success (404 on delete).
    Suppressed,
    Retryable,
    Permanent,
}

/// Classify an HTTP status for an operation kind. `None` means no response
/// was received.
#[must_use]
pub fn classify_status(kind: OperationKind, status: Option<u16>) -> Classification {
    match status {
        None => Classification::Retryable,
        Some(404) if kind == OperationKind::Delete => Classification::Suppressed,
        Some(409 | 429) => Classification::Retryable,
        Some(501 | 505) => Classification::Permanent,
        Some(500..=599) => Classification::Retryable,
        Some(_) => Classification::Permanent,
    }
}

/// Classify a client error.
#[must_use]
pub fn classify(kind: OperationKind, err: &OktaClientError) -> Classification {
    if err.is_transport() {
        return Classification::Retryable;
    }
    match err.status() {
        Some(status) => classify_status(kind, Some(status)),
        // Decode and configuration errors won't fix themselves.
        None => Classification::Permanent,
    }
}

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Overall budget across all attempts of one call.
    pub deadline: Duration,
    /// Each delay is drawn from `interval * [1 - f, 1 + f]`.
    pub randomization_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.retry_initial_interval_ms),
            multiplier: config.retry_multiplier,
            max_interval: Duration::from_millis(config.retry_max_interval_ms),
            deadline: config.api_deadline(),
            randomization_factor: 0.5,
        }
    }

    /// Same policy without jitter.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.randomization_factor = 0.0;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Un-jittered interval before retry number `retry` (0-based).
    #[must_use]
    pub fn interval_for(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        let ms = self.initial_interval.as_millis() as f64 * self.multiplier.powi(exp);
        let capped = ms.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay before retry number `retry` after `err`.
    ///
    /// A 429 carrying `Retry-After` waits that long, capped at `max_interval`.
    #[must_use]
    pub fn delay_for(&self, retry: u32, err: &OktaClientError) -> Duration {
        if let OktaClientError::RateLimited {
            retry_after_secs: Some(secs),
        } = err
        {
            return Duration::from_secs(*secs).min(self.max_interval);
        }
        self.jitter(self.interval_for(retry))
    }

    fn jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor <= 0.0 {
            return interval;
        }
        let ms = interval.as_millis() as f64;
        let delta = ms * self.randomization_factor;
        let low = (ms - delta).max(0.0);
        let high = ms + delta;
        let drawn = rand::thread_rng().gen_range(low..=high);
        Duration::from_millis(drawn as u64)
    }
}

/// Runs fallible Okta calls under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryHarness {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RetryHarness {
    #[must_use]
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run a read. A 404 surfaces as [`ReconcileError::NotFound`].
    pub async fn read<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        f: F,
    ) -> ReconcileResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OktaClientResult<T>>,
    {
        self.execute(cancel, operation, OperationKind::Read, f)
            .await?
            .ok_or_else(|| not_found(operation))
    }

    /// Run a create, replace or lifecycle call.
    pub async fn mutate<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        f: F,
    ) -> ReconcileResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OktaClientResult<T>>,
    {
        self.execute(cancel, operation, OperationKind::Mutate, f)
            .await?
            .ok_or_else(|| not_found(operation))
    }

    /// Run a delete. Returns `false` when the target was already gone.
    pub async fn delete<F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        f: F,
    ) -> ReconcileResult<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OktaClientResult<()>>,
    {
        Ok(self
            .execute(cancel, operation, OperationKind::Delete, f)
            .await?
            .is_some())
    }

    /// `Ok(None)` means the failure was suppressed.
    async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        kind: OperationKind,
        mut f: F,
    ) -> ReconcileResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OktaClientResult<T>>,
    {
        let start = self.clock.now();
        let mut retry: u32 = 0;
        let mut last_error: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled { last_error });
            }

            let error = match f().await {
                Ok(value) => {
                    if retry > 0 {
                        debug!(
                            operation,
                            attempts = retry + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(Some(value));
                }
                Err(error) => error,
            };

            match classify(kind, &error) {
                Classification::Suppressed => {
                    debug!(operation, "Target already absent, treating as success");
                    return Ok(None);
                }
                Classification::Permanent => {
                    return Err(ReconcileError::from_client(operation, &error));
                }
                Classification::Retryable => {}
            }

            let delay = self.policy.delay_for(retry, &error);
            let elapsed = self.clock.now().saturating_duration_since(start);
            if elapsed + delay > self.policy.deadline {
                warn!(
                    operation,
                    attempts = retry + 1,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "Retry deadline exhausted"
                );
                return Err(ReconcileError::from_client(operation, &error));
            }

            debug!(
                operation,
                attempt = retry + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after transient error"
            );

            let message = error.to_string();
            if !interruptible_sleep(self.clock.as_ref(), cancel, delay).await {
                return Err(ReconcileError::Cancelled {
                    last_error: Some(message),
                });
            }
            last_error = Some(message);
            retry += 1;
        }
    }
}

fn not_found(operation: &str) -> ReconcileError {
    ReconcileError::NotFound {
        operation: operation.to_string(),
        message: "resource not found".to_string(),
    }
}
