//! Cooperative cancellation.

use std::time::Duration;

use crate::clock::Clock;

pub use tokio_util::sync::CancellationToken;

/// Sleep on `clock` unless `cancel` fires first.
///
/// Returns `true` when the full duration elapsed and `false` when the sleep
/// was interrupted.
pub async fn interruptible_sleep(
    clock: &dyn Clock,
    cancel: &CancellationToken,
    duration: Duration,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = clock.sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_cancellation() {
        let cancel = CancellationToken::new();
        assert!(interruptible_sleep(&TokioClock, &cancel, Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let completed = interruptible_sleep(&TokioClock, &cancel, Duration::from_secs(60)).await;
        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!interruptible_sleep(&TokioClock, &cancel, Duration::from_secs(3600)).await);
    }
}
