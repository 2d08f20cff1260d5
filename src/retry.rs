use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Result, UploadError};

/// Retry policy for transient storage request failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Exponential backoff for the given 0-based retry attempt, capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay_ms
            .saturating_mul(1u64 << attempt.min(31));
        Duration::from_millis(base.min(self.max_delay_ms))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// exhausts the policy or is cancelled.
///
/// # Arguments
///
/// * `policy` - Retry limits and backoff
/// * `cancel_token` - Cancels the backoff wait
/// * `what` - Short description of the request used in logs
/// * `operation` - Produces a fresh attempt each time it is called
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel_token: &CancellationToken,
    what: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel_token.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            "{} failed, retrying in {:?} (attempt {}/{}): {}",
            what,
            delay,
            attempt + 1,
            policy.max_retries,
            err
        );

        tokio::select! {
            _ = cancel_token.cancelled() => return Err(UploadError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn server_busy() -> UploadError {
        UploadError::from_status(503, "server busy")
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(6400));
        assert_eq!(policy.delay_for(10), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn retries_transient_error_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&fast_policy(3), &CancellationToken::new(), "put", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(server_busy())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(assert_ok!(result), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> =
            with_retry(&fast_policy(2), &CancellationToken::new(), "put", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_busy())
            })
            .await;

        assert_err!(&result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn none_policy_makes_a_single_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> =
            with_retry(&RetryPolicy::none(), &CancellationToken::new(), "put", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_busy())
            })
            .await;

        assert!(assert_err!(result).is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_authentication_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> =
            with_retry(&fast_policy(5), &CancellationToken::new(), "put", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UploadError::from_status(403, "signature mismatch"))
            })
            .await;

        assert!(assert_err!(result).is_authentication());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(&fast_policy(5), &token, "put", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(UploadError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
