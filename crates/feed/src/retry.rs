//! Bounded, cancellable retries with exponential backoff.

use crate::error::{ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vigil_config::RetryConfig;

/// How often, and how patiently, a failing operation is retried.
///
/// Only errors whose kind [is retryable](ErrorKind::is_retryable) are
/// retried; anything else is returned immediately. The cancellation token is
/// checked before every attempt and interrupts any backoff sleep.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    cancel: CancellationToken,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            multiplier: config.multiplier,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Never retry: one attempt, then fail.
    pub fn none() -> Self {
        Self {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Stop retrying (and sleeping) as soon as `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Delay before attempt `attempt + 1`, given that attempt number
    /// `attempt` (1-based) just failed.
    // Millisecond precision is plenty for backoff.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        if !delay.is_finite() || delay >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(delay.max(0.0).round() as u64)
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// attempts, or is cancelled.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                exn::bail!(ErrorKind::Cancelled);
            }
            attempt = attempt.saturating_add(1);
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };
            if self.max_attempts.is_some_and(|max| attempt >= max) {
                return Err(err.raise(ErrorKind::RetriesExhausted(attempt)));
            }
            let delay = self.delay_after(attempt);
            let kind: &ErrorKind = &err;
            tracing::warn!(attempt, delay = ?delay, error = %kind, "Retrying after transient failure");
            tokio::select! {
                () = self.cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
                () = tokio::time::sleep(delay) => {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::Exn;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy::from(&RetryConfig {
            max_attempts,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
        })
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = policy(None);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
        assert_eq!(policy.delay_after(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_attempts_stop() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy(Some(3))
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Exn::from(ErrorKind::Status(503)))
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RetriesExhausted(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let value = policy(None)
            .run(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                    return Err(Exn::from(ErrorKind::Network));
                }
                Ok(42)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy(Some(5))
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Exn::from(ErrorKind::NoSuchShard(9)))
            })
            .await;
        assert!(matches!(&*result.unwrap_err(), ErrorKind::NoSuchShard(9)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy(None)
            .with_cancellation(token)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(&*result.unwrap_err(), ErrorKind::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let policy = policy(None).with_cancellation(token.clone());
        let token = &token;
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy
            .run(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                    token.cancel();
                }
                Err(Exn::from(ErrorKind::Network))
            })
            .await;
        assert!(matches!(&*result.unwrap_err(), ErrorKind::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
