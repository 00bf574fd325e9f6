//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// How often and how patiently to retry a fallible async operation.
///
/// The delay after failed attempt `n` (1-based) is `base_delay * 2^(n-1)`,
/// so three attempts wait `base + 2*base` in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// Create a policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Errors for which
    /// `is_transient` returns `false` are returned immediately. On exhaustion
    /// the last error is returned together with the attempt count.
    ///
    /// # Errors
    ///
    /// Returns `(attempts, error)` for the final failure.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<T, (u32, E)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err((attempt, e)),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Flaky,
        Fatal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn transient(e: &TestError) -> bool {
        *e == TestError::Flaky
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result = policy
            .run(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(TestError::Flaky)
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                transient,
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(500 + 1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let result: Result<(), _> = policy
            .run(|_| async { Err(TestError::Flaky) }, transient)
            .await;
        assert_eq!(result.unwrap_err(), (3, TestError::Flaky));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Fatal) }
                },
                transient,
            )
            .await;
        assert_eq!(result.unwrap_err(), (1, TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
