use crate::core::{Checker, ValidationOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_secs(2);
pub const DEFAULT_BACKOFF_BASE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_wait: Duration,
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_wait: DEFAULT_INITIAL_WAIT,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`: `initial_wait * backoff_base^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.initial_wait
            .mul_f64(self.backoff_base.powi(attempt as i32))
    }
}

/// Retries infrastructure failures of the wrapped checker with exponential
/// backoff. Outcomes (including `bounced` and `error`) are returned as-is.
pub struct RetryingChecker<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: Checker> RetryingChecker<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: Checker> Checker for RetryingChecker<C> {
    async fn check(&self, address: &str) -> Result<ValidationOutcome> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.inner.check(address).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt + 1 < attempts => {
                    let wait = self.policy.delay_after(attempt);
                    tracing::debug!(
                        "Check of {} failed (attempt {}/{}): {}; retrying in {:?}",
                        address,
                        attempt + 1,
                        attempts,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ValidationStatus;
    use crate::utils::error::CheckError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyChecker {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyChecker {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(times),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Checker for FlakyChecker {
        async fn check(&self, _address: &str) -> Result<ValidationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(CheckError::checker("Connection failed"));
            }
            Ok(ValidationOutcome::valid("Mailbox exists"))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_wait: Duration::from_millis(1),
            backoff_base: 1.5,
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_after(0), Duration::from_secs(2));
        assert_eq!(policy.delay_after(1), Duration::from_secs(3));
        assert_eq!(policy.delay_after(2), Duration::from_millis(4500));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let checker = RetryingChecker::new(FlakyChecker::failing(2), fast_policy(3));

        let outcome = checker.check("a@gmail.com").await.unwrap();

        assert_eq!(outcome.status, ValidationStatus::Valid);
        assert_eq!(checker.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let checker = RetryingChecker::new(FlakyChecker::failing(5), fast_policy(3));

        let err = checker.check("a@gmail.com").await.unwrap_err();

        assert!(matches!(err, CheckError::Checker { .. }));
        assert_eq!(checker.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_checks_once() {
        let checker = RetryingChecker::new(FlakyChecker::failing(0), fast_policy(0));

        assert!(checker.check("a@gmail.com").await.is_ok());
        assert_eq!(checker.inner.calls.load(Ordering::SeqCst), 1);
    }
}
