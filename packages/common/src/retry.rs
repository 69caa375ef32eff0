use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::{BackoffKind, RetryConfig};

/// Errors that know whether another attempt could succeed.
pub trait Transient {
    /// `true` for failures worth retrying (network drops, timeouts).
    fn is_transient(&self) -> bool;
}

/// Which delay applies to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Standard,
    /// Auth-related calls wait longer between attempts.
    Auth,
}

/// Bounded retry policy: a fixed number of attempts with a delay in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u8,
    delay: Duration,
    auth_delay: Duration,
    backoff: BackoffKind,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
            auth_delay: Duration::from_millis(config.auth_delay_ms),
            backoff: config.backoff,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            auth_delay: Duration::ZERO,
            backoff: BackoffKind::Fixed,
            max_delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, class: OperationClass, attempt: u8) -> Duration {
        let base = match class {
            OperationClass::Standard => self.delay,
            OperationClass::Auth => self.auth_delay,
        };
        match self.backoff {
            BackoffKind::Fixed => base,
            BackoffKind::Exponential => calculate_backoff(
                attempt,
                base.as_millis() as u64,
                self.max_delay.as_millis() as u64,
            ),
        }
    }

    /// Run `f` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        class: OperationClass,
        mut f: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut attempt: u8 = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(operation, attempts = attempt, error = %e, "Retries exhausted");
                        return Err(e);
                    }
                    let delay = self.delay_for(class, attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// Formula: `min(base_ms * 2^(attempt-1) + jitter, max_ms)` (0-25% jitter)
pub fn calculate_backoff(attempt: u8, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u64.saturating_pow((attempt - 1) as u32);
    let delay_ms = base_ms.saturating_mul(exp_factor);

    let jitter = if delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    let total_delay = delay_ms.saturating_add(jitter).min(max_ms);
    Duration::from_millis(total_delay)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug)]
    struct FakeError {
        transient: bool,
    }

    impl Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake error (transient: {})", self.transient)
        }
    }

    impl Transient for FakeError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn fast_policy(max_attempts: u8) -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            max_attempts,
            delay_ms: 1,
            auth_delay_ms: 2,
            ..RetryConfig::default()
        })
    }

    #[test]
    fn test_backoff_doubles_within_jitter_and_cap() {
        for (attempt, floor) in [(1u8, 500u128), (2, 1000), (3, 2000)] {
            let ms = calculate_backoff(attempt, 500, 30_000).as_millis();
            assert!(ms >= floor && ms <= floor + floor / 4, "attempt {attempt}: {ms}");
        }
        assert_eq!(calculate_backoff(12, 500, 30_000), Duration::from_millis(30_000));
        assert_eq!(calculate_backoff(0, 500, 30_000), Duration::ZERO);
    }

    #[test]
    fn test_fixed_delay_uses_class() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(OperationClass::Standard, 2),
            Duration::from_secs(2)
        );
        assert_eq!(policy.delay_for(OperationClass::Auth, 1), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        });
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_run_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, FakeError> = fast_policy(3)
            .run("flaky", OperationClass::Standard, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(FakeError { transient: true })
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = fast_policy(3)
            .run("down", OperationClass::Standard, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError { transient: true })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = fast_policy(3)
            .run("invalid", OperationClass::Auth, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError { transient: false })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
