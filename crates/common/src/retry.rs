use serde::Deserialize;
use std::time::Duration;

/// Exponential backoff policy for fallible resource acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after the first failure, doubled on every following failure.
    pub base_delay_ms: u64,
    /// Upper bound for a single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(20));
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Retry a function with exponential backoff
///
/// # Arguments
/// * `f` - The function to retry
/// * `policy` - Attempt count and delay bounds
/// * `operation_name` - Human-readable name for logging
pub fn retry_with_backoff<F, T, E>(mut f: F, policy: RetryPolicy, operation_name: &str) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match f() {
            Ok(result) => return Ok(result),
            Err(e) if attempt + 1 < attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms...",
                    operation_name,
                    attempt + 1,
                    attempts,
                    e,
                    delay.as_millis()
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    "{} failed after {} attempts: {}",
                    operation_name,
                    attempts,
                    e
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 500,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(500));
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result: Result<u32, String> = retry_with_backoff(
            || {
                calls += 1;
                if calls < 3 { Err("busy".into()) } else { Ok(calls) }
            },
            fast_policy(5),
            "test op",
        );

        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), String> = retry_with_backoff(
            || {
                calls += 1;
                Err(format!("failure {}", calls))
            },
            fast_policy(4),
            "test op",
        );

        assert_eq!(calls, 4);
        assert_eq!(result, Err("failure 4".to_string()));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _: Result<(), &str> = retry_with_backoff(
            || {
                calls += 1;
                Err("nope")
            },
            fast_policy(0),
            "test op",
        );

        assert_eq!(calls, 1);
    }
}
