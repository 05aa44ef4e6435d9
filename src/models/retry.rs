//! Retry policy (C4): a pure value type, per spec.md §4.4 and §9 — tests
//! pin the random component by injecting a jitter fraction of `0`.

use std::time::Duration;

use crate::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Upper bound of the full-jitter window added to the backoff delay,
    /// expressed as a fraction of the base delay (default adds up to
    /// +100ms at base_delay=1s, i.e. 0.1).
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt number (1-indexed: the delay
    /// before retrying after attempt 1 failed). `jitter` must be in
    /// `[0, 1]`; callers inject a PRNG draw, tests inject `0.0`.
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.factor.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jitter_window = self.base_delay.as_secs_f64() * self.jitter_fraction;
        let jittered = capped + jitter_window * jitter.clamp(0.0, 1.0);
        Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64() + jitter_window))
    }

    /// Whether this error is worth a further attempt under this policy,
    /// given attempts already made (1-indexed).
    pub fn should_retry(&self, attempts_made: u32, error: &ApiError) -> bool {
        attempts_made < self.max_attempts && error.transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, 0.0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, 0.0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, 0.0), Duration::from_secs(4));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = RetryPolicy::default();
        let delay = policy.delay_for(10, 0.0);
        assert!(delay.as_secs_f64() <= policy.max_delay.as_secs_f64() + 0.2);
    }

    #[test]
    fn jitter_only_adds_never_subtracts() {
        let policy = RetryPolicy::default();
        let base = policy.delay_for(1, 0.0);
        let jittered = policy.delay_for(1, 1.0);
        assert!(jittered >= base);
        assert!(jittered.as_secs_f64() <= base.as_secs_f64() + 0.1 + 1e-9);
    }

    #[test]
    fn should_retry_respects_max_attempts_and_transience() {
        let policy = RetryPolicy::default();
        let transient = ApiError::Timeout {
            model: "gfs".into(),
        };
        let fatal = ApiError::Decode {
            model: "gfs".into(),
            reason: "bad json".into(),
        };
        assert!(policy.should_retry(1, &transient));
        assert!(policy.should_retry(2, &transient));
        assert!(!policy.should_retry(3, &transient));
        assert!(!policy.should_retry(1, &fatal));
    }
}
