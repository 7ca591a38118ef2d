//! Capped exponential backoff
//!
//! How many attempts a job gets is the queue store's business
//! ([`PrintQueueStore::with_max_attempts`](super::PrintQueueStore::with_max_attempts));
//! this only decides how long to wait between them.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failure: `base * 2^(attempt-1)`, capped
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_curve() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(32));
        assert_eq!(policy.delay(6), Duration::from_secs(60));
        assert_eq!(policy.delay(200), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(750),
            max_delay: Duration::from_secs(10),
        };
        let delays: Vec<_> = (0..40).map(|n| policy.delay(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= policy.max_delay));
    }
}
