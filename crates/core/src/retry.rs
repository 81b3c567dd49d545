//! Exponential-backoff parameters shared by every outbound call.

use std::time::Duration;

/// Default number of attempts (the first call plus two retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Default backoff with a custom attempt count (clamped to at least 1).
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Calculate the next backoff delay from the current delay.
    ///
    /// The result is clamped to [`RetryPolicy::max_delay`].
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }

    /// The sleeps between consecutive attempts (`max_attempts - 1` values).
    pub fn delays(&self) -> Vec<Duration> {
        let retries = self.max_attempts.max(1) - 1;
        let mut delays = Vec::with_capacity(retries as usize);
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 0..retries {
            delays.push(delay);
            delay = self.next_delay(delay);
        }
        delays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(policy.next_delay(Duration::from_secs(8)), Duration::from_secs(10));
    }

    #[test]
    fn delays_follow_exponential_sequence() {
        let policy = RetryPolicy::with_max_attempts(5);
        let secs: Vec<u64> = policy.delays().iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 2, 4, 8]);
    }

    #[test]
    fn single_attempt_has_no_delays() {
        assert!(RetryPolicy::with_max_attempts(1).delays().is_empty());
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts, 1);
    }
}
