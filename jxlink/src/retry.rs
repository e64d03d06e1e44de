//! Retry-on-timeout policy for commands

use std::time::Duration;

/// How often to re-send a command that got no reply
///
/// Each attempt is a full correlated exchange with its own timeout. Used
/// with [`Session::send_with_retry`](crate::Session::send_with_retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of sends, including the first
    pub attempts: u32,

    /// Correlation window for each send
    pub per_attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, per_attempt_timeout: Duration) -> Self {
        Self {
            attempts,
            per_attempt_timeout,
        }
    }

    /// A single attempt
    pub fn once(timeout: Duration) -> Self {
        Self::new(1, timeout)
    }

    /// Longest time a command can take under this policy
    pub fn total_timeout(&self) -> Duration {
        self.per_attempt_timeout.saturating_mul(self.attempts.max(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}
