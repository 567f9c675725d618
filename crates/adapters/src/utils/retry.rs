//! Retry policy for REST transport errors
//!
//! Only transient network faults are retried; venue-level rejections and
//! decoding failures surface immediately.

use std::time::Duration;

/// Configuration for transport retries
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total number of attempts, including the first try
    pub max_attempts: u32,

    /// Base back-off; attempt `n` waits `n * backoff` before the next try
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Creates a configuration with no retries (fail fast)
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Back-off to sleep after a failed attempt (1-based), linear schedule.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Whether an error rendering describes a transient network fault worth
/// retrying. Matches timeouts, connection resets, and truncated streams.
pub fn is_transient(error_text: &str) -> bool {
    let text = error_text.to_ascii_lowercase();
    text.contains("timeout")
        || text.contains("timed out")
        || text.contains("connection reset")
        || text.contains("eof")
}
