//! Retry policy with exponential backoff
//!
//! The provider ladder waits `min(base * 2^(attempt-1), max_backoff)` before
//! every attempt after the first. There is no jitter.

use crate::config::AnalyzerConfig;
use std::time::Duration;

/// Upper bound for a single backoff pause
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per provider
    pub max_attempts: u32,

    /// Pause before the second attempt
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(5),
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy capped at [`MAX_BACKOFF`]
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Policy matching the configured retry settings
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay)
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Pause before the attempt with the given zero-based index
    ///
    /// Index 0 starts immediately; index `n` waits `initial * 2^(n-1)`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        2u32.checked_pow(attempt - 1)
            .and_then(|factor| self.initial_backoff.checked_mul(factor))
            .map_or(self.max_backoff, |backoff| backoff.min(self.max_backoff))
    }

    /// First failed-attempt index at which the primary model gives way to
    /// the fallback model
    pub fn fallback_threshold(&self) -> u32 {
        self.max_attempts / 2
    }
}
