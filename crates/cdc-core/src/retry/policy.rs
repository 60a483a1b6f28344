use super::classify::is_transient;
use crate::config::RetryConfig;
use crate::fetcher::FetchError;
use std::time::Duration;

/// How many times to attempt one blob and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per blob, counting the first. 1 disables retry.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles on every further failure.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Policy for the `[retry]` config section; a missing section means a single attempt.
    pub fn from_config(cfg: Option<&RetryConfig>) -> Self {
        match cfg {
            None => Self::single_attempt(),
            Some(c) => Self {
                max_attempts: c.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(c.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(c.max_delay_secs),
            },
        }
    }

    /// Delay before the next attempt after attempt number `attempt` (1-based)
    /// failed with `err`, or `None` to give up.
    pub fn next_delay(&self, attempt: u32, err: &FetchError) -> Option<Duration> {
        if attempt >= self.max_attempts || !is_transient(err) {
            return None;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}
