//! Retry policy and failure classification.

use std::time::Duration;

use crate::error::FetchError;

/// Default attempt budget, first attempt included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff floor.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Backoff ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

// ============================================================================
// Classification
// ============================================================================

/// Whether a failed attempt may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient failure; try again after a backoff.
    Retryable,
    /// Permanent failure; propagate immediately.
    Fatal,
}

/// Classifies an error.
///
/// 5xx statuses, transport failures and timeouts are retryable. Everything
/// else, including 4xx statuses, is fatal.
pub fn classify(error: &FetchError) -> RetryDecision {
    match error {
        FetchError::Status { status, .. } if (500..600).contains(status) => {
            RetryDecision::Retryable
        }
        FetchError::Transport { .. } | FetchError::Timeout { .. } => RetryDecision::Retryable,
        _ => RetryDecision::Fatal,
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, first attempt included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the default backoff bounds.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the backoff floor and ceiling.
    #[must_use]
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max.max(initial);
        self
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns true if another attempt is allowed after `attempt` failures.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

// ============================================================================
// Tests
// ============================================================================
