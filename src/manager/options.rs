//! Retry policy and default endpoints.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use live_counter::RetryPolicy;
//!
//! let policy = RetryPolicy::new()
//!     .with_base_interval(Duration::from_secs(2))
//!     .with_max_attempts(5);
//!
//! assert_eq!(policy.delay_for(3), Duration::from_secs(6));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Production count endpoints, tried in order.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "wss://api.opennotification.org/ws/count",
    "wss://api.opennotification.com/ws/count",
];

const DEFAULT_BASE_INTERVAL_MS: u64 = 5_000;
const DEFAULT_MAX_INTERVAL_MS: u64 = 30_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_FAILOVER_DELAY_MS: u64 = 1_000;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Linear, capped backoff for reconnecting to the same endpoint.
///
/// The n-th consecutive retry waits `min(base_interval * n, max_interval)`.
/// After `max_attempts` retries the manager gives up. Moving to the next
/// endpoint after an abnormal closure waits `failover_delay` and does not
/// count as a retry.
///
/// Deserializes from camelCase JSON; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Delay unit for the linear backoff, in milliseconds.
    pub base_interval_ms: u64,

    /// Upper bound on any single retry delay, in milliseconds.
    pub max_interval_ms: u64,

    /// Number of retries before giving up.
    pub max_attempts: u32,

    /// Delay before trying the next endpoint, in milliseconds.
    pub failover_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl RetryPolicy {
    /// Creates the default policy: 5s steps, 30s cap, 10 attempts, 1s failover.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base_interval_ms: DEFAULT_BASE_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            failover_delay_ms: DEFAULT_FAILOVER_DELAY_MS,
        }
    }

    /// Loads a policy from JSON and validates it.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document does not parse
    /// - [`Error::Config`] if the values are inconsistent
    pub fn from_json(text: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(text)?;
        policy.validate()?;
        Ok(policy)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RetryPolicy {
    /// Sets the backoff step.
    #[inline]
    #[must_use]
    pub fn with_base_interval(mut self, interval: Duration) -> Self {
        self.base_interval_ms = duration_ms(interval);
        self
    }

    /// Sets the backoff cap.
    #[inline]
    #[must_use]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval_ms = duration_ms(interval);
        self
    }

    /// Sets the number of retries before giving up.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay before trying the next endpoint.
    #[inline]
    #[must_use]
    pub fn with_failover_delay(mut self, delay: Duration) -> Self {
        self.failover_delay_ms = duration_ms(delay);
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl RetryPolicy {
    /// Returns the delay for the given 1-based retry attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self
            .base_interval_ms
            .saturating_mul(u64::from(attempt))
            .min(self.max_interval_ms);
        Duration::from_millis(ms)
    }

    /// Returns the endpoint failover delay.
    #[inline]
    #[must_use]
    pub const fn failover_delay(&self) -> Duration {
        Duration::from_millis(self.failover_delay_ms)
    }

    /// Checks the policy for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base interval is zero or the cap is
    /// below the base interval.
    pub fn validate(&self) -> Result<()> {
        if self.base_interval_ms == 0 {
            return Err(Error::config("retry base interval must be greater than zero"));
        }

        if self.max_interval_ms < self.base_interval_ms {
            return Err(Error::config(format!(
                "retry max interval ({}ms) is below the base interval ({}ms)",
                self.max_interval_ms, self.base_interval_ms
            )));
        }

        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
