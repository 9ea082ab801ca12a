// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry delays for the long-poll loop.
//!
//! Only transport failures are retried with a delay; protocol errors such as
//! an invalid channel or lost notifications have their own immediate
//! recovery. The policy decides how long to back off before the next poll.
//!
//! - [`FixedDelay`]: the same period every time (the default)
//! - [`ExponentialBackoff`]: doubling delays up to a cap

use std::fmt;
use std::time::Duration;

/// Decides how long to wait before retrying after a transport failure.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Returns the name of this policy for logging.
    fn name(&self) -> &str;

    /// Delay before retry number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

// =============================================================================
// Fixed Delay
// =============================================================================

/// Waits the same period before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    period: Duration,
}

impl FixedDelay {
    /// Creates a fixed delay policy.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RetryPolicy for FixedDelay {
    fn name(&self) -> &str {
        "fixed_delay"
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.period
    }
}

// =============================================================================
// Exponential Backoff
// =============================================================================

/// Delay formula: `min(initial * multiplier^(attempt-1), max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    /// Creates a backoff policy doubling from `initial` up to `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
        }
    }

    /// Sets the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential_backoff"
    }

    fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}
