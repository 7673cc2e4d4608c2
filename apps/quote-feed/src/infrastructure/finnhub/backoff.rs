//! Reconnect Backoff Policy
//!
//! Exponential backoff with jitter for reconnection timing. The policy is
//! pure state: it only computes delays; executing and cancelling the wait
//! is the connection actor's job, which keeps the attempt ceiling and reset
//! invariants unit-testable without timer mocking.

use std::time::Duration;

use rand::Rng;

/// Configuration for backoff behavior.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry attempt.
    pub initial_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
    /// Growth factor per attempt (2.0 doubles the delay each time).
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempt ceiling (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0, // Unlimited
        }
    }
}

/// Retry state for one connection session.
///
/// Lifecycle: created with the connection, `reset()` on every successful
/// connect, one `next_delay()` per scheduled retry. Once the attempt
/// ceiling is reached the policy is inert: `next_delay` refuses with
/// `None` and the caller logs and stops scheduling. The policy itself never
/// fails.
///
/// # Example
///
/// ```rust
/// use quote_feed::{BackoffConfig, BackoffPolicy};
///
/// let mut policy = BackoffPolicy::new(BackoffConfig::default());
///
/// // Delay for the first attempt
/// let delay = policy.next_delay();
/// assert!(delay.is_some());
///
/// // Connection succeeded
/// policy.reset();
/// ```
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    attempt: u32,
}

impl BackoffPolicy {
    /// Create a new policy with zero attempts consumed.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Compute the delay for the next retry and consume one attempt.
    ///
    /// The delay is `min(initial * multiplier^attempt, max_delay)` with
    /// jitter applied. Returns `None` once the attempt ceiling is reached;
    /// callers must not schedule past that point.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.has_reached_max_attempts() {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = self.config.initial_delay.as_millis() as f64;
        #[allow(clippy::cast_possible_wrap)]
        let scaled = base_millis * self.config.multiplier.powi(self.attempt as i32);
        #[allow(clippy::cast_precision_loss)]
        let max_millis = self.config.max_delay.as_millis() as f64;
        let capped = if scaled.is_finite() {
            scaled.min(max_millis)
        } else {
            max_millis
        };

        self.attempt += 1;

        Some(self.apply_jitter(capped))
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts consumed since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt
    }

    /// Whether the attempt ceiling has been reached.
    #[must_use]
    pub const fn has_reached_max_attempts(&self) -> bool {
        self.config.max_attempts > 0 && self.attempt >= self.config.max_attempts
    }

    /// Apply ±jitter to a delay in milliseconds.
    fn apply_jitter(&self, millis: f64) -> Duration {
        let jittered = if self.config.jitter_factor > 0.0 {
            let range = millis * self.config.jitter_factor;
            let jitter: f64 = rand::rng().random_range(-range..=range);
            (millis + jitter).max(1.0)
        } else {
            millis
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(jittered as u64)
    }
}

// =============================================================================
// Tests
// =============================================================================
