//! # Exponential Backoff
//!
//! Requeue delays for failed reconciles. Each consecutive failure doubles
//! the delay, starting at `min_seconds` and capped at `max_seconds`.
//! Sequence with the controller defaults: 5s, 10s, 20s, 40s, ... 300s (max).

use std::time::Duration;

/// Capped exponential backoff calculator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// First delay, also the value after a reset
    min_seconds: u64,
    /// Delay handed out by the next call
    current_seconds: u64,
    /// Upper bound for any delay
    max_seconds: u64,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `min_seconds` and never exceeding `max_seconds`
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        let min_seconds = min_seconds.max(1);
        Self {
            min_seconds,
            current_seconds: min_seconds.min(max_seconds),
            max_seconds,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;
        self.current_seconds = self.current_seconds.saturating_mul(2).min(self.max_seconds);
        result
    }

    /// Get the next backoff duration as a `Duration` and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current_seconds = self.min_seconds.min(self.max_seconds);
    }
}
