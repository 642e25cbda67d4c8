//! Exponential reconnect backoff.
//!
//! ```text
//! attempt:  1    2    3    4    5     6     7 …
//! delay:    1s   2s   4s   8s   16s   30s   30s …   (base 1s, cap 30s)
//! ```
//!
//! [`Backoff::reset`] is called after every successful connect, so the next
//! failure starts from the base delay again.

use std::time::Duration;

use crate::domain::config::{DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX};

/// Doubling delay sequence with an upper bound.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.min(max);
        Self {
            base,
            max,
            next: base,
            attempts: 0,
        }
    }

    /// Returns the delay to wait before the next attempt and advances the
    /// sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Starts over from the base delay.
    pub fn reset(&mut self) {
        self.next = self.base;
        self.attempts = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(list: &[u64]) -> Vec<Duration> {
        list.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_default_sequence_doubles_then_caps_at_30s() {
        // Arrange
        let mut backoff = Backoff::default();

        // Act
        let delays: Vec<Duration> = (0..8).map(|_| backoff.next_delay()).collect();

        // Assert
        assert_eq!(delays, secs(&[1, 2, 4, 8, 16, 30, 30, 30]));
    }

    #[test]
    fn test_reset_starts_from_base_again() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.attempts(), 1);
    }

    #[test]
    fn test_base_larger_than_cap_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(60), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_attempts_counts_consecutive_failures() {
        let mut backoff = Backoff::default();
        for _ in 0..3 {
            backoff.next_delay();
        }
        assert_eq!(backoff.attempts(), 3);
    }
}
