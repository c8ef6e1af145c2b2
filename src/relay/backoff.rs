//! Reconnect Backoff
//!
//! Exponential delay policy for outbound connections. One instance per
//! connection loop; `next()` before each attempt, `reset()` after a
//! successful connect.

use std::time::Duration;

// == Backoff ==
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Delay before the next attempt: `base * 2^attempt`, capped at `max`.
    pub fn next(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Restarts the sequence after a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
