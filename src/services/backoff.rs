//! Reconnect policy: bounded exponential backoff after unexpected closures.

use std::time::Duration;

pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What to do after the connection closed unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Nobody is subscribed; stay closed.
    Idle,
    /// Try again after `delay`. `attempt` is 1-based.
    Retry { attempt: u32, delay: Duration },
    /// Attempt budget used up.
    Exhausted { attempts: u32 },
}

/// Attempt counter plus the limits it is checked against.
///
/// The counter only resets on a successful open, so a run of failed
/// handshakes keeps counting up until the budget is gone.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_BASE_DELAY_MS), DEFAULT_MAX_ATTEMPTS)
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Connection opened: start the next failure run from zero.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Advance the state machine for one unexpected closure.
    pub fn on_unexpected_close(&mut self, subscribers: usize) -> ReconnectDecision {
        if subscribers == 0 {
            return ReconnectDecision::Idle;
        }
        if self.attempts >= self.max_attempts {
            return ReconnectDecision::Exhausted {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: self.delay_for(self.attempts),
        }
    }

    /// `base_delay * 2^(attempt - 1)`, saturating.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}
