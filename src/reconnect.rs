//! Reconnect policies.
//!
//! The connection actor consults a policy after every transition to `Closed`.
//! Policies are a strategy seam: swapping "stay closed" for "bounded backoff"
//! never touches the state machine itself.

use std::time::Duration;

/// Default spacing between reconnect attempts.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Default cap on consecutive failed attempts.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Decides whether and when to dial again after the connection closes.
pub trait ReconnectPolicy: Send + Sync {
    /// Delay before reconnect attempt `attempt` (0-based, reset on every
    /// successful open), or `None` to stay closed.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Never reconnects; the session stays `Closed` until the caller dials again.
///
/// This is the default policy: disconnection is surfaced through the state
/// watch and recovery is a manual `connect()` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Fixed-delay reconnect, bounded by an attempt counter.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self {
            delay: RECONNECT_INTERVAL,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy for FixedBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.delay)
    }
}
