use std::time::{Duration, Instant};

/// An absolute deadline that is checked on tick rather than awaited.
///
/// [`poll`](Self::poll) is edge-triggered: it returns `true` on the first
/// call at or after the deadline and `false` on every call after that, no
/// matter how often the owner keeps polling. Re-arming is done by
/// replacing the deadline, which implicitly cancels the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    fired: bool,
}

impl Deadline {
    /// A deadline `duration` after `now`.
    pub fn after(now: Instant, duration: Duration) -> Self {
        Self {
            at: now + duration,
            fired: false,
        }
    }

    /// The absolute instant this deadline expires.
    pub fn at(&self) -> Instant {
        self.at
    }

    /// Time left until expiry, zero once passed.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.at.saturating_duration_since(now)
    }

    /// Level check: `true` for every `now` at or past the deadline.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.at
    }

    /// Edge check: `true` exactly once, on the first poll that finds the
    /// deadline due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.fired || !self.is_due(now) {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
