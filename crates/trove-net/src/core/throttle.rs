use std::time::Duration;

use tokio::time::Instant;

/// Minimum-interval gate in front of the transport.
///
/// The gate holds no timers of its own; callers pass the current instant and
/// decide what to do when it is closed. A zero interval keeps it open.
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    interval:         Duration,
    last_dispatch_at: Option<Instant>,
}

impl ThrottleGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch_at: None,
        }
    }

    pub fn interval(&self) -> Duration { self.interval }

    pub fn last_dispatch_at(&self) -> Option<Instant> { self.last_dispatch_at }

    /// Takes effect at the next [`is_open`](Self::is_open) call.
    pub fn set_interval(&mut self, interval: Duration) { self.interval = interval; }

    pub fn is_open(&self, now: Instant) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        match self.last_dispatch_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Record a dispatch. Applies to the first dispatch too.
    pub fn mark_dispatched(&mut self, now: Instant) { self.last_dispatch_at = Some(now); }

    /// Earliest instant at which the gate will be open, never before `now`.
    pub fn next_open_at(&self, now: Instant) -> Instant {
        if self.interval.is_zero() {
            return now;
        }
        match self.last_dispatch_at {
            None => now,
            Some(last) => (last + self.interval).max(now),
        }
    }

    /// Restart the interval from `now` as if a dispatch had just happened.
    pub fn restart(&mut self, now: Instant) { self.last_dispatch_at = Some(now); }
}
