//! Clocks and the start/settle activity timer.
//!
//! Every periodic activity of the main loop is a [`PeriodicActivity`]:
//!
//! ```text
//!   Idle ──due──▶ Active{since} ──settle elapsed──▶ Cooling ──due──▶ Active ...
//! ```
//!
//! Starting an activity stamps its last-start time; settling only clears the
//! indicator, so the interval is measured start to start.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Minimum time an indicator (watchdog pat, LED) stays active.
pub const SETTLE_MS: u64 = 200;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for deterministic tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Phase of a start/settle activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Never started since boot.
    Idle,
    /// Started at `since`, indicator held.
    Active { since: u64 },
    /// Settled, waiting for the next interval.
    Cooling,
}

#[derive(Debug, Clone)]
pub struct PeriodicActivity {
    interval_ms: u64,
    settle_ms: u64,
    last_start: u64,
    phase: Phase,
}

impl PeriodicActivity {
    /// Activity whose first run is one interval after `now`.
    pub fn new(interval_ms: u64, settle_ms: u64, now: u64) -> Self {
        Self {
            interval_ms,
            settle_ms,
            last_start: now,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_start(&self) -> u64 {
        self.last_start
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    /// Due when not held active and a full interval has passed since the last start.
    pub fn is_due(&self, now: u64) -> bool {
        !self.is_active() && now.saturating_sub(self.last_start) >= self.interval_ms
    }

    pub fn start(&mut self, now: u64) {
        self.last_start = now;
        self.phase = Phase::Active { since: now };
    }

    /// Held long enough to be released.
    pub fn settle_due(&self, now: u64) -> bool {
        match self.phase {
            Phase::Active { since } => now.saturating_sub(since) >= self.settle_ms,
            _ => false,
        }
    }

    pub fn settle(&mut self) {
        self.phase = Phase::Cooling;
    }
}
