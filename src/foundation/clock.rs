//! Time sources.
//!
//! Producer and compositor each own a clock. The two are never assumed to share an epoch, which
//! is why cross-clock differences only ever feed the transport *estimate* in telemetry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::foundation::core::Millis;

/// Source of monotonically non-decreasing timestamps in milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since this clock's epoch.
    fn now_ms(&self) -> Millis;
}

/// Wall-independent clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
    offset_ms: Millis,
}

impl MonotonicClock {
    /// Clock whose epoch is the moment of construction.
    pub fn new() -> Self {
        Self::with_offset(0.0)
    }

    /// Clock whose readings are shifted by `offset_ms`.
    ///
    /// Used to stand in for a peer process whose epoch differs from ours.
    pub fn with_offset(offset_ms: Millis) -> Self {
        Self {
            origin: Instant::now(),
            offset_ms,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_secs_f64() * 1000.0 + self.offset_ms
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Clock starting at `start_ms`.
    pub fn new(start_ms: Millis) -> Self {
        Self {
            bits: AtomicU64::new(start_ms.to_bits()),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: Millis) {
        self.bits.store(now_ms.to_bits(), Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: Millis) {
        let now = self.now_ms();
        self.set(now + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
