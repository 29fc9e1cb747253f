//! The cost meter
//!
//! Accumulates compute units and wall-clock time per cycle and produces
//! the `CostSnapshotAnnounced` body at every cycle open. Hiding the
//! numbers is a breach; the meter exists so there is always something
//! true to announce.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use conclave_types::{ActorId, CostSnapshot, CycleId, Timestamp};

/// Per-process cost accumulator.
pub struct CostMeter {
    compute_units: AtomicU64,
    started_at: Mutex<Option<Timestamp>>,
}

impl CostMeter {
    pub fn new() -> Self {
        Self {
            compute_units: AtomicU64::new(0),
            started_at: Mutex::new(None),
        }
    }

    /// Record the start of accounting, first call wins
    pub fn start(&self, at: Timestamp) {
        let mut started = self.started_at.lock().unwrap_or_else(|e| e.into_inner());
        if started.is_none() {
            *started = Some(at);
        }
    }

    /// Charge compute units
    pub fn charge(&self, units: u64) {
        self.compute_units.fetch_add(units, Ordering::Relaxed);
    }

    /// Units accumulated so far
    pub fn compute_units(&self) -> u64 {
        self.compute_units.load(Ordering::Relaxed)
    }

    /// Produce the snapshot body for a cycle open announcement
    pub fn snapshot(&self, cycle_id: CycleId, announced_by: ActorId, now: Timestamp) -> CostSnapshot {
        let started = self
            .started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unwrap_or(now);
        let elapsed_micros = now.as_micros().saturating_sub(started.as_micros());
        CostSnapshot {
            cycle_id,
            compute_units: self.compute_units(),
            wall_clock_seconds: (elapsed_micros / 1_000_000) as u64,
            announced_by,
        }
    }
}

impl Default for CostMeter {
    fn default() -> Self {
        Self::new()
    }
}
