//! The TimeAuthority: the single source of event timestamps
//!
//! Timestamps are strictly increasing microsecond ticks. There is no
//! substitute clock: when the authority is unavailable the core halts
//! intake rather than guessing at time.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use conclave_types::{ConclaveError, Result, Timestamp};

/// The single source of monotonic timestamps.
#[async_trait]
pub trait TimeAuthority: Send + Sync {
    /// Issue the next timestamp. Strictly greater than every timestamp
    /// issued before it.
    async fn now(&self) -> Result<Timestamp>;
}

/// Wall-clock-backed authority. Ticks follow the system clock but never
/// repeat or run backwards, even across clock adjustments.
pub struct MonotonicTimeAuthority {
    last: Mutex<i64>,
}

impl MonotonicTimeAuthority {
    pub fn new() -> Self {
        Self { last: Mutex::new(0) }
    }
}

impl Default for MonotonicTimeAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeAuthority for MonotonicTimeAuthority {
    async fn now(&self) -> Result<Timestamp> {
        let mut last = self.last.lock().await;
        let wall = Utc::now().timestamp_micros();
        *last = wall.max(*last + 1);
        Ok(Timestamp::from_micros(*last))
    }
}

/// Deterministic authority for tests: starts at a base and advances by a
/// fixed step per issued tick. Can be jumped forward to model elapsed
/// wall-clock time (never backward).
pub struct ManualTimeAuthority {
    current: Mutex<i64>,
    step: i64,
}

impl ManualTimeAuthority {
    pub fn new(start_micros: i64, step_micros: i64) -> Self {
        Self {
            current: Mutex::new(start_micros),
            step: step_micros.max(1),
        }
    }

    /// Jump the clock forward to at least `to`
    pub async fn advance_to(&self, to: Timestamp) {
        let mut current = self.current.lock().await;
        *current = (*current).max(to.as_micros());
    }
}

#[async_trait]
impl TimeAuthority for ManualTimeAuthority {
    async fn now(&self) -> Result<Timestamp> {
        let mut current = self.current.lock().await;
        *current += self.step;
        Ok(Timestamp::from_micros(*current))
    }
}

/// An authority that is down. Every request halts intake.
pub struct UnavailableTimeAuthority;

#[async_trait]
impl TimeAuthority for UnavailableTimeAuthority {
    async fn now(&self) -> Result<Timestamp> {
        Err(ConclaveError::halted("time authority unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_monotonic_ticks_strictly_increase() {
        let authority = MonotonicTimeAuthority::new();
        let mut last = authority.now().await.unwrap();
        for _ in 0..100 {
            let next = authority.now().await.unwrap();
            assert!(next > last);
            last = next;
        }
    }

    #[tokio::test]
    async fn test_manual_authority_steps() {
        let authority = ManualTimeAuthority::new(1_000, 10);
        assert_eq!(authority.now().await.unwrap().as_micros(), 1_010);
        assert_eq!(authority.now().await.unwrap().as_micros(), 1_020);
    }

    #[tokio::test]
    async fn test_manual_advance_never_rewinds() {
        let authority = ManualTimeAuthority::new(1_000, 10);
        authority.advance_to(Timestamp::from_micros(5_000)).await;
        assert!(authority.now().await.unwrap().as_micros() > 5_000);
        authority.advance_to(Timestamp::from_micros(100)).await;
        assert!(authority.now().await.unwrap().as_micros() > 5_000);
    }

    #[tokio::test]
    async fn test_unavailable_authority_halts() {
        let authority = UnavailableTimeAuthority;
        assert!(matches!(
            authority.now().await,
            Err(ConclaveError::Halted { .. })
        ));
    }
}
