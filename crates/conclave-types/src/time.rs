//! Timestamps issued by the TimeAuthority
//!
//! Event timestamps are strictly monotonic microsecond ticks from a single
//! authority, giving the log an unambiguous total order. Wall-clock
//! rendering goes through `chrono` for display only.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonic timestamp in microseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Construct from raw microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Raw microseconds since epoch
    pub fn as_micros(&self) -> i64 {
        self.0
    }

    /// Convert to a wall-clock time for display
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_micros(self.0).single().unwrap_or_default()
    }

    /// Add a whole number of seconds
    pub fn plus_seconds(&self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds.saturating_mul(1_000_000)))
    }

    /// Add a whole number of hours
    pub fn plus_hours(&self, hours: i64) -> Self {
        self.plus_seconds(hours.saturating_mul(3600))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_micros())
    }
}
