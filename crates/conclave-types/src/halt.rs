//! Halt state
//!
//! Halt is sticky: once set it does not expire, does not auto-recover,
//! and is cleared only by an adopted reform motion in a newly opened
//! cycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::identity::{ActorId, BreachId};
use crate::time::Timestamp;

/// Why a halt was declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Hash or signature verification failure
    IntegrityFailure { detail: String },
    /// Two valid-looking events with the same parent on one chain
    Divergence { actor_id: ActorId },
    /// Explicit declaration by a witness or operator with override scope
    Declared { declared_by: ActorId, reason: String },
    /// Unresolved breach persisted across a cycle boundary
    UnresolvedBreach { breaches: Vec<BreachId> },
    /// The two halt-propagation channels disagreed
    ChannelMismatch,
}

impl HaltReason {
    /// Short form for logs and error payloads
    pub fn describe(&self) -> String {
        match self {
            HaltReason::IntegrityFailure { detail } => format!("integrity failure: {}", detail),
            HaltReason::Divergence { actor_id } => format!("divergence on chain {}", actor_id),
            HaltReason::Declared { reason, .. } => format!("declared: {}", reason),
            HaltReason::UnresolvedBreach { breaches } => {
                format!("{} unresolved breaches crossed a cycle boundary", breaches.len())
            }
            HaltReason::ChannelMismatch => "halt channel mismatch".to_string(),
        }
    }
}

/// The shared halt record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HaltState {
    pub halted: bool,
    pub reason: Option<HaltReason>,
    pub declared_by: Option<ActorId>,
    pub declared_at: Option<Timestamp>,
    /// Breaches declared but not yet responded to
    pub unresolved_breaches: BTreeSet<BreachId>,
}

impl HaltState {
    /// A clean, unhalted state
    pub fn clear() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unhalted() {
        let state = HaltState::default();
        assert!(!state.halted);
        assert!(state.reason.is_none());
        assert!(state.unresolved_breaches.is_empty());
    }

    #[test]
    fn test_reason_describe() {
        let reason = HaltReason::UnresolvedBreach {
            breaches: vec![BreachId::new(), BreachId::new()],
        };
        assert!(reason.describe().contains("2 unresolved"));
    }
}
