//! Motions and consensus levels

use serde::{Deserialize, Serialize};

use crate::identity::{ActorId, CycleId, MotionId};
use crate::time::Timestamp;

/// Consensus level, derived from supporter count at proposal time.
///
/// The derivation is total and tie-free: 1 → Single, 2–3 → Low, 4–7 →
/// Medium, 8–15 → High, 16+ → Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConsensusLevel {
    Single,
    Low,
    Medium,
    High,
    Critical,
}

impl ConsensusLevel {
    /// Derive the level from the supporter count. Not mutable afterwards.
    pub fn from_supporter_count(count: usize) -> Self {
        match count {
            0 | 1 => ConsensusLevel::Single,
            2..=3 => ConsensusLevel::Low,
            4..=7 => ConsensusLevel::Medium,
            8..=15 => ConsensusLevel::High,
            _ => ConsensusLevel::Critical,
        }
    }

    /// All levels, lowest first
    pub fn all() -> [ConsensusLevel; 5] {
        [
            ConsensusLevel::Single,
            ConsensusLevel::Low,
            ConsensusLevel::Medium,
            ConsensusLevel::High,
            ConsensusLevel::Critical,
        ]
    }
}

/// What kind of motion this is. The dissolution-deliberation state admits
/// only the last three kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionKind {
    /// Regular deliberative motion
    Ordinary,
    /// "Continue operation" — rejection triggers dissolution deliberation
    Continuation,
    /// Return from dissolution deliberation to the open cycle
    Reconsider,
    /// Dissolve permanently
    Dissolve,
    /// Reform: close this body and reconvene in a new cycle
    Reform,
}

impl MotionKind {
    /// Whether this kind is admissible during dissolution deliberation
    pub fn admissible_in_dissolution(&self) -> bool {
        matches!(
            self,
            MotionKind::Reconsider | MotionKind::Dissolve | MotionKind::Reform
        )
    }
}

/// Lifecycle status of a motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionStatus {
    /// Proposed, not yet resolved
    Pending,
    /// Cleared its thresholds but the cycle ended before resolution
    Tabled,
    /// Adopted (terminal)
    Adopted,
    /// Rejected (terminal)
    Rejected,
    /// Withdrawn by its proposer before resolution
    Withdrawn,
}

impl MotionStatus {
    /// Adopted and Rejected admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, MotionStatus::Adopted | MotionStatus::Rejected)
    }
}

/// Final outcome recorded in a `MotionResolved` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionOutcome {
    Adopted,
    Rejected,
    Tabled,
    Withdrawn,
}

impl From<MotionOutcome> for MotionStatus {
    fn from(outcome: MotionOutcome) -> Self {
        match outcome {
            MotionOutcome::Adopted => MotionStatus::Adopted,
            MotionOutcome::Rejected => MotionStatus::Rejected,
            MotionOutcome::Tabled => MotionStatus::Tabled,
            MotionOutcome::Withdrawn => MotionStatus::Withdrawn,
        }
    }
}

/// A motion under deliberation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub motion_id: MotionId,
    pub cycle_id: CycleId,
    pub kind: MotionKind,
    pub text: String,
    /// Derived from supporter count at proposal time; immutable
    pub consensus_level: ConsensusLevel,
    pub proposer: ActorId,
    pub supporters: Vec<ActorId>,
    pub status: MotionStatus,
    pub proposed_at: Timestamp,
}

impl Motion {
    /// Whether votes may still be cast or replaced on this motion
    pub fn is_open(&self) -> bool {
        matches!(self.status, MotionStatus::Pending)
    }
}
