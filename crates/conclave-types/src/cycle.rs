//! Cycle state and pipeline stages

use serde::{Deserialize, Serialize};

use crate::identity::{ActorId, CycleId};
use crate::time::Timestamp;

/// State of a deliberation cycle. Transitions are produced only by a
/// named event kind; nothing advances a cycle on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleState {
    Open,
    DissolutionDeliberation,
    Reforming,
    Closed,
    Dissolved,
    IndefiniteSuspension,
}

impl CycleState {
    /// Terminal states admit no further events for the cycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CycleState::Closed | CycleState::Dissolved | CycleState::IndefiniteSuspension
        )
    }

    /// Whether the cycle still accepts deliberative work
    pub fn accepts_work(&self) -> bool {
        matches!(self, CycleState::Open | CycleState::DissolutionDeliberation)
    }
}

/// Stage of the per-cycle pipeline. Stages order the cycle's work; the
/// cycle state above governs whether work is admissible at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Open,
    Intake,
    Deliberation,
    MotionQueue,
    Voting,
    Resolution,
    Closing,
    DissolutionDeliberation,
}

impl PipelineStage {
    /// Whether a direct transition to `next` is part of the stage machine
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Open, Intake)
                | (Intake, Deliberation)
                | (Deliberation, MotionQueue)
                | (MotionQueue, Voting)
                | (MotionQueue, DissolutionDeliberation)
                | (Voting, Resolution)
                | (Resolution, Closing)
                | (Resolution, DissolutionDeliberation)
                | (DissolutionDeliberation, Closing)
        )
    }
}

/// A deliberation cycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub cycle_id: CycleId,
    /// Ordinal, starting at 1
    pub number: u64,
    pub state: CycleState,
    pub stage: PipelineStage,
    pub chair: ActorId,
    /// Attending roster, set by roll call, in turn order
    pub roster: Vec<ActorId>,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl Cycle {
    /// Whether `actor` attended this cycle's roll call
    pub fn attending(&self, actor: &ActorId) -> bool {
        self.roster.contains(actor)
    }
}
