//! Votes

use serde::{Deserialize, Serialize};

use crate::identity::{ActorId, MotionId, VoteId};
use crate::time::Timestamp;

/// A voting choice. `Present` records attendance without taking a side;
/// `Abstain` is excluded from the yea-fraction denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteChoice {
    Yea,
    Nay,
    Abstain,
    Present,
}

/// One cast vote. At most one live vote per (motion, voter); a later vote
/// replaces an earlier one only while the motion is open and only with a
/// strictly higher sequence number in the voter's identity chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub vote_id: VoteId,
    pub motion_id: MotionId,
    pub voter_id: ActorId,
    pub choice: VoteChoice,
    pub justification: Option<String>,
    /// Chain position at cast time; replacement requires strictly greater
    pub sequence: u64,
    pub cast_at: Timestamp,
}

impl Vote {
    /// Whether `candidate` may replace this vote
    pub fn replaceable_by(&self, candidate: &Vote) -> bool {
        self.motion_id == candidate.motion_id
            && self.voter_id == candidate.voter_id
            && candidate.sequence > self.sequence
    }
}
