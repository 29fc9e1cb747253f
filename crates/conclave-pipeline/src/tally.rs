//! Quorum and adoption arithmetic
//!
//! Pure functions: given the live votes, the motion, the roster, and the
//! configured rules, compute the tally. The result is reproducible from
//! the on-chain votes by anyone, which is what makes `VoteTallied`
//! checkable rather than asserted.
//!
//! Supporters stand as implicit yea votes unless they cast an explicit
//! vote; there are no tie-breaks by design.

use std::collections::BTreeMap;

use conclave_types::{
    ActorId, Motion, ThresholdRule, Vote, VoteChoice, VoteTalliedBody,
};

/// A computed tally.
#[derive(Debug, Clone, PartialEq)]
pub struct TallyResult {
    pub yea: u32,
    pub nay: u32,
    pub abstain: u32,
    pub present: u32,
    /// Distinct effective voters (explicit plus standing supporters)
    pub cast: u32,
    pub roster_size: u32,
    pub quorum_met: bool,
    /// Yea fraction of cast excluding abstains
    pub yea_fraction: f64,
    /// Cast fraction of the roster
    pub cast_fraction: f64,
    /// Clears both thresholds under quorum
    pub adopted: bool,
}

impl TallyResult {
    /// The event body recording this tally
    pub fn to_body(&self, motion: &Motion) -> VoteTalliedBody {
        VoteTalliedBody {
            motion_id: motion.motion_id.clone(),
            yea: self.yea,
            nay: self.nay,
            abstain: self.abstain,
            present: self.present,
            roster_size: self.roster_size,
        }
    }
}

/// Compute the tally for a motion.
///
/// `votes` are the replacement-resolved live votes; `roster` is the
/// cycle's attending roster. Non-roster votes and supporters are ignored.
pub fn tally(
    motion: &Motion,
    votes: &[&Vote],
    roster: &[ActorId],
    quorum_fraction: f64,
    rule: ThresholdRule,
) -> TallyResult {
    let mut effective: BTreeMap<&ActorId, VoteChoice> = BTreeMap::new();

    // Supporters stand as yea unless they speak otherwise
    for supporter in &motion.supporters {
        if roster.contains(supporter) {
            effective.insert(supporter, VoteChoice::Yea);
        }
    }
    for vote in votes {
        if roster.contains(&vote.voter_id) {
            effective.insert(&vote.voter_id, vote.choice);
        }
    }

    let mut yea = 0u32;
    let mut nay = 0u32;
    let mut abstain = 0u32;
    let mut present = 0u32;
    for choice in effective.values() {
        match choice {
            VoteChoice::Yea => yea += 1,
            VoteChoice::Nay => nay += 1,
            VoteChoice::Abstain => abstain += 1,
            VoteChoice::Present => present += 1,
        }
    }

    let cast = effective.len() as u32;
    let roster_size = roster.len() as u32;

    // Quorum: distinct cast identities strictly exceed the fraction
    let quorum_met = roster_size > 0 && (cast as f64) > (roster_size as f64) * quorum_fraction;

    let deciding = cast.saturating_sub(abstain);
    let yea_fraction = if deciding > 0 {
        yea as f64 / deciding as f64
    } else {
        0.0
    };
    let cast_fraction = if roster_size > 0 {
        cast as f64 / roster_size as f64
    } else {
        0.0
    };

    let adopted = quorum_met
        && yea_fraction >= rule.min_yea_fraction
        && cast_fraction >= rule.min_cast_fraction;

    TallyResult {
        yea,
        nay,
        abstain,
        present,
        cast,
        roster_size,
        quorum_met,
        yea_fraction,
        cast_fraction,
        adopted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::{
        AdoptionThresholds, ConsensusLevel, CycleId, MotionId, MotionKind, MotionStatus,
        Timestamp, VoteId,
    };
    use uuid::Uuid;

    fn actor(i: u128) -> ActorId {
        ActorId::from_uuid(Uuid::from_u128(i))
    }

    fn motion(supporters: Vec<ActorId>) -> Motion {
        let level = ConsensusLevel::from_supporter_count(supporters.len());
        Motion {
            motion_id: MotionId::from_uuid(Uuid::from_u128(7)),
            cycle_id: CycleId::from_uuid(Uuid::from_u128(100)),
            kind: MotionKind::Ordinary,
            text: "the motion".to_string(),
            consensus_level: level,
            proposer: supporters[0].clone(),
            supporters,
            status: MotionStatus::Pending,
            proposed_at: Timestamp::from_micros(0),
        }
    }

    fn vote(voter: ActorId, choice: VoteChoice, seq: u64) -> Vote {
        Vote {
            vote_id: VoteId::new(),
            motion_id: MotionId::from_uuid(Uuid::from_u128(7)),
            voter_id: voter,
            choice,
            justification: None,
            sequence: seq,
            cast_at: Timestamp::from_micros(0),
        }
    }

    fn rule(level: ConsensusLevel) -> ThresholdRule {
        AdoptionThresholds::default().rule(level)
    }

    #[test]
    fn test_clean_cycle_tally() {
        // Roster {A,B,C,D}; motion supported by {A,B}; B,C vote yea, D nay
        let roster: Vec<ActorId> = (1..=4).map(actor).collect();
        let m = motion(vec![actor(1), actor(2)]);
        let votes = [
            vote(actor(2), VoteChoice::Yea, 1),
            vote(actor(3), VoteChoice::Yea, 1),
            vote(actor(4), VoteChoice::Nay, 1),
        ];
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Low));
        assert_eq!((result.yea, result.nay), (3, 1));
        assert_eq!(result.cast, 4);
        assert!(result.quorum_met);
        assert_eq!(result.yea_fraction, 0.75);
        assert_eq!(result.cast_fraction, 1.0);
        assert!(result.adopted);
    }

    #[test]
    fn test_explicit_vote_overrides_support() {
        let roster: Vec<ActorId> = (1..=4).map(actor).collect();
        let m = motion(vec![actor(1), actor(2)]);
        // A supporter turns against the motion
        let votes = [vote(actor(2), VoteChoice::Nay, 1)];
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Low));
        assert_eq!((result.yea, result.nay), (1, 1));
        assert_eq!(result.cast, 2);
    }

    #[test]
    fn test_quorum_unmet() {
        let roster: Vec<ActorId> = (1..=10).map(actor).collect();
        let m = motion(vec![actor(1)]);
        let votes = [vote(actor(2), VoteChoice::Yea, 1)];
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Single));
        assert_eq!(result.cast, 2);
        assert!(!result.quorum_met);
        assert!(!result.adopted);
    }

    #[test]
    fn test_critical_rejection() {
        // 10 yea / 20 nay at CRITICAL fails the 0.75 yea bar
        let roster: Vec<ActorId> = (1..=30).map(actor).collect();
        let supporters: Vec<ActorId> = (1..=10).map(actor).collect();
        let m = motion(supporters);
        assert_eq!(m.consensus_level, ConsensusLevel::High);

        let votes: Vec<Vote> = (11..=30)
            .map(|i| vote(actor(i), VoteChoice::Nay, 1))
            .collect();
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Critical));
        assert_eq!((result.yea, result.nay), (10, 20));
        assert!(result.quorum_met);
        assert!(!result.adopted);
    }

    #[test]
    fn test_abstain_excluded_from_yea_fraction() {
        let roster: Vec<ActorId> = (1..=5).map(actor).collect();
        let m = motion(vec![actor(1)]);
        let votes = [
            vote(actor(2), VoteChoice::Yea, 1),
            vote(actor(3), VoteChoice::Abstain, 1),
            vote(actor(4), VoteChoice::Abstain, 1),
        ];
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Single));
        // 2 yea of 2 deciding (4 cast minus 2 abstain)
        assert_eq!(result.yea_fraction, 1.0);
        assert_eq!(result.cast, 4);
    }

    #[test]
    fn test_present_counts_toward_cast_not_yea() {
        let roster: Vec<ActorId> = (1..=4).map(actor).collect();
        let m = motion(vec![actor(1)]);
        let votes = [
            vote(actor(2), VoteChoice::Present, 1),
            vote(actor(3), VoteChoice::Present, 1),
        ];
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Single));
        assert_eq!(result.cast, 3);
        // 1 yea of 3 deciding
        assert!((result.yea_fraction - 1.0 / 3.0).abs() < 1e-9);
        assert!(!result.adopted);
    }

    #[test]
    fn test_non_roster_votes_ignored() {
        let roster: Vec<ActorId> = (1..=3).map(actor).collect();
        let m = motion(vec![actor(1)]);
        let votes = [vote(actor(9), VoteChoice::Nay, 1)];
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Single));
        assert_eq!(result.nay, 0);
        assert_eq!(result.cast, 1);
    }

    #[test]
    fn test_empty_deciding_set_never_adopts() {
        let roster: Vec<ActorId> = (1..=4).map(actor).collect();
        let mut m = motion(vec![actor(9)]); // supporter off roster
        m.supporters = vec![actor(9)];
        let votes = [
            vote(actor(1), VoteChoice::Abstain, 1),
            vote(actor(2), VoteChoice::Abstain, 1),
            vote(actor(3), VoteChoice::Abstain, 1),
        ];
        let vote_refs: Vec<&Vote> = votes.iter().collect();

        let result = tally(&m, &vote_refs, &roster, 0.5, rule(ConsensusLevel::Single));
        assert_eq!(result.yea_fraction, 0.0);
        assert!(!result.adopted);
    }
}
