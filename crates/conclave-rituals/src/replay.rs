//! Replay: rebuild ritual state by folding the log
//!
//! The replay law: folding every event from the empty state produces
//! exactly the state the live system exposes. Live and replayed state
//! share one fold, so the law cannot drift.

use conclave_types::Event;

use crate::state::RitualState;

/// Fold a log, oldest first, into ritual state.
pub fn replay(events: &[Event]) -> RitualState {
    let mut state = RitualState::new();
    for event in events {
        state.apply(event);
    }
    state
}

/// Fold a log and compare against a live state. Returns the divergence
/// description when the replay law is violated.
pub fn check_replay(events: &[Event], live: &RitualState) -> Result<(), String> {
    let rebuilt = replay(events);
    if &rebuilt == live {
        Ok(())
    } else {
        Err(divergence(&rebuilt, live))
    }
}

fn divergence(rebuilt: &RitualState, live: &RitualState) -> String {
    if rebuilt.cycles != live.cycles {
        return "cycle state diverges under replay".to_string();
    }
    if rebuilt.motions != live.motions {
        return "motion state diverges under replay".to_string();
    }
    if rebuilt.votes != live.votes {
        return "vote state diverges under replay".to_string();
    }
    if rebuilt.breaches != live.breaches {
        return "breach state diverges under replay".to_string();
    }
    if rebuilt.overrides != live.overrides {
        return "override state diverges under replay".to_string();
    }
    "ritual state diverges under replay".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::{
        ActorId, BreachId, ChainHash, CycleId, Event, EventBody, EventId, EventSignature,
        MotionId, MotionKind, Timestamp, VoteId,
    };
    use uuid::Uuid;

    fn actor(i: u128) -> ActorId {
        ActorId::from_uuid(Uuid::from_u128(i))
    }

    fn event(ts: i64, actor_id: ActorId, body: EventBody) -> Event {
        let chain_hash = ChainHash::from_digest([ts as u8; 32]);
        Event {
            event_id: EventId::from_chain_hash(&chain_hash),
            prev_hash: ChainHash::genesis(),
            chain_hash,
            signature: EventSignature {
                signature: String::new(),
                public_key: String::new(),
            },
            timestamp: Timestamp::from_micros(ts),
            actor_id,
            cycle_id: CycleId::from_uuid(Uuid::from_u128(100)),
            body,
            witnesses: vec![],
        }
    }

    fn sample_log() -> Vec<Event> {
        let motion_id = MotionId::from_uuid(Uuid::from_u128(7));
        vec![
            event(
                10,
                actor(1),
                EventBody::CycleOpened(conclave_types::CycleOpenedBody {
                    cycle_number: 1,
                    chair: actor(1),
                }),
            ),
            event(
                20,
                actor(1),
                EventBody::RollCallCompleted(conclave_types::RollCallBody {
                    roster: vec![actor(1), actor(2), actor(3)],
                }),
            ),
            event(
                30,
                actor(1),
                EventBody::AgentUtterance(conclave_types::UtteranceBody {
                    text: "opening the floor".to_string(),
                    turn: 0,
                }),
            ),
            event(
                40,
                actor(1),
                EventBody::MotionProposed(conclave_types::MotionProposedBody {
                    motion_id: motion_id.clone(),
                    kind: MotionKind::Ordinary,
                    text: "adopt the agenda".to_string(),
                    supporters: vec![actor(1), actor(2)],
                    consensus_level: conclave_types::ConsensusLevel::Low,
                }),
            ),
            event(
                50,
                actor(3),
                EventBody::VoteCast(conclave_types::VoteCastBody {
                    vote_id: VoteId::from_uuid(Uuid::from_u128(71)),
                    motion_id: motion_id.clone(),
                    choice: conclave_types::VoteChoice::Yea,
                    justification: None,
                    sequence: 1,
                }),
            ),
            event(
                60,
                actor(2),
                EventBody::BreachDeclared(conclave_types::BreachDeclaredBody {
                    breach_id: BreachId::from_uuid(Uuid::from_u128(9)),
                    kind: "procedural".to_string(),
                    description: "recorded for the record".to_string(),
                }),
            ),
        ]
    }

    #[test]
    fn test_replay_matches_incremental_fold() {
        let log = sample_log();

        let mut live = RitualState::new();
        for event in &log {
            live.apply(event);
        }

        assert_eq!(replay(&log), live);
        assert!(check_replay(&log, &live).is_ok());
    }

    #[test]
    fn test_replay_detects_divergence() {
        let log = sample_log();
        let mut live = RitualState::new();
        for event in &log {
            live.apply(event);
        }
        // A state the log never produced
        live.turns.insert(CycleId::from_uuid(Uuid::from_u128(100)), 99);

        assert!(check_replay(&log, &live).is_err());
    }

    #[test]
    fn test_replay_is_prefix_monotone() {
        let log = sample_log();
        // Folding a prefix then the rest equals folding the whole
        let mut prefixed = replay(&log[..3]);
        for event in &log[3..] {
            prefixed.apply(event);
        }
        assert_eq!(prefixed, replay(&log));
    }

    #[test]
    fn test_empty_log_is_empty_state() {
        assert_eq!(replay(&[]), RitualState::new());
    }
}
