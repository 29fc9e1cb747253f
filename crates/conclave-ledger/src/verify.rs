//! Read-time chain verification
//!
//! Pure functions over event sequences: recompute every chain hash,
//! check every signature and witness co-signature, and confirm the
//! parent linkage and timestamp order. The ledger escalates defects to
//! halt; the observer reports them advisorily with the same code.

use serde::{Deserialize, Serialize};
use std::fmt;

use conclave_crypto::{verify_hex, HashHeader, PublicKey};
use conclave_types::{ActorId, ChainHash, ConclaveConfig, Event, EventId, EventKind};

/// Event kinds that demand the elevated witness count: the cessation and
/// override rituals.
pub fn kind_is_critical(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::OverrideInvoked
            | EventKind::OverrideConcluded
            | EventKind::DissolveMotion
            | EventKind::SuspensionBegan
    )
}

/// One verification defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainDefect {
    /// Recomputed chain hash differs from the recorded one
    HashMismatch { event_id: EventId },
    /// Actor signature does not verify over the chain hash
    BadSignature { event_id: EventId },
    /// A witness signature does not verify, or witnesses are missing
    BadWitness { event_id: EventId, detail: String },
    /// `prev_hash` does not match the preceding event's chain hash
    BrokenLink { event_id: EventId },
    /// Timestamp not strictly greater than the predecessor's
    TimestampOrder { event_id: EventId },
    /// Two events share a parent
    DuplicateParent { prev_hash: ChainHash },
}

impl fmt::Display for ChainDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainDefect::HashMismatch { event_id } => write!(f, "hash mismatch at {}", event_id),
            ChainDefect::BadSignature { event_id } => write!(f, "bad signature at {}", event_id),
            ChainDefect::BadWitness { event_id, detail } => {
                write!(f, "witness defect at {}: {}", event_id, detail)
            }
            ChainDefect::BrokenLink { event_id } => write!(f, "broken link at {}", event_id),
            ChainDefect::TimestampOrder { event_id } => {
                write!(f, "timestamp regression at {}", event_id)
            }
            ChainDefect::DuplicateParent { prev_hash } => {
                write!(f, "duplicate parent {}", prev_hash)
            }
        }
    }
}

/// Verification result for one identity chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainReport {
    pub actor_id: ActorId,
    pub length: u64,
    pub defects: Vec<ChainDefect>,
}

impl ChainReport {
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }
}

/// Verify a single event in isolation: hash, actor signature, witnesses.
///
/// The witness requirement is derived from the event's own kind, so a
/// cessation or override event stripped down to the baseline count is a
/// defect even though its chain hash still matches.
pub fn verify_event(event: &Event, config: &ConclaveConfig) -> Vec<ChainDefect> {
    let min_witnesses = config.witnesses_required(kind_is_critical(event.kind()));
    let mut defects = Vec::new();

    let header = HashHeader {
        actor_id: event.actor_id.clone(),
        cycle_id: event.cycle_id.clone(),
        timestamp: event.timestamp,
    };
    let recomputed = conclave_crypto::compute_chain_hash(&header, &event.body, &event.prev_hash);
    if recomputed != event.chain_hash {
        defects.push(ChainDefect::HashMismatch {
            event_id: event.event_id.clone(),
        });
    }

    let message = event.chain_hash.0.as_bytes();
    let actor_key = PublicKey::from_hex(event.signature.public_key.clone());
    match verify_hex(&event.signature.signature, &actor_key, message) {
        Ok(true) => {}
        _ => defects.push(ChainDefect::BadSignature {
            event_id: event.event_id.clone(),
        }),
    }

    if event.witnesses.len() < min_witnesses {
        defects.push(ChainDefect::BadWitness {
            event_id: event.event_id.clone(),
            detail: format!(
                "{} witnesses, {} required",
                event.witnesses.len(),
                min_witnesses
            ),
        });
    }
    for witness in &event.witnesses {
        if witness.witness_id == event.actor_id {
            defects.push(ChainDefect::BadWitness {
                event_id: event.event_id.clone(),
                detail: "actor witnessed its own event".to_string(),
            });
            continue;
        }
        let key = PublicKey::from_hex(witness.public_key.clone());
        match verify_hex(&witness.signature, &key, message) {
            Ok(true) => {}
            _ => defects.push(ChainDefect::BadWitness {
                event_id: event.event_id.clone(),
                detail: format!("signature of {} does not verify", witness.witness_id),
            }),
        }
    }

    defects
}

/// Verify one identity chain, oldest first.
pub fn verify_chain(actor_id: &ActorId, events: &[Event], config: &ConclaveConfig) -> ChainReport {
    let mut defects = Vec::new();
    let mut expected_prev = ChainHash::genesis();
    let mut last_timestamp = None;
    let mut seen_parents = std::collections::HashSet::new();

    for event in events {
        defects.extend(verify_event(event, config));

        if event.prev_hash != expected_prev {
            defects.push(ChainDefect::BrokenLink {
                event_id: event.event_id.clone(),
            });
        }
        if !seen_parents.insert(event.prev_hash.clone()) {
            defects.push(ChainDefect::DuplicateParent {
                prev_hash: event.prev_hash.clone(),
            });
        }
        if let Some(last) = last_timestamp {
            if event.timestamp <= last {
                defects.push(ChainDefect::TimestampOrder {
                    event_id: event.event_id.clone(),
                });
            }
        }

        expected_prev = event.chain_hash.clone();
        last_timestamp = Some(event.timestamp);
    }

    ChainReport {
        actor_id: actor_id.clone(),
        length: events.len() as u64,
        defects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_crypto::Keyring;
    use conclave_types::{
        CycleId, EventBody, EventSignature, Timestamp, UtteranceBody,
    };
    use uuid::Uuid;

    fn lax_config() -> ConclaveConfig {
        // One baseline witness, two for critical kinds
        let mut config = ConclaveConfig::default();
        config.witness_min = 1;
        config.witness_extra_for_critical = 1;
        config
    }

    fn build_event(
        keyring: &Keyring,
        actor: &ActorId,
        witness: &ActorId,
        prev: ChainHash,
        ts: i64,
    ) -> Event {
        build_event_with_body(
            keyring,
            actor,
            witness,
            prev,
            ts,
            EventBody::AgentUtterance(UtteranceBody {
                text: "on the record".to_string(),
                turn: 1,
            }),
        )
    }

    fn build_event_with_body(
        keyring: &Keyring,
        actor: &ActorId,
        witness: &ActorId,
        prev: ChainHash,
        ts: i64,
        body: EventBody,
    ) -> Event {
        let header = HashHeader {
            actor_id: actor.clone(),
            cycle_id: CycleId::from_uuid(Uuid::from_u128(7)),
            timestamp: Timestamp::from_micros(ts),
        };
        let chain_hash = conclave_crypto::compute_chain_hash(&header, &body, &prev);
        let signature = keyring.sign(actor, chain_hash.0.as_bytes()).unwrap();
        let witness_sig = keyring.sign(witness, chain_hash.0.as_bytes()).unwrap();
        Event {
            event_id: EventId::from_chain_hash(&chain_hash),
            prev_hash: prev,
            chain_hash,
            signature: EventSignature {
                signature: signature.signature,
                public_key: signature.public_key.key,
            },
            timestamp: Timestamp::from_micros(ts),
            actor_id: actor.clone(),
            cycle_id: CycleId::from_uuid(Uuid::from_u128(7)),
            body,
            witnesses: vec![conclave_types::WitnessSignature {
                witness_id: witness.clone(),
                signature: witness_sig.signature,
                public_key: witness_sig.public_key.key,
            }],
        }
    }

    fn setup() -> (Keyring, ActorId, ActorId) {
        let keyring = Keyring::new();
        let actor = ActorId::from_uuid(Uuid::from_u128(1));
        let witness = ActorId::from_uuid(Uuid::from_u128(2));
        keyring.register(actor.clone()).unwrap();
        keyring.register(witness.clone()).unwrap();
        (keyring, actor, witness)
    }

    #[test]
    fn test_clean_chain_verifies() {
        let (keyring, actor, witness) = setup();
        let e1 = build_event(&keyring, &actor, &witness, ChainHash::genesis(), 10);
        let e2 = build_event(&keyring, &actor, &witness, e1.chain_hash.clone(), 20);

        let report = verify_chain(&actor, &[e1, e2], &lax_config());
        assert!(report.is_clean(), "defects: {:?}", report.defects);
        assert_eq!(report.length, 2);
    }

    #[test]
    fn test_tampered_body_detected() {
        let (keyring, actor, witness) = setup();
        let mut event = build_event(&keyring, &actor, &witness, ChainHash::genesis(), 10);
        event.body = EventBody::AgentUtterance(UtteranceBody {
            text: "rewritten history".to_string(),
            turn: 1,
        });

        let defects = verify_event(&event, &lax_config());
        assert!(defects
            .iter()
            .any(|d| matches!(d, ChainDefect::HashMismatch { .. })));
    }

    #[test]
    fn test_missing_witness_detected() {
        let (keyring, actor, witness) = setup();
        let mut event = build_event(&keyring, &actor, &witness, ChainHash::genesis(), 10);
        event.witnesses.clear();

        let defects = verify_event(&event, &lax_config());
        assert!(defects
            .iter()
            .any(|d| matches!(d, ChainDefect::BadWitness { .. })));
    }

    #[test]
    fn test_self_witness_detected() {
        let (keyring, actor, witness) = setup();
        let mut event = build_event(&keyring, &actor, &witness, ChainHash::genesis(), 10);
        event.witnesses[0].witness_id = actor.clone();

        let defects = verify_event(&event, &lax_config());
        assert!(defects
            .iter()
            .any(|d| matches!(d, ChainDefect::BadWitness { .. })));
    }

    #[test]
    fn test_broken_link_detected() {
        let (keyring, actor, witness) = setup();
        let e1 = build_event(&keyring, &actor, &witness, ChainHash::genesis(), 10);
        let orphan = build_event(&keyring, &actor, &witness, ChainHash::from_digest([9; 32]), 20);

        let report = verify_chain(&actor, &[e1, orphan], &lax_config());
        assert!(report
            .defects
            .iter()
            .any(|d| matches!(d, ChainDefect::BrokenLink { .. })));
    }

    #[test]
    fn test_timestamp_regression_detected() {
        let (keyring, actor, witness) = setup();
        let e1 = build_event(&keyring, &actor, &witness, ChainHash::genesis(), 20);
        let e2 = build_event(&keyring, &actor, &witness, e1.chain_hash.clone(), 10);

        let report = verify_chain(&actor, &[e1, e2], &lax_config());
        assert!(report
            .defects
            .iter()
            .any(|d| matches!(d, ChainDefect::TimestampOrder { .. })));
    }

    #[test]
    fn test_critical_kind_demands_elevated_witness_count() {
        let (keyring, actor, witness) = setup();
        // A cessation event carrying only the baseline witness count:
        // the hash and every signature still verify, the count does not
        let event = build_event_with_body(
            &keyring,
            &actor,
            &witness,
            ChainHash::genesis(),
            10,
            EventBody::SuspensionBegan(conclave_types::SuspensionBody {
                terminal: true,
                reason: "dissolution adopted".to_string(),
            }),
        );
        assert_eq!(event.witnesses.len(), 1);

        let defects = verify_event(&event, &lax_config());
        assert!(defects
            .iter()
            .any(|d| matches!(d, ChainDefect::BadWitness { .. })));

        // The same witness set on an ordinary kind is sufficient
        let ordinary = build_event(&keyring, &actor, &witness, ChainHash::genesis(), 10);
        assert!(verify_event(&ordinary, &lax_config()).is_empty());
    }
}
