//! The event model: the atomic unit of the witnessed log
//!
//! Every constitutionally significant action is one [`Event`]. The body is
//! a closed tagged union — one variant per event kind — and each payload
//! struct rejects unknown fields at deserialization time. Body schemas are
//! additionally validated by [`EventBody::validate`] before an append is
//! accepted.
//!
//! `chain_hash`, `signature`, and the witness co-signatures are computed
//! inside the ledger's trust boundary; callers never supply them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConclaveError;
use crate::identity::{
    ActorId, BreachId, ChainHash, CycleId, EventId, MotionId, OverrideId, VoteId,
};
use crate::motion::{ConsensusLevel, MotionKind, MotionOutcome};
use crate::time::Timestamp;
use crate::vote::VoteChoice;

/// Upper bound on an utterance body, in bytes
pub const MAX_UTTERANCE_BYTES: usize = 16 * 1024;
/// Upper bound on motion text, in bytes
pub const MAX_MOTION_TEXT_BYTES: usize = 8 * 1024;
/// Upper bound on free-text fields (grounds, responses, declarations)
pub const MAX_TEXT_BYTES: usize = 8 * 1024;
/// Upper bound on a cycle roster
pub const MAX_ROSTER_SIZE: usize = 72;

/// A witness co-signature over the event's chain hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessSignature {
    /// The co-signing witness
    pub witness_id: ActorId,
    /// Hex-encoded Ed25519 signature over the chain hash
    pub signature: String,
    /// Hex-encoded public key of the witness
    pub public_key: String,
}

/// The actor's own signature over the chain hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSignature {
    /// Hex-encoded Ed25519 signature over the chain hash
    pub signature: String,
    /// Hex-encoded public key of the signing actor
    pub public_key: String,
}

/// A precedent citation. Citations are never binding; the field is
/// recorded literally so the log itself carries the disclaimer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrecedentCitation {
    /// Who cites
    pub citer_id: ActorId,
    /// The event being cited as precedent
    pub cited_event_id: EventId,
    /// Grounds for the citation
    pub grounds: String,
    /// Always `false`; a citation obligates nobody
    pub binding: bool,
}

/// Compute-and-time accounting announced at every cycle open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostSnapshot {
    /// The cycle the snapshot covers
    pub cycle_id: CycleId,
    /// Accumulated compute units
    pub compute_units: u64,
    /// Accumulated wall-clock seconds
    pub wall_clock_seconds: u64,
    /// The announcing actor
    pub announced_by: ActorId,
}

// ============================================================================
// Event bodies (closed set)
// ============================================================================

/// Body of a `CycleOpened` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleOpenedBody {
    /// Ordinal of the cycle, starting at 1
    pub cycle_number: u64,
    /// Chair responsible for the boundary events
    pub chair: ActorId,
}

/// Body of a `CycleClosed` event. Unresolved work carries forward
/// explicitly: the close event itself names what moves to the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleClosedBody {
    /// Tabled motions carried into the next cycle
    pub carried_motions: Vec<MotionId>,
    /// Responded-but-open breaches carried into the next cycle
    pub carried_breaches: Vec<BreachId>,
}

/// Body of a `RollCallCompleted` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollCallBody {
    /// Attending roster, in turn order
    pub roster: Vec<ActorId>,
}

/// Body of an `AgentUtterance` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtteranceBody {
    /// The utterance text (already past the quarantine boundary)
    pub text: String,
    /// Position in the cycle's turn sequence
    pub turn: u64,
}

/// Body of a `MotionProposed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionProposedBody {
    /// The motion being proposed
    pub motion_id: MotionId,
    /// What kind of motion this is
    pub kind: MotionKind,
    /// Motion text
    pub text: String,
    /// Supporters at proposal time; the consensus level derives from these
    pub supporters: Vec<ActorId>,
    /// Derived consensus level, fixed at proposal time
    pub consensus_level: ConsensusLevel,
}

/// Body of a `VoteCast` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteCastBody {
    /// The vote record id
    pub vote_id: VoteId,
    /// The motion voted on
    pub motion_id: MotionId,
    /// The choice
    pub choice: VoteChoice,
    /// Optional justification text
    pub justification: Option<String>,
    /// Sequence number in the voter's identity chain; a replacement vote
    /// must carry a strictly higher sequence
    pub sequence: u64,
}

/// Body of a `VoteTallied` event. The tally must be reproducible from the
/// on-chain votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteTalliedBody {
    /// The motion tallied
    pub motion_id: MotionId,
    /// Yea count (explicit votes plus standing supporters)
    pub yea: u32,
    /// Nay count
    pub nay: u32,
    /// Abstain count
    pub abstain: u32,
    /// Present count
    pub present: u32,
    /// Roster size the fractions were computed against
    pub roster_size: u32,
}

/// Body of a `MotionResolved` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionResolvedBody {
    /// The motion resolved
    pub motion_id: MotionId,
    /// Final outcome
    pub outcome: MotionOutcome,
}

/// Body of a `DissolutionTriggered` event (continuation vote failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DissolutionTriggeredBody {
    /// The rejected continuation motion
    pub motion_id: MotionId,
}

/// Body of the three dissolution-deliberation outcome events
/// (`ReconsiderMotion`, `DissolveMotion`, `ReformMotion`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DissolutionMotionBody {
    /// The adopted motion that produced this transition
    pub motion_id: MotionId,
}

/// Body of a `SuspensionBegan` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuspensionBody {
    /// Terminal suspensions seal the cycle chain permanently
    pub terminal: bool,
    /// Why the suspension began
    pub reason: String,
}

/// Body of a `BreachDeclared` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreachDeclaredBody {
    /// The breach record id
    pub breach_id: BreachId,
    /// Structured breach kind ("intake-overrun", "override-expired", ...)
    pub kind: String,
    /// Human-readable description
    pub description: String,
}

/// Body of a `SuppressionAttempted` event — a close was attempted with
/// unresolved breaches. Itself a separately witnessed breach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuppressionBody {
    /// The breaches the close attempt would have buried
    pub suppressed: Vec<BreachId>,
}

/// Body of a `BreachResponded` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreachRespondedBody {
    /// The breach being answered
    pub breach_id: BreachId,
    /// The response text
    pub response: String,
}

/// Body of an `OverrideInvoked` event. The declaration text is captured
/// verbatim; the event itself is the conclave notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideInvokedBody {
    /// The override record id
    pub override_id: OverrideId,
    /// Verbatim declaration text
    pub declaration: String,
    /// Explicit scope of the override
    pub scope: String,
    /// When the override's authority lapses
    pub expires_at: Timestamp,
}

/// Body of an `OverrideConcluded` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideConcludedBody {
    /// The override being concluded
    pub override_id: OverrideId,
    /// What the override did
    pub summary: String,
}

/// Body of a `PrecedentChallenged` event. A challenge is a first-class
/// event, not a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrecedentChallengedBody {
    /// The originally cited event
    pub cited_event_id: EventId,
    /// Grounds for the challenge
    pub grounds: String,
}

/// Body of a `HaltDeclared` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HaltDeclaredBody {
    /// Why the halt was declared
    pub reason: String,
}

/// Body of a `ForkDetected` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForkDetectedBody {
    /// The identity chain the fork was observed on
    pub actor_id: ActorId,
    /// The contested parent hash, when known
    pub prev_hash: Option<ChainHash>,
    /// What was observed
    pub detail: String,
}

/// The closed set of event bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum EventBody {
    CycleOpened(CycleOpenedBody),
    CycleClosed(CycleClosedBody),
    RollCallCompleted(RollCallBody),
    AgentUtterance(UtteranceBody),
    MotionProposed(MotionProposedBody),
    VoteCast(VoteCastBody),
    VoteTallied(VoteTalliedBody),
    MotionResolved(MotionResolvedBody),
    DissolutionTriggered(DissolutionTriggeredBody),
    ReconsiderMotion(DissolutionMotionBody),
    DissolveMotion(DissolutionMotionBody),
    ReformMotion(DissolutionMotionBody),
    SuspensionBegan(SuspensionBody),
    BreachDeclared(BreachDeclaredBody),
    SuppressionAttempted(SuppressionBody),
    BreachResponded(BreachRespondedBody),
    OverrideInvoked(OverrideInvokedBody),
    OverrideConcluded(OverrideConcludedBody),
    PrecedentCited(PrecedentCitation),
    PrecedentChallenged(PrecedentChallengedBody),
    CostSnapshotAnnounced(CostSnapshot),
    HaltDeclared(HaltDeclaredBody),
    ForkDetected(ForkDetectedBody),
}

/// Discriminant of an [`EventBody`], used in filters and headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    CycleOpened,
    CycleClosed,
    RollCallCompleted,
    AgentUtterance,
    MotionProposed,
    VoteCast,
    VoteTallied,
    MotionResolved,
    DissolutionTriggered,
    ReconsiderMotion,
    DissolveMotion,
    ReformMotion,
    SuspensionBegan,
    BreachDeclared,
    SuppressionAttempted,
    BreachResponded,
    OverrideInvoked,
    OverrideConcluded,
    PrecedentCited,
    PrecedentChallenged,
    CostSnapshotAnnounced,
    HaltDeclared,
    ForkDetected,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl EventBody {
    /// The kind discriminant of this body
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::CycleOpened(_) => EventKind::CycleOpened,
            EventBody::CycleClosed(_) => EventKind::CycleClosed,
            EventBody::RollCallCompleted(_) => EventKind::RollCallCompleted,
            EventBody::AgentUtterance(_) => EventKind::AgentUtterance,
            EventBody::MotionProposed(_) => EventKind::MotionProposed,
            EventBody::VoteCast(_) => EventKind::VoteCast,
            EventBody::VoteTallied(_) => EventKind::VoteTallied,
            EventBody::MotionResolved(_) => EventKind::MotionResolved,
            EventBody::DissolutionTriggered(_) => EventKind::DissolutionTriggered,
            EventBody::ReconsiderMotion(_) => EventKind::ReconsiderMotion,
            EventBody::DissolveMotion(_) => EventKind::DissolveMotion,
            EventBody::ReformMotion(_) => EventKind::ReformMotion,
            EventBody::SuspensionBegan(_) => EventKind::SuspensionBegan,
            EventBody::BreachDeclared(_) => EventKind::BreachDeclared,
            EventBody::SuppressionAttempted(_) => EventKind::SuppressionAttempted,
            EventBody::BreachResponded(_) => EventKind::BreachResponded,
            EventBody::OverrideInvoked(_) => EventKind::OverrideInvoked,
            EventBody::OverrideConcluded(_) => EventKind::OverrideConcluded,
            EventBody::PrecedentCited(_) => EventKind::PrecedentCited,
            EventBody::PrecedentChallenged(_) => EventKind::PrecedentChallenged,
            EventBody::CostSnapshotAnnounced(_) => EventKind::CostSnapshotAnnounced,
            EventBody::HaltDeclared(_) => EventKind::HaltDeclared,
            EventBody::ForkDetected(_) => EventKind::ForkDetected,
        }
    }

    /// Validate the body schema beyond what serde enforces.
    ///
    /// Rejections here are `SchemaViolation`: the event is not written and
    /// no halt results.
    pub fn validate(&self) -> Result<(), ConclaveError> {
        match self {
            EventBody::CycleOpened(b) => {
                if b.cycle_number == 0 {
                    return Err(schema("cycle_number must start at 1"));
                }
            }
            EventBody::CycleClosed(_) => {}
            EventBody::RollCallCompleted(b) => {
                if b.roster.is_empty() {
                    return Err(schema("roster must not be empty"));
                }
                if b.roster.len() > MAX_ROSTER_SIZE {
                    return Err(schema("roster exceeds maximum size"));
                }
                let mut seen = std::collections::HashSet::new();
                for actor in &b.roster {
                    if !seen.insert(actor) {
                        return Err(schema("roster contains duplicate actors"));
                    }
                }
            }
            EventBody::AgentUtterance(b) => {
                if b.text.is_empty() {
                    return Err(schema("utterance text must not be empty"));
                }
                if b.text.len() > MAX_UTTERANCE_BYTES {
                    return Err(schema("utterance text exceeds size bound"));
                }
            }
            EventBody::MotionProposed(b) => {
                if b.text.is_empty() {
                    return Err(schema("motion text must not be empty"));
                }
                if b.text.len() > MAX_MOTION_TEXT_BYTES {
                    return Err(schema("motion text exceeds size bound"));
                }
                if b.supporters.is_empty() {
                    return Err(schema("a motion needs at least one supporter"));
                }
                let mut seen = std::collections::HashSet::new();
                for actor in &b.supporters {
                    if !seen.insert(actor) {
                        return Err(schema("supporters contains duplicates"));
                    }
                }
                if b.consensus_level != ConsensusLevel::from_supporter_count(b.supporters.len()) {
                    return Err(schema("consensus level does not match supporter count"));
                }
            }
            EventBody::VoteCast(b) => {
                if let Some(j) = &b.justification {
                    if j.len() > MAX_TEXT_BYTES {
                        return Err(schema("justification exceeds size bound"));
                    }
                }
            }
            EventBody::VoteTallied(b) => {
                if b.roster_size == 0 {
                    return Err(schema("tally roster_size must be positive"));
                }
                let cast = b.yea + b.nay + b.abstain + b.present;
                if cast > b.roster_size {
                    return Err(schema("tally exceeds roster size"));
                }
            }
            EventBody::MotionResolved(_) => {}
            EventBody::DissolutionTriggered(_) => {}
            EventBody::ReconsiderMotion(_) => {}
            EventBody::DissolveMotion(_) => {}
            EventBody::ReformMotion(_) => {}
            EventBody::SuspensionBegan(b) => {
                if b.reason.is_empty() {
                    return Err(schema("suspension reason must not be empty"));
                }
            }
            EventBody::BreachDeclared(b) => {
                if b.kind.is_empty() {
                    return Err(schema("breach kind must not be empty"));
                }
                if b.description.len() > MAX_TEXT_BYTES {
                    return Err(schema("breach description exceeds size bound"));
                }
            }
            EventBody::SuppressionAttempted(b) => {
                if b.suppressed.is_empty() {
                    return Err(schema("suppression must name the buried breaches"));
                }
            }
            EventBody::BreachResponded(b) => {
                if b.response.is_empty() {
                    return Err(schema("breach response must not be empty"));
                }
                if b.response.len() > MAX_TEXT_BYTES {
                    return Err(schema("breach response exceeds size bound"));
                }
            }
            EventBody::OverrideInvoked(b) => {
                if b.declaration.is_empty() {
                    return Err(schema("override declaration must be captured verbatim"));
                }
                if b.declaration.len() > MAX_TEXT_BYTES {
                    return Err(schema("override declaration exceeds size bound"));
                }
                if b.scope.is_empty() {
                    return Err(schema("override scope must be explicit"));
                }
            }
            EventBody::OverrideConcluded(b) => {
                if b.summary.len() > MAX_TEXT_BYTES {
                    return Err(schema("override summary exceeds size bound"));
                }
            }
            EventBody::PrecedentCited(c) => {
                if c.binding {
                    return Err(schema("precedent citations are never binding"));
                }
                if c.grounds.is_empty() {
                    return Err(schema("citation grounds must not be empty"));
                }
                if c.grounds.len() > MAX_TEXT_BYTES {
                    return Err(schema("citation grounds exceed size bound"));
                }
            }
            EventBody::PrecedentChallenged(b) => {
                if b.grounds.is_empty() {
                    return Err(schema("challenge grounds must not be empty"));
                }
                if b.grounds.len() > MAX_TEXT_BYTES {
                    return Err(schema("challenge grounds exceed size bound"));
                }
            }
            EventBody::CostSnapshotAnnounced(_) => {}
            EventBody::HaltDeclared(b) => {
                if b.reason.is_empty() {
                    return Err(schema("halt reason must not be empty"));
                }
            }
            EventBody::ForkDetected(b) => {
                if b.detail.is_empty() {
                    return Err(schema("fork detail must not be empty"));
                }
            }
        }
        Ok(())
    }
}

fn schema(detail: &str) -> ConclaveError {
    ConclaveError::SchemaViolation {
        detail: detail.to_string(),
    }
}

// ============================================================================
// Event record
// ============================================================================

/// One appended, immutable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Content-addressed id, derived from `chain_hash`
    pub event_id: EventId,
    /// Parent hash in this actor's identity chain
    pub prev_hash: ChainHash,
    /// Hash over header + body + prev_hash, computed at the trust boundary
    pub chain_hash: ChainHash,
    /// Actor signature over `chain_hash`, computed at the trust boundary
    pub signature: EventSignature,
    /// Monotonic timestamp from the TimeAuthority
    pub timestamp: Timestamp,
    /// The authoring identity
    pub actor_id: ActorId,
    /// The cycle this event belongs to
    pub cycle_id: CycleId,
    /// Kind-tagged payload
    pub body: EventBody,
    /// Witness co-signatures over `chain_hash`
    pub witnesses: Vec<WitnessSignature>,
}

impl Event {
    /// The kind discriminant of this event
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    /// One-line summary for logs and transcripts
    pub fn summary(&self) -> String {
        match &self.body {
            EventBody::CycleOpened(b) => format!("cycle {} opened", b.cycle_number),
            EventBody::CycleClosed(b) => format!(
                "cycle closed ({} motions, {} breaches carried)",
                b.carried_motions.len(),
                b.carried_breaches.len()
            ),
            EventBody::RollCallCompleted(b) => format!("roll call: {} attending", b.roster.len()),
            EventBody::AgentUtterance(b) => format!("utterance (turn {})", b.turn),
            EventBody::MotionProposed(b) => {
                format!("motion proposed at {:?} ({} supporters)", b.consensus_level, b.supporters.len())
            }
            EventBody::VoteCast(b) => format!("vote cast: {:?}", b.choice),
            EventBody::VoteTallied(b) => {
                format!("tally: {} yea / {} nay / {} abstain", b.yea, b.nay, b.abstain)
            }
            EventBody::MotionResolved(b) => format!("motion resolved: {:?}", b.outcome),
            EventBody::DissolutionTriggered(_) => "dissolution deliberation entered".to_string(),
            EventBody::ReconsiderMotion(_) => "reconsidered: returning to open".to_string(),
            EventBody::DissolveMotion(_) => "dissolution adopted".to_string(),
            EventBody::ReformMotion(_) => "reform adopted".to_string(),
            EventBody::SuspensionBegan(b) => {
                if b.terminal {
                    "terminal suspension began".to_string()
                } else {
                    "suspension began".to_string()
                }
            }
            EventBody::BreachDeclared(b) => format!("breach declared: {}", b.kind),
            EventBody::SuppressionAttempted(b) => {
                format!("suppression attempted over {} breaches", b.suppressed.len())
            }
            EventBody::BreachResponded(_) => "breach responded".to_string(),
            EventBody::OverrideInvoked(b) => format!("override invoked: {}", b.scope),
            EventBody::OverrideConcluded(_) => "override concluded".to_string(),
            EventBody::PrecedentCited(c) => format!("precedent cited (binding={})", c.binding),
            EventBody::PrecedentChallenged(_) => "precedent challenged".to_string(),
            EventBody::CostSnapshotAnnounced(s) => {
                format!("cost snapshot: {} units / {}s", s.compute_units, s.wall_clock_seconds)
            }
            EventBody::HaltDeclared(b) => format!("halt declared: {}", b.reason),
            EventBody::ForkDetected(b) => format!("fork detected: {}", b.detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(text: &str) -> EventBody {
        EventBody::AgentUtterance(UtteranceBody {
            text: text.to_string(),
            turn: 1,
        })
    }

    #[test]
    fn test_kind_discriminant() {
        assert_eq!(utterance("speak").kind(), EventKind::AgentUtterance);
    }

    #[test]
    fn test_empty_utterance_rejected() {
        assert!(utterance("").validate().is_err());
        assert!(utterance("words").validate().is_ok());
    }

    #[test]
    fn test_oversized_utterance_rejected() {
        let body = utterance(&"x".repeat(MAX_UTTERANCE_BYTES + 1));
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_binding_citation_rejected() {
        let citation = EventBody::PrecedentCited(PrecedentCitation {
            citer_id: ActorId::new(),
            cited_event_id: EventId::from_chain_hash(&ChainHash::genesis()),
            grounds: "prior tally in cycle 3".to_string(),
            binding: true,
        });
        assert!(citation.validate().is_err());
    }

    #[test]
    fn test_duplicate_roster_rejected() {
        let actor = ActorId::new();
        let body = EventBody::RollCallCompleted(RollCallBody {
            roster: vec![actor.clone(), actor],
        });
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_consensus_level_must_match_supporters() {
        let supporters: Vec<ActorId> = (0..4).map(|_| ActorId::new()).collect();
        let body = EventBody::MotionProposed(MotionProposedBody {
            motion_id: MotionId::new(),
            kind: MotionKind::Ordinary,
            text: "adopt the intake schedule".to_string(),
            supporters,
            consensus_level: ConsensusLevel::Low,
        });
        // 4 supporters derive Medium, not Low
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{"kind":"AgentUtterance","payload":{"text":"hi","turn":1,"extra":true}}"#;
        let parsed: Result<EventBody, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_body_serde_roundtrip() {
        let body = utterance("the floor recognizes the third seat");
        let json = serde_json::to_string(&body).unwrap();
        let back: EventBody = serde_json::from_str(&json).unwrap();
        assert_eq!(body, back);
    }
}
