//! The ritual fold
//!
//! `RitualState` is everything the rituals remember, and `apply` is the
//! only way it changes. Preconditions (who may append what, when) are
//! enforced by the pipeline before events exist; the fold assumes the
//! log is the truth and reproduces state from it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use conclave_types::{
    ActorId, BreachId, CostSnapshot, Cycle, CycleId, CycleState, Event, EventBody, Motion,
    MotionId, MotionKind, MotionStatus, OverrideId, PipelineStage, Timestamp, Vote,
};

/// The structured kind string for an expired override breach.
pub const OVERRIDE_EXPIRED_KIND: &str = "override-expired";
/// The structured kind string for intake overflow.
pub const INTAKE_OVERRUN_KIND: &str = "intake-overrun";
/// The structured kind string for a missing cost snapshot.
pub const COST_SNAPSHOT_MISSING_KIND: &str = "cost-snapshot-missing";
/// The structured kind string for a tally without resolution.
pub const QUORUM_UNMET_KIND: &str = "quorum-unmet";

/// A declared breach and its acknowledgment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachRecord {
    pub breach_id: BreachId,
    pub cycle_id: CycleId,
    pub declared_by: ActorId,
    pub kind: String,
    pub description: String,
    pub declared_at: Timestamp,
    pub responded: bool,
    /// Set when the breach crossed a cycle boundary unresolved
    pub carried: bool,
}

/// An override invocation and its conclusion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub override_id: OverrideId,
    pub invoked_by: ActorId,
    pub scope: String,
    pub declaration: String,
    pub invoked_at: Timestamp,
    pub expires_at: Timestamp,
    pub concluded: bool,
    /// An expiry breach has been declared for this override
    pub expiry_breached: bool,
}

impl OverrideRecord {
    /// Live and past its limit, with no expiry breach on record yet
    pub fn expired_unflagged(&self, now: Timestamp) -> bool {
        !self.concluded && !self.expiry_breached && now >= self.expires_at
    }
}

/// Everything the five rituals remember.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RitualState {
    pub cycles: BTreeMap<CycleId, Cycle>,
    /// Cycle ids in open order
    pub cycle_order: Vec<CycleId>,
    pub motions: BTreeMap<MotionId, Motion>,
    /// Live votes after the replacement rule, per motion per voter
    pub votes: BTreeMap<MotionId, BTreeMap<ActorId, Vote>>,
    pub breaches: BTreeMap<BreachId, BreachRecord>,
    pub overrides: BTreeMap<OverrideId, OverrideRecord>,
    pub cost_snapshots: BTreeMap<CycleId, CostSnapshot>,
    /// Suppression attempts per cycle
    pub suppressions: BTreeMap<CycleId, u32>,
    /// Utterances folded per cycle, which is also the next turn index
    pub turns: BTreeMap<CycleId, u64>,
    /// Set when a terminal cessation event has been folded
    pub ceased: bool,
    /// Set by an adopted reform motion; cleared when the next cycle
    /// opens. The one path out of a sticky halt.
    pub reform_pending: bool,
}

impl RitualState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event. Total over well-formed logs; events that reference
    /// unknown records are ignored rather than invented.
    pub fn apply(&mut self, event: &Event) {
        debug!(kind = %event.kind(), "folding event");
        match &event.body {
            EventBody::CycleOpened(body) => {
                self.reform_pending = false;
                let cycle = Cycle {
                    cycle_id: event.cycle_id.clone(),
                    number: body.cycle_number,
                    state: CycleState::Open,
                    stage: PipelineStage::Open,
                    chair: body.chair.clone(),
                    roster: Vec::new(),
                    opened_at: event.timestamp,
                    closed_at: None,
                };
                self.cycles.insert(event.cycle_id.clone(), cycle);
                self.cycle_order.push(event.cycle_id.clone());
            }
            EventBody::RollCallCompleted(body) => {
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    cycle.roster = body.roster.clone();
                    advance(cycle, PipelineStage::Intake);
                }
            }
            EventBody::AgentUtterance(_) => {
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    advance(cycle, PipelineStage::Deliberation);
                }
                *self.turns.entry(event.cycle_id.clone()).or_insert(0) += 1;
            }
            EventBody::MotionProposed(body) => {
                let motion = Motion {
                    motion_id: body.motion_id.clone(),
                    cycle_id: event.cycle_id.clone(),
                    kind: body.kind,
                    text: body.text.clone(),
                    consensus_level: body.consensus_level,
                    proposer: event.actor_id.clone(),
                    supporters: body.supporters.clone(),
                    status: MotionStatus::Pending,
                    proposed_at: event.timestamp,
                };
                self.motions.insert(body.motion_id.clone(), motion);
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    advance(cycle, PipelineStage::MotionQueue);
                }
            }
            EventBody::VoteCast(body) => {
                let motion_open = self
                    .motions
                    .get(&body.motion_id)
                    .map(|m| m.is_open())
                    .unwrap_or(false);
                if motion_open {
                    let vote = Vote {
                        vote_id: body.vote_id.clone(),
                        motion_id: body.motion_id.clone(),
                        voter_id: event.actor_id.clone(),
                        choice: body.choice,
                        justification: body.justification.clone(),
                        sequence: body.sequence,
                        cast_at: event.timestamp,
                    };
                    let slot = self
                        .votes
                        .entry(body.motion_id.clone())
                        .or_default()
                        .entry(event.actor_id.clone());
                    match slot {
                        std::collections::btree_map::Entry::Vacant(entry) => {
                            entry.insert(vote);
                        }
                        std::collections::btree_map::Entry::Occupied(mut entry) => {
                            if entry.get().replaceable_by(&vote) {
                                entry.insert(vote);
                            }
                        }
                    }
                }
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    advance(cycle, PipelineStage::Voting);
                }
            }
            EventBody::VoteTallied(_) => {
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    advance(cycle, PipelineStage::Resolution);
                }
            }
            EventBody::MotionResolved(body) => {
                if let Some(motion) = self.motions.get_mut(&body.motion_id) {
                    if !motion.status.is_terminal() {
                        motion.status = body.outcome.into();
                    }
                }
            }
            EventBody::DissolutionTriggered(_) => {
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    cycle.state = CycleState::DissolutionDeliberation;
                    cycle.stage = PipelineStage::DissolutionDeliberation;
                }
            }
            EventBody::ReconsiderMotion(_) => {
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    if cycle.state == CycleState::DissolutionDeliberation {
                        cycle.state = CycleState::Open;
                        cycle.stage = PipelineStage::MotionQueue;
                    }
                }
            }
            EventBody::DissolveMotion(_) => {
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    if cycle.state == CycleState::DissolutionDeliberation {
                        cycle.state = CycleState::Dissolved;
                        cycle.closed_at = Some(event.timestamp);
                    }
                }
            }
            EventBody::ReformMotion(_) => {
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    if cycle.state == CycleState::DissolutionDeliberation {
                        cycle.state = CycleState::Reforming;
                        self.reform_pending = true;
                    }
                }
            }
            EventBody::SuspensionBegan(body) => {
                if body.terminal {
                    self.ceased = true;
                    if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                        if cycle.closed_at.is_none() {
                            cycle.closed_at = Some(event.timestamp);
                        }
                    }
                }
            }
            EventBody::BreachDeclared(body) => {
                self.breaches.insert(
                    body.breach_id.clone(),
                    BreachRecord {
                        breach_id: body.breach_id.clone(),
                        cycle_id: event.cycle_id.clone(),
                        declared_by: event.actor_id.clone(),
                        kind: body.kind.clone(),
                        description: body.description.clone(),
                        declared_at: event.timestamp,
                        responded: false,
                        carried: false,
                    },
                );
                if body.kind == OVERRIDE_EXPIRED_KIND {
                    if let Some(id) = parse_override_id(&body.description) {
                        if let Some(record) = self.overrides.get_mut(&id) {
                            record.expiry_breached = true;
                        }
                    }
                }
            }
            EventBody::SuppressionAttempted(_) => {
                *self.suppressions.entry(event.cycle_id.clone()).or_insert(0) += 1;
            }
            EventBody::BreachResponded(body) => {
                if let Some(record) = self.breaches.get_mut(&body.breach_id) {
                    record.responded = true;
                }
            }
            EventBody::OverrideInvoked(body) => {
                self.overrides.insert(
                    body.override_id.clone(),
                    OverrideRecord {
                        override_id: body.override_id.clone(),
                        invoked_by: event.actor_id.clone(),
                        scope: body.scope.clone(),
                        declaration: body.declaration.clone(),
                        invoked_at: event.timestamp,
                        expires_at: body.expires_at,
                        concluded: false,
                        expiry_breached: false,
                    },
                );
            }
            EventBody::OverrideConcluded(body) => {
                if let Some(record) = self.overrides.get_mut(&body.override_id) {
                    record.concluded = true;
                }
            }
            EventBody::CycleClosed(body) => {
                for breach_id in &body.carried_breaches {
                    if let Some(record) = self.breaches.get_mut(breach_id) {
                        record.carried = true;
                    }
                }
                for motion_id in &body.carried_motions {
                    if let Some(motion) = self.motions.get_mut(motion_id) {
                        if motion.status == MotionStatus::Pending {
                            motion.status = MotionStatus::Tabled;
                        }
                    }
                }
                if let Some(cycle) = self.cycles.get_mut(&event.cycle_id) {
                    // No motion filed during dissolution deliberation:
                    // the close lands in indefinite suspension
                    cycle.state = match cycle.state {
                        CycleState::DissolutionDeliberation => CycleState::IndefiniteSuspension,
                        CycleState::Reforming => CycleState::Closed,
                        _ => CycleState::Closed,
                    };
                    cycle.stage = PipelineStage::Closing;
                    cycle.closed_at = Some(event.timestamp);
                }
            }
            EventBody::CostSnapshotAnnounced(snapshot) => {
                self.cost_snapshots
                    .insert(event.cycle_id.clone(), snapshot.clone());
            }
            EventBody::PrecedentCited(_) | EventBody::PrecedentChallenged(_) => {
                // Attribution only: no state change results from a
                // citation or its challenge
            }
            EventBody::HaltDeclared(_) | EventBody::ForkDetected(_) => {
                // Halt lives in the controller; the fold keeps the
                // events visible through the log itself
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The most recently opened cycle still accepting work
    pub fn open_cycle(&self) -> Option<&Cycle> {
        self.cycle_order
            .iter()
            .rev()
            .filter_map(|id| self.cycles.get(id))
            .find(|c| c.state.accepts_work())
    }

    /// The most recent non-terminal cycle: accepting work, or reforming
    /// and awaiting its close
    pub fn unfinished_cycle(&self) -> Option<&Cycle> {
        self.cycle_order
            .iter()
            .rev()
            .filter_map(|id| self.cycles.get(id))
            .find(|c| !c.state.is_terminal())
    }

    /// A specific cycle
    pub fn cycle(&self, cycle_id: &CycleId) -> Option<&Cycle> {
        self.cycles.get(cycle_id)
    }

    /// Next expected speaker for a cycle's turn-taking order
    pub fn expected_speaker(&self, cycle_id: &CycleId) -> Option<&ActorId> {
        let cycle = self.cycles.get(cycle_id)?;
        if cycle.roster.is_empty() {
            return None;
        }
        let turn = self.turns.get(cycle_id).copied().unwrap_or(0);
        cycle.roster.get((turn as usize) % cycle.roster.len())
    }

    /// Current turn index for a cycle
    pub fn turn(&self, cycle_id: &CycleId) -> u64 {
        self.turns.get(cycle_id).copied().unwrap_or(0)
    }

    /// Live (replacement-resolved) votes for a motion
    pub fn votes_for(&self, motion_id: &MotionId) -> Vec<&Vote> {
        self.votes
            .get(motion_id)
            .map(|by_voter| by_voter.values().collect())
            .unwrap_or_default()
    }

    /// Breaches declared in a cycle and not yet responded to
    pub fn unresolved_breaches_in(&self, cycle_id: &CycleId) -> Vec<&BreachRecord> {
        self.breaches
            .values()
            .filter(|b| &b.cycle_id == cycle_id && !b.responded)
            .collect()
    }

    /// All unresolved breaches, any cycle
    pub fn unresolved_breaches(&self) -> Vec<&BreachRecord> {
        self.breaches.values().filter(|b| !b.responded).collect()
    }

    /// Unresolved breaches that already crossed a boundary
    pub fn carried_unresolved_breaches(&self) -> Vec<&BreachRecord> {
        self.breaches
            .values()
            .filter(|b| b.carried && !b.responded)
            .collect()
    }

    /// Overrides past their limit with no conclusion and no expiry
    /// breach yet. The monitor turns each into a breach event; nothing
    /// concludes silently.
    pub fn expired_overrides(&self, now: Timestamp) -> Vec<&OverrideRecord> {
        self.overrides
            .values()
            .filter(|o| o.expired_unflagged(now))
            .collect()
    }

    /// Pending motions of a cycle (for carry-forward at close)
    pub fn pending_motions_in(&self, cycle_id: &CycleId) -> Vec<&Motion> {
        self.motions
            .values()
            .filter(|m| &m.cycle_id == cycle_id && m.status == MotionStatus::Pending)
            .collect()
    }

    /// Whether a dissolution-deliberation motion kind was adopted in a
    /// cycle (used to distinguish reform exits from suspension at close)
    pub fn adopted_kind_in(&self, cycle_id: &CycleId, kind: MotionKind) -> bool {
        self.motions.values().any(|m| {
            &m.cycle_id == cycle_id && m.kind == kind && m.status == MotionStatus::Adopted
        })
    }

    /// Whether the cost snapshot duty was met for a cycle
    pub fn cost_snapshot_announced(&self, cycle_id: &CycleId) -> bool {
        self.cost_snapshots.contains_key(cycle_id)
    }

    /// Suppression attempts recorded for a cycle
    pub fn suppression_count(&self, cycle_id: &CycleId) -> u32 {
        self.suppressions.get(cycle_id).copied().unwrap_or(0)
    }

    /// Breach ids unresolved in a cycle, for close bodies
    pub fn unresolved_breach_ids(&self, cycle_id: &CycleId) -> BTreeSet<BreachId> {
        self.unresolved_breaches_in(cycle_id)
            .into_iter()
            .map(|b| b.breach_id.clone())
            .collect()
    }
}

fn advance(cycle: &mut Cycle, to: PipelineStage) {
    if cycle.stage.can_advance_to(to) {
        cycle.stage = to;
    }
}

/// Recover the override id from an expiry breach description. The
/// monitor writes the id as the first token.
pub fn parse_override_id(description: &str) -> Option<OverrideId> {
    let token = description.split_whitespace().next()?;
    OverrideId::parse(token).ok()
}

/// Build the canonical description for an expiry breach.
pub fn override_expiry_description(override_id: &OverrideId, scope: &str) -> String {
    format!("{} passed the limit of scope '{}' without conclusion", override_id, scope)
}
