//! The conclave core: wiring and orchestration
//!
//! `ConclaveCore` assembles the ledger, the identity gate, the halt
//! controller, the ritual fold, the intake queue, and the cost meter,
//! and exposes the operations the rituals are made of. Every operation
//! consults the halt state first, enforces its preconditions, appends
//! through the ledger, and folds the resulting event into live state.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use conclave_crypto::Keyring;
use conclave_halt::HaltController;
use conclave_identity::LeaseGate;
use conclave_ledger::{
    ChainReport, EventDraft, Ledger, MemoryStore, MonotonicTimeAuthority, TimeAuthority,
};
use conclave_rituals::{
    check_replay, override_expiry_description, RitualState, COST_SNAPSHOT_MISSING_KIND,
    INTAKE_OVERRUN_KIND, OVERRIDE_EXPIRED_KIND, QUORUM_UNMET_KIND,
};
use conclave_types::{
    ActorId, BreachDeclaredBody, BreachId, BreachRespondedBody, ChainHash, ClientToken,
    ConclaveConfig, ConclaveError, ConsensusLevel, CycleClosedBody, CycleId, CycleOpenedBody,
    CycleState, DissolutionMotionBody, DissolutionTriggeredBody, EventBody, EventId,
    HaltDeclaredBody, HaltReason, MotionId, MotionKind, MotionOutcome, MotionProposedBody,
    MotionResolvedBody, OverrideConcludedBody, OverrideId, OverrideInvokedBody, Result,
    RollCallBody, SuppressionBody, SuspensionBody, UtteranceBody, VoteCastBody, VoteChoice,
    VoteId,
};
use conclave_witness::WITNESS_ANOMALY_KIND;

use crate::cost::CostMeter;
use crate::quarantine::{quarantine, IntakeOutcome, IntakeQueue, QuarantineSummary};
use crate::tally::tally;

/// Result of a cycle-open attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// Cycle opened; the cost snapshot followed immediately
    Opened {
        cycle_id: CycleId,
        opened: EventId,
        snapshot: EventId,
    },
    /// Carried unresolved breaches block the open until responded
    Blocked { unresolved: Vec<BreachId> },
}

/// Result of a cycle-close attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// Cycle closed; terminal state per the dissolution rituals
    Closed {
        event_id: EventId,
        final_state: CycleState,
    },
    /// Unresolved breaches not named for carry: the attempt is recorded
    /// as suppression and the cycle stays open
    Blocked {
        suppression: EventId,
        unresolved: Vec<BreachId>,
    },
}

/// Operator-facing status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub halted: bool,
    pub halt_reason: Option<String>,
    pub ceased: bool,
    pub open_cycle: Option<CycleId>,
    pub cycle_number: Option<u64>,
    pub cycle_state: Option<CycleState>,
    pub roster_size: usize,
    pub unresolved_breaches: usize,
    pub open_overrides: usize,
    pub event_count: u64,
}

/// The assembled deliberation core.
pub struct ConclaveCore {
    config: ConclaveConfig,
    keyring: Arc<Keyring>,
    halt: HaltController,
    gate: Arc<LeaseGate>,
    time: Arc<dyn TimeAuthority>,
    ledger: Arc<Ledger>,
    state: RwLock<RitualState>,
    intake: Mutex<Option<IntakeQueue>>,
    cost: CostMeter,
    /// Authors monitor-driven events (expiry breaches, anomaly reports)
    monitor_actor: ActorId,
}

impl ConclaveCore {
    /// Assemble a core over an in-memory store and the wall clock.
    pub fn new(config: ConclaveConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MonotonicTimeAuthority::new()),
        )
    }

    /// Assemble a core over explicit store and time authority.
    pub fn with_parts(
        config: ConclaveConfig,
        store: Arc<dyn conclave_ledger::EventStore>,
        time: Arc<dyn TimeAuthority>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(ConclaveError::schema)?;
        let keyring = Arc::new(Keyring::new());
        let halt = HaltController::new();
        let gate = Arc::new(LeaseGate::new(
            config.lease_ttl_seconds,
            config.lease_safety_margin_seconds,
        ));
        let ledger = Arc::new(Ledger::new(
            store,
            time.clone(),
            keyring.clone(),
            halt.clone(),
            gate.clone(),
            config.clone(),
        )?);
        let monitor_actor = ActorId::new();
        keyring
            .register(monitor_actor.clone())
            .map_err(|e| ConclaveError::integrity(e.to_string()))?;

        Ok(Self {
            config,
            keyring,
            halt,
            gate,
            time,
            ledger,
            state: RwLock::new(RitualState::new()),
            intake: Mutex::new(None),
            cost: CostMeter::new(),
            monitor_actor,
        })
    }

    // ------------------------------------------------------------------
    // Registration and accessors
    // ------------------------------------------------------------------

    /// Register a deliberating agent and provision its signing key.
    pub fn register_archon(&self) -> Result<ActorId> {
        let actor = ActorId::new();
        self.register_archon_with_id(actor.clone())?;
        Ok(actor)
    }

    /// Register an agent under a caller-chosen id (tests, re-provisioning).
    pub fn register_archon_with_id(&self, actor: ActorId) -> Result<()> {
        self.keyring
            .register(actor)
            .map_err(|e| ConclaveError::integrity(e.to_string()))?;
        Ok(())
    }

    pub fn halt_controller(&self) -> &HaltController {
        &self.halt
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn gate(&self) -> &Arc<LeaseGate> {
        &self.gate
    }

    pub fn config(&self) -> &ConclaveConfig {
        &self.config
    }

    pub fn cost_meter(&self) -> &CostMeter {
        &self.cost
    }

    pub fn monitor_actor(&self) -> &ActorId {
        &self.monitor_actor
    }

    /// Clone of the live ritual state
    pub async fn state(&self) -> RitualState {
        self.state.read().await.clone()
    }

    // ------------------------------------------------------------------
    // Cycle boundary ritual
    // ------------------------------------------------------------------

    /// Open a new cycle. The cost snapshot is announced immediately
    /// after the open event; its absence at close is a breach.
    pub async fn open_cycle(&self, chair: &ActorId) -> Result<OpenOutcome> {
        // An adopted reform in the previous cycle is the one path out of
        // a sticky halt, and it runs before the guard by construction
        let reform_exit = { self.state.read().await.reform_pending };
        if reform_exit && self.halt.is_halted() {
            self.halt.clear_for_reform();
        }

        self.halt.guard()?;

        let (already_open, ceased, unresolved, next_number) = {
            let state = self.state.read().await;
            let unresolved: Vec<BreachId> = state
                .unresolved_breaches()
                .iter()
                .map(|b| b.breach_id.clone())
                .collect();
            let next_number = state
                .cycles
                .values()
                .map(|c| c.number)
                .max()
                .unwrap_or(0)
                + 1;
            (
                state.unfinished_cycle().is_some(),
                state.ceased,
                unresolved,
                next_number,
            )
        };

        if ceased {
            return Err(ConclaveError::halted("the conclave has ceased"));
        }
        if already_open {
            return Err(ConclaveError::schema("a cycle is already open"));
        }
        if !unresolved.is_empty() {
            warn!(count = unresolved.len(), "cycle open blocked by unresolved breaches");
            return Ok(OpenOutcome::Blocked { unresolved });
        }

        let cycle_id = CycleId::new();
        let opened = self
            .commit(
                chair,
                &cycle_id,
                EventBody::CycleOpened(CycleOpenedBody {
                    cycle_number: next_number,
                    chair: chair.clone(),
                }),
            )
            .await?;

        let now = self.time.now().await?;
        self.cost.start(now);
        let snapshot_body = self.cost.snapshot(cycle_id.clone(), chair.clone(), now);
        let snapshot = self
            .commit(chair, &cycle_id, EventBody::CostSnapshotAnnounced(snapshot_body))
            .await?;

        *self.intake.lock().await = Some(IntakeQueue::new(self.config.intake_capacity));
        info!(cycle = %cycle_id, number = next_number, "cycle opened");

        Ok(OpenOutcome::Opened {
            cycle_id,
            opened,
            snapshot,
        })
    }

    /// Record the attending roster. No intake is admitted before this.
    pub async fn roll_call(&self, chair: &ActorId, roster: Vec<ActorId>) -> Result<EventId> {
        self.halt.guard()?;
        let cycle_id = self.require_open_cycle().await?;
        for actor in &roster {
            if !self.keyring.contains(actor) {
                return Err(ConclaveError::schema(format!(
                    "roster member {} holds no signing key",
                    actor
                )));
            }
        }
        self.commit(
            chair,
            &cycle_id,
            EventBody::RollCallCompleted(RollCallBody { roster }),
        )
        .await
    }

    /// Close the open cycle. Unresolved breaches must be responded to or
    /// explicitly named for carry; anything else is suppression.
    pub async fn close_cycle(&self, chair: &ActorId, carry: Vec<BreachId>) -> Result<CloseOutcome> {
        self.halt.guard()?;
        let cycle_id = self.require_open_cycle().await?;

        // The open-time duty is checked at close
        let snapshot_missing = {
            let state = self.state.read().await;
            !state.cost_snapshot_announced(&cycle_id)
        };
        if snapshot_missing {
            let monitor = self.monitor_actor.clone();
            self.declare_breach_inner(
                &monitor,
                &cycle_id,
                COST_SNAPSHOT_MISSING_KIND,
                "cycle opened without a cost snapshot announcement".to_string(),
            )
            .await?;
        }

        let unresolved: Vec<BreachId> = {
            let state = self.state.read().await;
            state
                .unresolved_breaches()
                .iter()
                .map(|b| b.breach_id.clone())
                .collect()
        };
        let suppressed: Vec<BreachId> = unresolved
            .iter()
            .filter(|b| !carry.contains(b))
            .cloned()
            .collect();

        if !suppressed.is_empty() {
            // The attempt itself is a separately witnessed breach
            let suppression = self
                .commit(
                    chair,
                    &cycle_id,
                    EventBody::SuppressionAttempted(SuppressionBody {
                        suppressed: suppressed.clone(),
                    }),
                )
                .await?;

            let attempts = {
                let state = self.state.read().await;
                state.suppression_count(&cycle_id)
            };
            if attempts > self.config.suppression_grace {
                let now = self.time.now().await?;
                self.halt.declare(
                    HaltReason::UnresolvedBreach {
                        breaches: suppressed.clone(),
                    },
                    Some(chair.clone()),
                    now,
                );
            }
            return Ok(CloseOutcome::Blocked {
                suppression,
                unresolved: suppressed,
            });
        }

        let (carried_motions, carried_breaches) = {
            let state = self.state.read().await;
            let motions: Vec<MotionId> = state
                .pending_motions_in(&cycle_id)
                .iter()
                .map(|m| m.motion_id.clone())
                .collect();
            let breaches: Vec<BreachId> = carry
                .into_iter()
                .filter(|b| unresolved.contains(b))
                .collect();
            (motions, breaches)
        };

        let event_id = self
            .commit(
                chair,
                &cycle_id,
                EventBody::CycleClosed(CycleClosedBody {
                    carried_motions,
                    carried_breaches,
                }),
            )
            .await?;

        let final_state = {
            let state = self.state.read().await;
            state
                .cycle(&cycle_id)
                .map(|c| c.state)
                .unwrap_or(CycleState::Closed)
        };
        // Terminal ends seal the cycle; an ordinary close stays readable
        // and still accepts the late acknowledgment of a carried breach
        if matches!(
            final_state,
            CycleState::Dissolved | CycleState::IndefiniteSuspension
        ) {
            self.ledger.seal_cycle(cycle_id.clone());
        }
        *self.intake.lock().await = None;
        info!(cycle = %cycle_id, state = ?final_state, "cycle closed");

        Ok(CloseOutcome::Closed {
            event_id,
            final_state,
        })
    }

    // ------------------------------------------------------------------
    // Intake
    // ------------------------------------------------------------------

    /// Submit raw external text. It passes the quarantine boundary and a
    /// bounded queue; overflow is a recorded breach and closes intake.
    pub async fn submit_petition(&self, raw: &str) -> Result<IntakeOutcome> {
        self.halt.guard()?;
        let cycle_id = self.require_open_cycle().await?;
        self.require_cycle_state(&cycle_id, &[CycleState::Open]).await?;
        {
            let state = self.state.read().await;
            let cycle = state
                .cycle(&cycle_id)
                .ok_or_else(|| ConclaveError::schema("no such cycle"))?;
            if cycle.roster.is_empty() {
                return Err(ConclaveError::schema(
                    "no item may be admitted before roll call",
                ));
            }
        }

        // No time, no intake: the authority is the only clock
        let now = self.time.now().await?;
        let summary = quarantine(raw, now)?;

        let outcome = {
            let mut intake = self.intake.lock().await;
            match intake.as_mut() {
                Some(queue) => queue.offer(summary),
                None => return Err(ConclaveError::schema("intake is not open")),
            }
        };

        if outcome == IntakeOutcome::Overrun {
            let monitor = self.monitor_actor.clone();
            self.declare_breach_inner(
                &monitor,
                &cycle_id,
                INTAKE_OVERRUN_KIND,
                format!(
                    "intake queue reached its capacity of {}",
                    self.config.intake_capacity
                ),
            )
            .await?;
        }
        Ok(outcome)
    }

    /// Take the next quarantined item for deliberation
    pub async fn next_petition(&self) -> Option<QuarantineSummary> {
        self.intake.lock().await.as_mut().and_then(|q| q.next())
    }

    // ------------------------------------------------------------------
    // Deliberation
    // ------------------------------------------------------------------

    /// Record an utterance. Turn order follows the roster; identity and
    /// sequence are enforced, content is not.
    pub async fn utter(&self, actor: &ActorId, text: &str) -> Result<EventId> {
        self.halt.guard_actor(actor)?;
        let cycle_id = self.require_open_cycle().await?;
        self.require_cycle_state(&cycle_id, &[CycleState::Open]).await?;
        let turn = {
            let state = self.state.read().await;
            let cycle = state
                .cycle(&cycle_id)
                .ok_or_else(|| ConclaveError::schema("no such cycle"))?;
            if !cycle.attending(actor) {
                return Err(ConclaveError::schema(format!(
                    "{} is not on the cycle roster",
                    actor
                )));
            }
            match state.expected_speaker(&cycle_id) {
                Some(expected) if expected == actor => {}
                Some(expected) => {
                    return Err(ConclaveError::schema(format!(
                        "out of turn: the floor belongs to {}",
                        expected
                    )));
                }
                None => return Err(ConclaveError::schema("no roster, no floor")),
            }
            state.turn(&cycle_id)
        };

        self.cost.charge(text.len() as u64);
        self.commit(
            actor,
            &cycle_id,
            EventBody::AgentUtterance(UtteranceBody {
                text: text.to_string(),
                turn,
            }),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Motions and voting
    // ------------------------------------------------------------------

    /// Propose a motion. The consensus level derives from the supporter
    /// set at proposal time and never changes.
    pub async fn propose_motion(
        &self,
        proposer: &ActorId,
        kind: MotionKind,
        text: &str,
        mut supporters: Vec<ActorId>,
    ) -> Result<MotionId> {
        self.halt.guard_actor(proposer)?;
        let cycle_id = self.require_open_cycle().await?;
        {
            let state = self.state.read().await;
            let cycle = state
                .cycle(&cycle_id)
                .ok_or_else(|| ConclaveError::schema("no such cycle"))?;
            if !cycle.attending(proposer) {
                return Err(ConclaveError::schema(format!(
                    "{} is not on the cycle roster",
                    proposer
                )));
            }
            for supporter in &supporters {
                if !cycle.attending(supporter) {
                    return Err(ConclaveError::schema(format!(
                        "supporter {} is not on the cycle roster",
                        supporter
                    )));
                }
            }
            match cycle.state {
                CycleState::DissolutionDeliberation if !kind.admissible_in_dissolution() => {
                    return Err(ConclaveError::schema(
                        "dissolution deliberation admits only reconsider, dissolve, and reform motions",
                    ));
                }
                CycleState::Open if kind.admissible_in_dissolution() => {
                    return Err(ConclaveError::schema(
                        "reconsider, dissolve, and reform motions require dissolution deliberation",
                    ));
                }
                CycleState::Open | CycleState::DissolutionDeliberation => {}
                other => {
                    return Err(ConclaveError::schema(format!(
                        "no motions are admissible in cycle state {:?}",
                        other
                    )));
                }
            }
        }

        if !supporters.contains(proposer) {
            supporters.insert(0, proposer.clone());
        }
        let motion_id = MotionId::new();
        let consensus_level = ConsensusLevel::from_supporter_count(supporters.len());
        self.commit(
            proposer,
            &cycle_id,
            EventBody::MotionProposed(MotionProposedBody {
                motion_id: motion_id.clone(),
                kind,
                text: text.to_string(),
                supporters,
                consensus_level,
            }),
        )
        .await?;
        Ok(motion_id)
    }

    /// Cast (or replace) a vote on an open motion.
    pub async fn cast_vote(
        &self,
        voter: &ActorId,
        motion_id: &MotionId,
        choice: VoteChoice,
        justification: Option<String>,
    ) -> Result<EventId> {
        self.halt.guard_actor(voter)?;
        let cycle_id = self.require_open_cycle().await?;
        self.require_cycle_state(
            &cycle_id,
            &[CycleState::Open, CycleState::DissolutionDeliberation],
        )
        .await?;
        {
            let state = self.state.read().await;
            let motion = state
                .motions
                .get(motion_id)
                .ok_or_else(|| ConclaveError::schema("no such motion"))?;
            if !motion.is_open() {
                return Err(ConclaveError::schema("the motion is no longer open"));
            }
            let cycle = state
                .cycle(&cycle_id)
                .ok_or_else(|| ConclaveError::schema("no such cycle"))?;
            if !cycle.attending(voter) {
                return Err(ConclaveError::schema(format!(
                    "{} is not on the cycle roster",
                    voter
                )));
            }
        }

        // Replacement requires a strictly higher position in the voter's
        // identity chain; the next append is exactly that
        let sequence = self.ledger.chain_len(voter).await + 1;
        self.commit(
            voter,
            &cycle_id,
            EventBody::VoteCast(VoteCastBody {
                vote_id: VoteId::new(),
                motion_id: motion_id.clone(),
                choice,
                justification,
                sequence,
            }),
        )
        .await
    }

    /// Tally and resolve a motion: `VoteTallied` then `MotionResolved`,
    /// in sequence. A tally without quorum is not written; a breach is.
    pub async fn resolve_motion(
        &self,
        chair: &ActorId,
        motion_id: &MotionId,
    ) -> Result<MotionOutcome> {
        self.halt.guard_actor(chair)?;
        let cycle_id = self.require_open_cycle().await?;
        self.require_cycle_state(
            &cycle_id,
            &[CycleState::Open, CycleState::DissolutionDeliberation],
        )
        .await?;

        let (motion, result) = {
            let state = self.state.read().await;
            let motion = state
                .motions
                .get(motion_id)
                .ok_or_else(|| ConclaveError::schema("no such motion"))?
                .clone();
            if !motion.is_open() {
                return Err(ConclaveError::schema("the motion is already resolved"));
            }
            let cycle = state
                .cycle(&cycle_id)
                .ok_or_else(|| ConclaveError::schema("no such cycle"))?;
            let votes = state.votes_for(motion_id);
            let rule = self.config.thresholds.rule(motion.consensus_level);
            let result = tally(&motion, &votes, &cycle.roster, self.config.quorum_fraction, rule);
            (motion, result)
        };

        if !result.quorum_met {
            let required =
                ((result.roster_size as f64) * self.config.quorum_fraction).floor() as u32 + 1;
            self.declare_breach_inner(
                chair,
                &cycle_id,
                QUORUM_UNMET_KIND,
                format!(
                    "tally of {} attempted with {} of {} cast",
                    motion_id, result.cast, result.roster_size
                ),
            )
            .await?;
            return Err(ConclaveError::QuorumUnmet {
                motion_id: motion_id.to_string(),
                cast: result.cast,
                roster: result.roster_size,
                required,
            });
        }

        self.commit(chair, &cycle_id, EventBody::VoteTallied(result.to_body(&motion)))
            .await?;

        let outcome = if result.adopted {
            MotionOutcome::Adopted
        } else {
            MotionOutcome::Rejected
        };
        self.commit(
            chair,
            &cycle_id,
            EventBody::MotionResolved(MotionResolvedBody {
                motion_id: motion_id.clone(),
                outcome,
            }),
        )
        .await?;

        self.ritual_consequences(chair, &cycle_id, &motion, outcome)
            .await?;
        Ok(outcome)
    }

    /// Withdraw a still-pending motion. Only the proposer may.
    pub async fn withdraw_motion(&self, proposer: &ActorId, motion_id: &MotionId) -> Result<EventId> {
        self.halt.guard_actor(proposer)?;
        let cycle_id = self.require_open_cycle().await?;
        {
            let state = self.state.read().await;
            let motion = state
                .motions
                .get(motion_id)
                .ok_or_else(|| ConclaveError::schema("no such motion"))?;
            if !motion.is_open() {
                return Err(ConclaveError::schema("the motion is no longer open"));
            }
            if &motion.proposer != proposer {
                return Err(ConclaveError::schema("only the proposer may withdraw"));
            }
        }
        self.commit(
            proposer,
            &cycle_id,
            EventBody::MotionResolved(MotionResolvedBody {
                motion_id: motion_id.clone(),
                outcome: MotionOutcome::Withdrawn,
            }),
        )
        .await
    }

    /// The named-event consequences of a resolution: continuation
    /// rejection triggers dissolution deliberation; adopted dissolution
    /// motions produce their transition events; adopted dissolve begins
    /// cessation.
    async fn ritual_consequences(
        &self,
        chair: &ActorId,
        cycle_id: &CycleId,
        motion: &conclave_types::Motion,
        outcome: MotionOutcome,
    ) -> Result<()> {
        match (motion.kind, outcome) {
            (MotionKind::Continuation, MotionOutcome::Rejected) => {
                self.commit(
                    chair,
                    cycle_id,
                    EventBody::DissolutionTriggered(DissolutionTriggeredBody {
                        motion_id: motion.motion_id.clone(),
                    }),
                )
                .await?;
            }
            (MotionKind::Reconsider, MotionOutcome::Adopted) => {
                self.commit(
                    chair,
                    cycle_id,
                    EventBody::ReconsiderMotion(DissolutionMotionBody {
                        motion_id: motion.motion_id.clone(),
                    }),
                )
                .await?;
            }
            (MotionKind::Reform, MotionOutcome::Adopted) => {
                self.commit(
                    chair,
                    cycle_id,
                    EventBody::ReformMotion(DissolutionMotionBody {
                        motion_id: motion.motion_id.clone(),
                    }),
                )
                .await?;
            }
            (MotionKind::Dissolve, MotionOutcome::Adopted) => {
                self.commit(
                    chair,
                    cycle_id,
                    EventBody::DissolveMotion(DissolutionMotionBody {
                        motion_id: motion.motion_id.clone(),
                    }),
                )
                .await?;
                // Cessation: the final event, then the chain is sealed
                self.commit(
                    chair,
                    cycle_id,
                    EventBody::SuspensionBegan(SuspensionBody {
                        terminal: true,
                        reason: "dissolution adopted".to_string(),
                    }),
                )
                .await?;
                self.ledger.seal_cycle(cycle_id.clone());
                *self.intake.lock().await = None;
            }
            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Breach acknowledgment ritual
    // ------------------------------------------------------------------

    /// Declare a breach. Any actor may.
    pub async fn declare_breach(
        &self,
        actor: &ActorId,
        kind: &str,
        description: String,
    ) -> Result<BreachId> {
        self.halt.guard_actor(actor)?;
        let cycle_id = self.require_open_cycle().await?;
        self.declare_breach_inner(actor, &cycle_id, kind, description)
            .await
    }

    async fn declare_breach_inner(
        &self,
        actor: &ActorId,
        cycle_id: &CycleId,
        kind: &str,
        description: String,
    ) -> Result<BreachId> {
        let breach_id = BreachId::new();
        self.commit(
            actor,
            cycle_id,
            EventBody::BreachDeclared(BreachDeclaredBody {
                breach_id: breach_id.clone(),
                kind: kind.to_string(),
                description,
            }),
        )
        .await?;
        self.halt.record_breach(breach_id.clone());
        warn!(breach = %breach_id, kind, "breach declared");
        Ok(breach_id)
    }

    /// Respond to a declared breach. A carried breach blocking the next
    /// open is answered into its own cycle.
    pub async fn respond_breach(
        &self,
        actor: &ActorId,
        breach_id: &BreachId,
        response: String,
    ) -> Result<EventId> {
        self.halt.guard_actor(actor)?;
        let cycle_id = {
            let state = self.state.read().await;
            let record = state
                .breaches
                .get(breach_id)
                .ok_or_else(|| ConclaveError::schema("no such breach"))?;
            if record.responded {
                return Err(ConclaveError::schema("the breach is already responded"));
            }
            match state.unfinished_cycle() {
                Some(cycle) => cycle.cycle_id.clone(),
                None => record.cycle_id.clone(),
            }
        };
        let event_id = self
            .commit(
                actor,
                &cycle_id,
                EventBody::BreachResponded(BreachRespondedBody {
                    breach_id: breach_id.clone(),
                    response,
                }),
            )
            .await?;
        self.halt.resolve_breach(breach_id);
        Ok(event_id)
    }

    // ------------------------------------------------------------------
    // Override ritual
    // ------------------------------------------------------------------

    /// Invoke an override: verbatim declaration, explicit scope, a time
    /// limit. The event itself is the conclave notification.
    pub async fn invoke_override(
        &self,
        operator: &ActorId,
        declaration: &str,
        scope: &str,
        duration_hours: Option<u64>,
    ) -> Result<OverrideId> {
        self.halt.guard_actor(operator)?;
        let cycle_id = self.require_open_cycle().await?;
        let now = self.time.now().await?;
        let hours = duration_hours.unwrap_or(self.config.override_default_hours);
        let override_id = OverrideId::new();
        self.commit(
            operator,
            &cycle_id,
            EventBody::OverrideInvoked(OverrideInvokedBody {
                override_id: override_id.clone(),
                declaration: declaration.to_string(),
                scope: scope.to_string(),
                expires_at: now.plus_hours(hours as i64),
            }),
        )
        .await?;
        Ok(override_id)
    }

    /// Conclude an override. Mandatory; expiry without conclusion is a
    /// breach, never a silent end.
    pub async fn conclude_override(
        &self,
        operator: &ActorId,
        override_id: &OverrideId,
        summary: String,
    ) -> Result<EventId> {
        self.halt.guard_actor(operator)?;
        let cycle_id = self.require_open_cycle().await?;
        {
            let state = self.state.read().await;
            let record = state
                .overrides
                .get(override_id)
                .ok_or_else(|| ConclaveError::schema("no such override"))?;
            if record.concluded {
                return Err(ConclaveError::schema("the override is already concluded"));
            }
        }
        self.commit(
            operator,
            &cycle_id,
            EventBody::OverrideConcluded(OverrideConcludedBody {
                override_id: override_id.clone(),
                summary,
            }),
        )
        .await
    }

    /// Force-revoke an actor's lease under override scope. The
    /// revocation itself is the `OverrideInvoked` event.
    pub async fn revoke_lease_by_override(
        &self,
        operator: &ActorId,
        target: &ActorId,
        declaration: &str,
    ) -> Result<OverrideId> {
        let override_id = self
            .invoke_override(
                operator,
                declaration,
                &format!("lease-revocation:{}", target),
                Some(1),
            )
            .await?;
        self.gate.revoke(target);
        Ok(override_id)
    }

    /// The override monitor: one sweep. Every live override past its
    /// limit produces a `BreachDeclared { kind: "override-expired" }`.
    pub async fn sweep_overrides(&self) -> Result<Vec<BreachId>> {
        self.halt.guard()?;
        let cycle_id = self.require_open_cycle().await?;
        let now = self.time.now().await?;
        let expired: Vec<(OverrideId, String)> = {
            let state = self.state.read().await;
            state
                .expired_overrides(now)
                .iter()
                .map(|o| (o.override_id.clone(), o.scope.clone()))
                .collect()
        };

        let mut declared = Vec::new();
        let monitor = self.monitor_actor.clone();
        for (override_id, scope) in expired {
            let breach_id = self
                .declare_breach_inner(
                    &monitor,
                    &cycle_id,
                    OVERRIDE_EXPIRED_KIND,
                    override_expiry_description(&override_id, &scope),
                )
                .await?;
            declared.push(breach_id);
        }
        Ok(declared)
    }

    // ------------------------------------------------------------------
    // Precedent workflow
    // ------------------------------------------------------------------

    /// Cite a prior event as precedent. Never binding.
    pub async fn cite_precedent(
        &self,
        citer: &ActorId,
        cited_event_id: &EventId,
        grounds: &str,
    ) -> Result<EventId> {
        self.halt.guard_actor(citer)?;
        let cycle_id = self.require_open_cycle().await?;
        if self.ledger.get(cited_event_id).await.is_none() {
            return Err(ConclaveError::schema("the cited event does not exist"));
        }
        self.commit(
            citer,
            &cycle_id,
            conclave_witness::cite(citer.clone(), cited_event_id.clone(), grounds),
        )
        .await
    }

    /// Challenge a citation. A first-class event, not a reply.
    pub async fn challenge_precedent(
        &self,
        challenger: &ActorId,
        cited_event_id: &EventId,
        grounds: &str,
    ) -> Result<EventId> {
        self.halt.guard_actor(challenger)?;
        let cycle_id = self.require_open_cycle().await?;
        self.commit(
            challenger,
            &cycle_id,
            conclave_witness::challenge(cited_event_id.clone(), grounds),
        )
        .await
    }

    /// Check the collusion monitor and escalate anomalies: a
    /// witness-anomaly citation plus a breach per flagged pair.
    pub async fn report_witness_anomalies(&self) -> Result<Vec<EventId>> {
        self.halt.guard()?;
        let cycle_id = self.require_open_cycle().await?;
        let anomalies = self.ledger.witness_anomalies();
        if anomalies.is_empty() {
            return Ok(Vec::new());
        }

        let monitor = self.monitor_actor.clone();
        let mut reported = Vec::new();
        for anomaly in anomalies {
            // Cite the most recent event the pair co-signed
            let cited = self
                .latest_event_witnessed_by(&anomaly.pair.0, &anomaly.pair.1)
                .await;
            let Some(cited) = cited else { continue };
            let event_id = self
                .commit(
                    &monitor,
                    &cycle_id,
                    conclave_witness::cite_witness_anomaly(
                        monitor.clone(),
                        cited,
                        anomaly.frequency,
                        anomaly.observations,
                    ),
                )
                .await?;
            self.declare_breach_inner(
                &monitor,
                &cycle_id,
                WITNESS_ANOMALY_KIND,
                format!(
                    "witness pair ({}, {}) co-signed at frequency {:.2}",
                    anomaly.pair.0, anomaly.pair.1, anomaly.frequency
                ),
            )
            .await?;
            reported.push(event_id);
        }
        Ok(reported)
    }

    async fn latest_event_witnessed_by(&self, a: &ActorId, b: &ActorId) -> Option<EventId> {
        let events = self.ledger.all_events().await;
        events.iter().rev().find_map(|e| {
            let ids: Vec<&ActorId> = e.witnesses.iter().map(|w| &w.witness_id).collect();
            if ids.contains(&a) && ids.contains(&b) {
                Some(e.event_id.clone())
            } else {
                None
            }
        })
    }

    // ------------------------------------------------------------------
    // Halt surface
    // ------------------------------------------------------------------

    /// Explicit halt declaration by a witness or operator with override
    /// scope. The event is recorded, then the halt engages.
    pub async fn declare_halt(&self, actor: &ActorId, reason: &str) -> Result<EventId> {
        self.halt.guard_actor(actor)?;
        let cycle_id = self.require_open_cycle().await?;
        let event_id = self
            .commit(
                actor,
                &cycle_id,
                EventBody::HaltDeclared(HaltDeclaredBody {
                    reason: reason.to_string(),
                }),
            )
            .await?;
        let now = self.time.now().await?;
        self.halt.declare(
            HaltReason::Declared {
                declared_by: actor.clone(),
                reason: reason.to_string(),
            },
            Some(actor.clone()),
            now,
        );
        Ok(event_id)
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Verify every identity chain. Defects halt the affected chain.
    pub async fn verify_all(&self) -> Result<Vec<ChainReport>> {
        let mut reports = Vec::new();
        for actor in self.ledger.chain_actors().await {
            reports.push(self.ledger.verify_and_enforce(&actor).await?);
        }
        Ok(reports)
    }

    /// The replay law: folding the log reproduces the live state.
    pub async fn check_replay_law(&self) -> Result<()> {
        let events = self.ledger.all_events().await;
        let state = self.state.read().await;
        check_replay(&events, &state).map_err(ConclaveError::integrity)
    }

    /// Operator status snapshot
    pub async fn status(&self) -> StatusReport {
        let state = self.state.read().await;
        let halt_state = self.halt.state();
        let open = state.open_cycle();
        StatusReport {
            halted: halt_state.halted,
            halt_reason: halt_state.reason.as_ref().map(|r| r.describe()),
            ceased: state.ceased,
            open_cycle: open.map(|c| c.cycle_id.clone()),
            cycle_number: open.map(|c| c.number),
            cycle_state: open.map(|c| c.state),
            roster_size: open.map(|c| c.roster.len()).unwrap_or(0),
            unresolved_breaches: state.unresolved_breaches().len(),
            open_overrides: state
                .overrides
                .values()
                .filter(|o| !o.concluded)
                .count(),
            event_count: self.ledger.all_events().await.len() as u64,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn require_open_cycle(&self) -> Result<CycleId> {
        let state = self.state.read().await;
        state
            .unfinished_cycle()
            .map(|c| c.cycle_id.clone())
            .ok_or_else(|| ConclaveError::schema("no cycle is open"))
    }

    async fn require_cycle_state(&self, cycle_id: &CycleId, allowed: &[CycleState]) -> Result<()> {
        let state = self.state.read().await;
        let cycle = state
            .cycle(cycle_id)
            .ok_or_else(|| ConclaveError::schema("no such cycle"))?;
        if !allowed.contains(&cycle.state) {
            return Err(ConclaveError::schema(format!(
                "the cycle does not admit this step in state {:?}",
                cycle.state
            )));
        }
        Ok(())
    }

    /// Form, append, and fold one event under the actor's lease.
    async fn commit(&self, actor: &ActorId, cycle_id: &CycleId, body: EventBody) -> Result<EventId> {
        let token = ClientToken::new();
        let mut retried = false;
        loop {
            let epoch = self.ensure_lease(actor).await?;
            let tip = self.ledger.tip(actor).await;
            let draft = EventDraft {
                actor_id: actor.clone(),
                epoch,
                cycle_id: cycle_id.clone(),
                body: body.clone(),
                intended_prev_hash: tip,
                client_token: token.clone(),
                timestamp: None,
            };
            match self.ledger.append(draft).await {
                Ok(event_id) => {
                    if let Some(event) = self.ledger.get(&event_id).await {
                        self.state.write().await.apply(&event);
                    }
                    return Ok(event_id);
                }
                // The one retryable error, and only outside halt
                Err(e) if e.is_retriable() && !retried => {
                    self.halt.guard_actor(actor)?;
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn ensure_lease(&self, actor: &ActorId) -> Result<u64> {
        let now = self.time.now().await?;
        if let Some(lease) = self.gate.live_lease(actor, now) {
            return Ok(lease.epoch);
        }
        let lease = self.gate.acquire(actor.clone(), now)?;
        Ok(lease.epoch)
    }
}

/// Fraction of a tip hash rendered for operator display.
pub fn short_hash(hash: &ChainHash) -> &str {
    &hash.0[..8.min(hash.0.len())]
}
