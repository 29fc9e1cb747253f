//! End-to-end scenarios for the deliberation core
//!
//! Each test drives the public surface the way an operator and a roster
//! of agents would, then checks the log, the halt state, and the replay
//! of ritual state against what actually happened.

use std::sync::Arc;

use conclave_halt::HaltController;
use conclave_ledger::{
    EventDraft, EventStore, Ledger, ManualTimeAuthority, MemoryStore, TimeAuthority,
};
use conclave_pipeline::{CloseOutcome, ConclaveCore, IntakeOutcome, OpenOutcome};
use conclave_types::{
    ActorId, ChainHash, ClientToken, ConclaveConfig, ConclaveError, CycleState, EventBody,
    EventKind, MotionKind, MotionOutcome, MotionStatus, Timestamp, UtteranceBody, VoteChoice,
};

fn config() -> ConclaveConfig {
    ConclaveConfig::default()
}

async fn core_with_archons(n: usize) -> (ConclaveCore, Vec<ActorId>, Arc<ManualTimeAuthority>) {
    let time = Arc::new(ManualTimeAuthority::new(1_000_000_000, 1_000));
    let core = ConclaveCore::with_parts(config(), Arc::new(MemoryStore::new()), time.clone())
        .expect("core assembles");
    let mut archons = Vec::new();
    for _ in 0..n {
        archons.push(core.register_archon().expect("register"));
    }
    (core, archons, time)
}

async fn open_with_roster(core: &ConclaveCore, archons: &[ActorId]) {
    let chair = &archons[0];
    match core.open_cycle(chair).await.expect("open") {
        OpenOutcome::Opened { .. } => {}
        other => panic!("cycle should open, got {:?}", other),
    }
    core.roll_call(chair, archons.to_vec()).await.expect("roll call");
}

async fn kinds(core: &ConclaveCore) -> Vec<EventKind> {
    core.ledger()
        .all_events()
        .await
        .iter()
        .map(|e| e.kind())
        .collect()
}

// ----------------------------------------------------------------------
// Scenario: clean cycle
// ----------------------------------------------------------------------

#[tokio::test]
async fn clean_cycle_adopts_a_low_motion() {
    let (core, archons, _) = core_with_archons(4).await;
    let (a, b, c, d) = (&archons[0], &archons[1], &archons[2], &archons[3]);
    open_with_roster(&core, &archons).await;

    core.utter(a, "the floor opens on the intake schedule")
        .await
        .expect("utterance");

    let motion_id = core
        .propose_motion(
            a,
            MotionKind::Ordinary,
            "adopt the intake schedule",
            vec![a.clone(), b.clone()],
        )
        .await
        .expect("proposal");

    core.cast_vote(b, &motion_id, VoteChoice::Yea, None).await.expect("b votes");
    core.cast_vote(c, &motion_id, VoteChoice::Yea, None).await.expect("c votes");
    core.cast_vote(d, &motion_id, VoteChoice::Nay, None).await.expect("d votes");

    let outcome = core.resolve_motion(a, &motion_id).await.expect("resolution");
    assert_eq!(outcome, MotionOutcome::Adopted);

    // The declared tally is reproducible from the chain
    let events = core.ledger().all_events().await;
    let tally = events
        .iter()
        .find_map(|e| match &e.body {
            EventBody::VoteTallied(body) => Some(body.clone()),
            _ => None,
        })
        .expect("tally on chain");
    assert_eq!((tally.yea, tally.nay), (3, 1));

    match core.close_cycle(a, vec![]).await.expect("close") {
        CloseOutcome::Closed { final_state, .. } => assert_eq!(final_state, CycleState::Closed),
        other => panic!("close should succeed, got {:?}", other),
    }

    // Every chain verifies, and replay reproduces the adopted motion
    for report in core.verify_all().await.expect("verification") {
        assert!(report.is_clean(), "defects: {:?}", report.defects);
    }
    core.check_replay_law().await.expect("replay law");
    let state = core.state().await;
    assert_eq!(state.motions[&motion_id].status, MotionStatus::Adopted);

    let observed = kinds(&core).await;
    for expected in [
        EventKind::CycleOpened,
        EventKind::CostSnapshotAnnounced,
        EventKind::RollCallCompleted,
        EventKind::AgentUtterance,
        EventKind::MotionProposed,
        EventKind::VoteCast,
        EventKind::VoteTallied,
        EventKind::MotionResolved,
        EventKind::CycleClosed,
    ] {
        assert!(observed.contains(&expected), "missing {:?}", expected);
    }
}

// ----------------------------------------------------------------------
// Scenario: fork attempt from a stale instance
// ----------------------------------------------------------------------

#[tokio::test]
async fn fork_attempt_is_rejected_and_halts_the_chain() {
    // Two service instances over one store, one keyring, one halt
    // controller: the second instance is a stale copy of the same agent
    let store: Arc<dyn EventStore> = Arc::new(MemoryStore::new());
    let time: Arc<dyn TimeAuthority> = Arc::new(ManualTimeAuthority::new(1_000_000, 1_000));
    let keyring = Arc::new(conclave_crypto::Keyring::new());
    let halt = HaltController::new();

    let a = ActorId::new();
    keyring.register(a.clone()).unwrap();
    for _ in 0..3 {
        keyring.register(ActorId::new()).unwrap();
    }

    let ledger_live = Ledger::new(
        store.clone(),
        time.clone(),
        keyring.clone(),
        halt.clone(),
        Arc::new(conclave_identity::OpenFence),
        config(),
    )
    .unwrap();
    let ledger_stale = Ledger::new(
        store,
        time,
        keyring,
        halt,
        Arc::new(conclave_identity::OpenFence),
        config(),
    )
    .unwrap();

    let cycle_id = conclave_types::CycleId::new();
    let draft = |body: &str| EventDraft {
        actor_id: a.clone(),
        epoch: 1,
        cycle_id: cycle_id.clone(),
        body: EventBody::AgentUtterance(UtteranceBody {
            text: body.to_string(),
            turn: 1,
        }),
        intended_prev_hash: ChainHash::genesis(),
        client_token: ClientToken::new(),
        timestamp: None,
    };

    // The live instance writes e
    ledger_live.append(draft("event e")).await.expect("first write");

    // The stale instance offers f with the same parent
    let result = ledger_stale.append(draft("event f")).await;
    assert!(matches!(result, Err(ConclaveError::IntegrityFailure { .. })));

    // The fork is on record and both instances refuse further writes
    assert!(ledger_stale
        .all_events()
        .await
        .iter()
        .any(|e| e.kind() == EventKind::ForkDetected));
    let mut retry = draft("after the fork");
    retry.intended_prev_hash = ledger_live.tip(&a).await;
    assert!(matches!(
        ledger_live.append(retry).await,
        Err(ConclaveError::Halted { .. })
    ));
}

// ----------------------------------------------------------------------
// Scenario: suppressed breach
// ----------------------------------------------------------------------

#[tokio::test]
async fn suppressing_a_breach_blocks_close_and_eventually_halts() {
    let (core, archons, _) = core_with_archons(4).await;
    let (a, b) = (&archons[0], &archons[1]);
    open_with_roster(&core, &archons).await;

    let breach_id = core
        .declare_breach(b, "procedural", "the tally preceded the roll call".to_string())
        .await
        .expect("breach declared");

    // First attempt: recorded as suppression, cycle stays open
    match core.close_cycle(a, vec![]).await.expect("close attempt") {
        CloseOutcome::Blocked { unresolved, .. } => {
            assert_eq!(unresolved, vec![breach_id.clone()])
        }
        other => panic!("close should be blocked, got {:?}", other),
    }
    assert!(kinds(&core).await.contains(&EventKind::SuppressionAttempted));
    assert!(core.state().await.open_cycle().is_some());

    // Persisting past the grace declares the halt
    let result = core.close_cycle(a, vec![]).await.expect("second attempt");
    assert!(matches!(result, CloseOutcome::Blocked { .. }));
    assert!(core.halt_controller().is_halted());
    assert!(matches!(
        core.utter(a, "business as usual").await,
        Err(ConclaveError::Halted { .. })
    ));
}

#[tokio::test]
async fn responded_breach_allows_close() {
    let (core, archons, _) = core_with_archons(4).await;
    let (a, b) = (&archons[0], &archons[1]);
    open_with_roster(&core, &archons).await;

    let breach_id = core
        .declare_breach(b, "procedural", "missing justification".to_string())
        .await
        .expect("breach");
    core.respond_breach(a, &breach_id, "justification appended".to_string())
        .await
        .expect("response");

    match core.close_cycle(a, vec![]).await.expect("close") {
        CloseOutcome::Closed { final_state, .. } => assert_eq!(final_state, CycleState::Closed),
        other => panic!("close should succeed, got {:?}", other),
    }
}

// ----------------------------------------------------------------------
// Scenario: override expiry
// ----------------------------------------------------------------------

#[tokio::test]
async fn expired_override_breaches_and_blocks_the_next_open() {
    let (core, archons, time) = core_with_archons(4).await;
    let a = &archons[0];
    open_with_roster(&core, &archons).await;

    let override_id = core
        .invoke_override(a, "I invoke the emergency scope to revoke a runaway lease", "emergency", Some(1))
        .await
        .expect("override");

    // One hour passes; the monitor sweeps
    let expiry = Timestamp::from_micros(1_000_000_000).plus_hours(2);
    time.advance_to(expiry).await;
    let declared = core.sweep_overrides().await.expect("sweep");
    assert_eq!(declared.len(), 1);

    // The override did not silently end
    let state = core.state().await;
    assert!(!state.overrides[&override_id].concluded);
    assert!(state.overrides[&override_id].expiry_breached);

    // A second sweep is quiet: the breach is already on record
    assert!(core.sweep_overrides().await.expect("resweep").is_empty());

    // Close carries the breach; the next open blocks until response
    match core.close_cycle(a, declared.clone()).await.expect("close") {
        CloseOutcome::Closed { .. } => {}
        other => panic!("close should carry the breach, got {:?}", other),
    }
    match core.open_cycle(a).await.expect("open attempt") {
        OpenOutcome::Blocked { unresolved } => assert_eq!(unresolved, declared),
        other => panic!("open should block, got {:?}", other),
    }

    core.respond_breach(a, &declared[0], "the override is formally concluded late".to_string())
        .await
        .expect("response");
    assert!(matches!(
        core.open_cycle(a).await.expect("open"),
        OpenOutcome::Opened { .. }
    ));
}

// ----------------------------------------------------------------------
// Scenario: continuation rejected
// ----------------------------------------------------------------------

#[tokio::test]
async fn rejected_continuation_leads_to_indefinite_suspension() {
    let (core, archons, _) = core_with_archons(30).await;
    let chair = &archons[0];
    open_with_roster(&core, &archons).await;

    // Continuation backed by 16 supporters proposes at CRITICAL
    let supporters: Vec<ActorId> = archons[..16].to_vec();
    let motion_id = core
        .propose_motion(chair, MotionKind::Continuation, "continue operation", supporters)
        .await
        .expect("proposal");
    assert_eq!(
        core.state().await.motions[&motion_id].consensus_level,
        conclave_types::ConsensusLevel::Critical
    );

    // Six supporters defect, the rest of the roster votes nay: 10/20
    for archon in &archons[10..16] {
        core.cast_vote(archon, &motion_id, VoteChoice::Nay, None)
            .await
            .expect("defection");
    }
    for archon in &archons[16..] {
        core.cast_vote(archon, &motion_id, VoteChoice::Nay, None)
            .await
            .expect("nay");
    }

    let outcome = core.resolve_motion(chair, &motion_id).await.expect("resolution");
    assert_eq!(outcome, MotionOutcome::Rejected);

    let events = core.ledger().all_events().await;
    let tally = events
        .iter()
        .find_map(|e| match &e.body {
            EventBody::VoteTallied(body) => Some(body.clone()),
            _ => None,
        })
        .expect("tally");
    assert_eq!((tally.yea, tally.nay), (10, 20));

    // The cycle entered dissolution deliberation; nobody files a motion
    let cycle_id = {
        let state = core.state().await;
        let cycle = state.open_cycle().expect("cycle").clone();
        assert_eq!(cycle.state, CycleState::DissolutionDeliberation);
        cycle.cycle_id
    };

    match core.close_cycle(chair, vec![]).await.expect("close") {
        CloseOutcome::Closed { final_state, .. } => {
            assert_eq!(final_state, CycleState::IndefiniteSuspension)
        }
        other => panic!("close should land in suspension, got {:?}", other),
    }

    // The cycle is sealed: appends targeting it halt before anything else
    let draft = EventDraft {
        actor_id: chair.clone(),
        epoch: 1,
        cycle_id,
        body: EventBody::AgentUtterance(UtteranceBody {
            text: "too late".to_string(),
            turn: 99,
        }),
        intended_prev_hash: core.ledger().tip(chair).await,
        client_token: ClientToken::new(),
        timestamp: None,
    };
    assert!(matches!(
        core.ledger().append(draft).await,
        Err(ConclaveError::Halted { .. })
    ));
}

// ----------------------------------------------------------------------
// Scenario: precedent challenge
// ----------------------------------------------------------------------

#[tokio::test]
async fn citation_and_challenge_are_recorded_without_state_change() {
    let (core, archons, _) = core_with_archons(4).await;
    let (a, b) = (&archons[0], &archons[1]);
    open_with_roster(&core, &archons).await;

    let cited = core.utter(a, "a remark worth citing").await.expect("utterance");
    let state_before = core.state().await;

    core.cite_precedent(b, &cited, "the remark settled the order of intake")
        .await
        .expect("citation");
    // Turn order is unaffected by citations; the state change is nil
    core.challenge_precedent(a, &cited, "the remark was dictum, not holding")
        .await
        .expect("challenge");

    let events = core.ledger().all_events().await;
    let citation = events
        .iter()
        .find_map(|e| match &e.body {
            EventBody::PrecedentCited(c) => Some(c.clone()),
            _ => None,
        })
        .expect("citation on chain");
    assert!(!citation.binding);
    assert!(events.iter().any(|e| e.kind() == EventKind::PrecedentChallenged));

    let state_after = core.state().await;
    assert_eq!(state_before.cycles, state_after.cycles);
    assert_eq!(state_before.motions, state_after.motions);
    assert_eq!(state_before.breaches, state_after.breaches);
    core.check_replay_law().await.expect("replay law");
}

// ----------------------------------------------------------------------
// Boundary behaviors
// ----------------------------------------------------------------------

#[tokio::test]
async fn halt_first_every_operation_fails_under_halt() {
    let (core, archons, _) = core_with_archons(4).await;
    let (a, b) = (&archons[0], &archons[1]);
    open_with_roster(&core, &archons).await;

    core.declare_halt(a, "operator stop for audit").await.expect("halt");

    assert!(matches!(
        core.utter(b, "anyone there").await,
        Err(ConclaveError::Halted { .. })
    ));
    assert!(matches!(
        core.propose_motion(b, MotionKind::Ordinary, "text", vec![b.clone()]).await,
        Err(ConclaveError::Halted { .. })
    ));
    assert!(matches!(
        core.submit_petition("a петиция").await,
        Err(ConclaveError::Halted { .. })
    ));
    assert!(matches!(
        core.open_cycle(a).await,
        Err(ConclaveError::Halted { .. })
    ));
    assert!(matches!(
        core.close_cycle(a, vec![]).await,
        Err(ConclaveError::Halted { .. })
    ));
}

#[tokio::test]
async fn reform_is_the_only_exit_from_halt() {
    let (core, archons, _) = core_with_archons(4).await;
    let chair = &archons[0];
    open_with_roster(&core, &archons).await;

    // Reach dissolution deliberation through a failed continuation
    let continuation = core
        .propose_motion(chair, MotionKind::Continuation, "continue operation", vec![chair.clone()])
        .await
        .expect("continuation");
    for archon in &archons[1..] {
        core.cast_vote(archon, &continuation, VoteChoice::Nay, None)
            .await
            .expect("nay");
    }
    assert_eq!(
        core.resolve_motion(chair, &continuation).await.expect("resolution"),
        MotionOutcome::Rejected
    );

    // Adopt reform with the full roster behind it
    let reform = core
        .propose_motion(chair, MotionKind::Reform, "reconvene reformed", archons.to_vec())
        .await
        .expect("reform");
    assert_eq!(
        core.resolve_motion(chair, &reform).await.expect("resolution"),
        MotionOutcome::Adopted
    );

    // A halt declared before the close would survive anything but reform
    core.halt_controller().declare(
        conclave_types::HaltReason::Declared {
            declared_by: chair.clone(),
            reason: "declared during reform".to_string(),
        },
        Some(chair.clone()),
        Timestamp::from_micros(2_000_000_000),
    );

    assert!(matches!(
        core.close_cycle(chair, vec![]).await,
        Err(ConclaveError::Halted { .. })
    ));

    // Clearing happens only on the reform-opened cycle
    core.halt_controller().clear_for_reform();
    match core.close_cycle(chair, vec![]).await.expect("close") {
        CloseOutcome::Closed { final_state, .. } => assert_eq!(final_state, CycleState::Closed),
        other => panic!("close should succeed, got {:?}", other),
    }
    assert!(matches!(
        core.open_cycle(chair).await.expect("open"),
        OpenOutcome::Opened { .. }
    ));
}

#[tokio::test]
async fn quorum_unmet_writes_a_breach_not_a_tally() {
    let (core, archons, _) = core_with_archons(10).await;
    let chair = &archons[0];
    open_with_roster(&core, &archons).await;

    let motion_id = core
        .propose_motion(chair, MotionKind::Ordinary, "a quiet motion", vec![chair.clone()])
        .await
        .expect("proposal");
    core.cast_vote(&archons[1], &motion_id, VoteChoice::Yea, None)
        .await
        .expect("lone vote");

    let result = core.resolve_motion(chair, &motion_id).await;
    assert!(matches!(result, Err(ConclaveError::QuorumUnmet { .. })));

    let observed = kinds(&core).await;
    assert!(!observed.contains(&EventKind::VoteTallied));
    assert!(observed.contains(&EventKind::BreachDeclared));
    // The motion is still open; deliberation may continue
    assert!(core.state().await.motions[&motion_id].is_open());
}

#[tokio::test]
async fn intake_overrun_is_a_breach_and_stops_intake() {
    let mut config = config();
    config.intake_capacity = 2;
    let time = Arc::new(ManualTimeAuthority::new(1_000_000_000, 1_000));
    let core = ConclaveCore::with_parts(config, Arc::new(MemoryStore::new()), time)
        .expect("core");
    let archons: Vec<ActorId> = (0..4).map(|_| core.register_archon().unwrap()).collect();
    open_with_roster(&core, &archons).await;

    assert!(matches!(
        core.submit_petition("the first petition").await.unwrap(),
        IntakeOutcome::Admitted(_)
    ));
    assert!(matches!(
        core.submit_petition("the second petition").await.unwrap(),
        IntakeOutcome::Admitted(_)
    ));
    assert_eq!(
        core.submit_petition("the straw").await.unwrap(),
        IntakeOutcome::Overrun
    );
    assert_eq!(
        core.submit_petition("after the overrun").await.unwrap(),
        IntakeOutcome::Closed
    );

    let observed = kinds(&core).await;
    assert!(observed.contains(&EventKind::BreachDeclared));
    // The admitted items survive and drain in order
    assert_eq!(core.next_petition().await.unwrap().summary, "the first petition");
}

#[tokio::test]
async fn vote_replacement_follows_the_chain_sequence() {
    let (core, archons, _) = core_with_archons(4).await;
    let (a, b) = (&archons[0], &archons[1]);
    open_with_roster(&core, &archons).await;

    let motion_id = core
        .propose_motion(a, MotionKind::Ordinary, "the motion", vec![a.clone()])
        .await
        .expect("proposal");

    core.cast_vote(b, &motion_id, VoteChoice::Nay, None).await.expect("first");
    core.cast_vote(b, &motion_id, VoteChoice::Yea, Some("on reflection".to_string()))
        .await
        .expect("replacement");

    let state = core.state().await;
    let votes = state.votes_for(&motion_id);
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].choice, VoteChoice::Yea);

    // Once resolved, no further replacement lands
    core.resolve_motion(a, &motion_id).await.expect("resolution");
    assert!(matches!(
        core.cast_vote(b, &motion_id, VoteChoice::Nay, None).await,
        Err(ConclaveError::SchemaViolation { .. })
    ));
}

#[tokio::test]
async fn out_of_turn_utterance_is_rejected() {
    let (core, archons, _) = core_with_archons(3).await;
    open_with_roster(&core, &archons).await;

    // The floor belongs to the first roster seat
    assert!(matches!(
        core.utter(&archons[1], "me first").await,
        Err(ConclaveError::SchemaViolation { .. })
    ));
    core.utter(&archons[0], "in order").await.expect("in turn");
    core.utter(&archons[1], "now me").await.expect("second seat");
}

#[tokio::test]
async fn dissolve_motion_ceases_the_conclave() {
    let (core, archons, _) = core_with_archons(4).await;
    let chair = &archons[0];
    open_with_roster(&core, &archons).await;

    let continuation = core
        .propose_motion(chair, MotionKind::Continuation, "continue operation", vec![chair.clone()])
        .await
        .expect("continuation");
    for archon in &archons[1..] {
        core.cast_vote(archon, &continuation, VoteChoice::Nay, None)
            .await
            .expect("nay");
    }
    core.resolve_motion(chair, &continuation).await.expect("rejected");

    let dissolve = core
        .propose_motion(chair, MotionKind::Dissolve, "dissolve permanently", archons.to_vec())
        .await
        .expect("dissolve");
    assert_eq!(
        core.resolve_motion(chair, &dissolve).await.expect("resolution"),
        MotionOutcome::Adopted
    );

    let observed = kinds(&core).await;
    assert!(observed.contains(&EventKind::DissolveMotion));
    assert!(observed.contains(&EventKind::SuspensionBegan));

    // Terminal: the conclave does not reconvene
    assert!(core.state().await.ceased);
    assert!(matches!(
        core.open_cycle(chair).await,
        Err(ConclaveError::Halted { .. })
    ));
}
