//! Command implementations
//!
//! Every command runs against a session: a core assembled from the
//! configured store with a seated roster. Commands perform the minimal
//! ritual prelude they need (a vote needs a motion, a motion needs an
//! open cycle with a roll call) so each operator verb is exercisable
//! from a cold start.

use colored::*;

use conclave_observer::{AuditFilter, Observer};
use conclave_pipeline::{CloseOutcome, ConclaveCore, OpenOutcome};
use conclave_types::{
    ActorId, BreachId, ConclaveConfig, ConclaveError, CycleId, EventId, MotionId, MotionKind,
    Result, VoteChoice,
};

use crate::display;

/// An assembled core with a seated roster.
pub struct Session {
    pub core: ConclaveCore,
    pub archons: Vec<ActorId>,
}

impl Session {
    /// Assemble the core and provision the roster's signing keys.
    pub async fn start(config: ConclaveConfig, archons: usize) -> Result<Self> {
        tracing::info!(
            store = %config.store_dsn,
            time_authority = %config.time_authority_url,
            "assembling conclave core"
        );
        let core = ConclaveCore::new(config)?;
        let mut seated = Vec::new();
        for _ in 0..archons.max(3) {
            seated.push(core.register_archon()?);
        }
        Ok(Self {
            core,
            archons: seated,
        })
    }

    pub fn chair(&self) -> &ActorId {
        &self.archons[0]
    }

    /// Open a cycle and complete the roll call.
    pub async fn convene(&self) -> Result<CycleId> {
        let cycle_id = match self.core.open_cycle(self.chair()).await? {
            OpenOutcome::Opened { cycle_id, .. } => cycle_id,
            OpenOutcome::Blocked { unresolved } => {
                return Err(ConclaveError::halted(format!(
                    "{} unresolved breaches block the open",
                    unresolved.len()
                )))
            }
        };
        self.core
            .roll_call(self.chair(), self.archons.clone())
            .await?;
        Ok(cycle_id)
    }

    /// Convene and propose one motion.
    pub async fn convene_with_motion(
        &self,
        text: &str,
        supporters: usize,
        kind: MotionKind,
    ) -> Result<MotionId> {
        self.convene().await?;
        let supporters = self.archons[..supporters.clamp(1, self.archons.len())].to_vec();
        self.core
            .propose_motion(self.chair(), kind, text, supporters)
            .await
    }
}

pub async fn cycle_open(session: &Session) -> Result<()> {
    match session.core.open_cycle(session.chair()).await? {
        OpenOutcome::Opened {
            cycle_id,
            opened,
            snapshot,
        } => {
            println!("{} {}", "cycle opened".green().bold(), cycle_id);
            display::event_line(&session.core, &opened).await;
            display::event_line(&session.core, &snapshot).await;
        }
        OpenOutcome::Blocked { unresolved } => {
            println!(
                "{} {} unresolved breaches must be responded to first",
                "open blocked:".yellow().bold(),
                unresolved.len()
            );
            for breach in unresolved {
                println!("  {}", breach);
            }
        }
    }
    Ok(())
}

pub async fn cycle_close(session: &Session, carry: Vec<String>) -> Result<()> {
    session.convene().await?;
    let carry: Vec<BreachId> = carry
        .iter()
        .map(|s| {
            BreachId::parse(s).map_err(|_| ConclaveError::schema(format!("bad breach id: {}", s)))
        })
        .collect::<Result<_>>()?;

    match session.core.close_cycle(session.chair(), carry).await? {
        CloseOutcome::Closed {
            event_id,
            final_state,
        } => {
            println!("{} {:?}", "cycle closed:".green().bold(), final_state);
            display::event_line(&session.core, &event_id).await;
        }
        CloseOutcome::Blocked {
            suppression,
            unresolved,
        } => {
            println!(
                "{} {} unresolved breaches; the attempt is on record",
                "close blocked:".red().bold(),
                unresolved.len()
            );
            display::event_line(&session.core, &suppression).await;
        }
    }
    Ok(())
}

pub async fn roll_call(session: &Session) -> Result<()> {
    match session.core.open_cycle(session.chair()).await? {
        OpenOutcome::Opened { .. } => {}
        OpenOutcome::Blocked { unresolved } => {
            return Err(ConclaveError::halted(format!(
                "{} unresolved breaches block the open",
                unresolved.len()
            )))
        }
    }
    let event_id = session
        .core
        .roll_call(session.chair(), session.archons.clone())
        .await?;
    println!(
        "{} {} seats",
        "roll call completed:".green().bold(),
        session.archons.len()
    );
    display::event_line(&session.core, &event_id).await;
    Ok(())
}

pub async fn motion_propose(
    session: &Session,
    text: &str,
    supporters: usize,
    continuation: bool,
) -> Result<()> {
    let kind = if continuation {
        MotionKind::Continuation
    } else {
        MotionKind::Ordinary
    };
    let motion_id = session.convene_with_motion(text, supporters, kind).await?;
    let state = session.core.state().await;
    let motion = &state.motions[&motion_id];
    println!(
        "{} {} at {:?} ({} supporters)",
        "motion proposed:".green().bold(),
        motion_id,
        motion.consensus_level,
        motion.supporters.len()
    );
    Ok(())
}

pub async fn vote_cast(
    session: &Session,
    choice: &str,
    justification: Option<String>,
) -> Result<()> {
    let choice = parse_choice(choice)?;
    let motion_id = session
        .convene_with_motion("the question before the conclave", 1, MotionKind::Ordinary)
        .await?;

    for archon in &session.archons[1..] {
        session
            .core
            .cast_vote(archon, &motion_id, choice, justification.clone())
            .await?;
    }
    let outcome = session
        .core
        .resolve_motion(session.chair(), &motion_id)
        .await?;
    println!(
        "{} {:?} votes from {} seats, motion {:?}",
        "votes cast:".green().bold(),
        choice,
        session.archons.len() - 1,
        outcome
    );
    Ok(())
}

pub async fn override_invoke(
    session: &Session,
    scope: &str,
    duration: u64,
    declaration: &str,
) -> Result<()> {
    session.convene().await?;
    let override_id = session
        .core
        .invoke_override(session.chair(), declaration, scope, Some(duration))
        .await?;
    println!(
        "{} {} (scope '{}', {} hours)",
        "override invoked:".yellow().bold(),
        override_id,
        scope,
        duration
    );
    println!("conclusion is mandatory; expiry without one is a breach");
    Ok(())
}

pub async fn override_conclude(session: &Session, scope: &str, summary: String) -> Result<()> {
    session.convene().await?;
    let override_id = session
        .core
        .invoke_override(
            session.chair(),
            "operator override for a bounded intervention",
            scope,
            None,
        )
        .await?;
    let event_id = session
        .core
        .conclude_override(session.chair(), &override_id, summary)
        .await?;
    println!("{} {}", "override concluded:".green().bold(), override_id);
    display::event_line(&session.core, &event_id).await;
    Ok(())
}

pub async fn halt_declare(session: &Session, reason: &str) -> Result<()> {
    session.convene().await?;
    let event_id = session.core.declare_halt(session.chair(), reason).await?;
    println!("{} {}", "halt declared:".red().bold(), reason);
    display::event_line(&session.core, &event_id).await;

    // Demonstrate the stickiness the operator just bought
    let refused = session.core.utter(session.chair(), "anything").await;
    if matches!(refused, Err(ConclaveError::Halted { .. })) {
        println!("the core now refuses every operation");
    }
    Ok(())
}

pub async fn verify(session: &Session, from: Option<String>) -> Result<()> {
    session.convene().await?;
    let observer = Observer::new(session.core.ledger().clone());

    let report = observer.attest().await;
    for chain in &report.chains {
        let marker = if chain.is_clean() {
            "ok".green()
        } else {
            "DEFECT".red().bold()
        };
        println!("{} {} ({} events)", marker, chain.actor_id, chain.length);
        for defect in &chain.defects {
            println!("    {}", defect.to_string().red());
        }
    }
    println!(
        "{} {} events across {} chains",
        "attested:".bold(),
        report.events_checked,
        report.chains.len()
    );

    if let Some(from) = from {
        let from = EventId(from);
        let filter = AuditFilter {
            from: Some(from),
            ..AuditFilter::default()
        };
        for event in observer.audit(&filter).await {
            println!("{}", display::transcript_line(&event));
        }
    }

    if !report.is_clean() {
        // The observer's finding is advisory; the ledger's own pass is
        // what halts
        session.core.verify_all().await?;
    }
    Ok(())
}

pub async fn status(session: &Session) -> Result<()> {
    let report = session.core.status().await;
    display::status_table(&report);
    Ok(())
}

pub async fn transcript(session: &Session) -> Result<()> {
    session.convene().await?;
    let observer = Observer::new(session.core.ledger().clone());
    for entry in observer.transcript().await {
        let marker = if entry.verified {
            "✓".green()
        } else {
            "✗".red().bold()
        };
        println!("{} {}", marker, display::transcript_line(&entry.event));
    }
    Ok(())
}

pub async fn demo(session: &Session) -> Result<()> {
    println!("{}", "— a clean cycle, end to end —".bold());
    session.convene().await?;

    let chair = session.chair().clone();
    session
        .core
        .utter(&chair, "the floor opens on the only question of the day")
        .await?;

    let supporters = session.archons[..2].to_vec();
    let motion_id = session
        .core
        .propose_motion(&chair, MotionKind::Ordinary, "adopt the intake schedule", supporters)
        .await?;

    for (i, archon) in session.archons[1..].iter().enumerate() {
        let choice = if i % 3 == 2 {
            VoteChoice::Nay
        } else {
            VoteChoice::Yea
        };
        session.core.cast_vote(archon, &motion_id, choice, None).await?;
    }
    let outcome = session.core.resolve_motion(&chair, &motion_id).await?;
    println!("motion resolved: {:?}", outcome);

    match session.core.close_cycle(&chair, vec![]).await? {
        CloseOutcome::Closed { final_state, .. } => {
            println!("cycle closed in state {:?}", final_state)
        }
        CloseOutcome::Blocked { .. } => println!("close blocked by unresolved breaches"),
    }

    session.core.check_replay_law().await?;
    println!("{}", "replay reproduces the live state".green());

    let observer = Observer::new(session.core.ledger().clone());
    for entry in observer.transcript().await {
        let marker = if entry.verified { "✓".green() } else { "✗".red() };
        println!("{} {}", marker, entry.summary);
    }
    Ok(())
}

fn parse_choice(s: &str) -> Result<VoteChoice> {
    match s.to_ascii_lowercase().as_str() {
        "yea" | "aye" | "yes" => Ok(VoteChoice::Yea),
        "nay" | "no" => Ok(VoteChoice::Nay),
        "abstain" => Ok(VoteChoice::Abstain),
        "present" => Ok(VoteChoice::Present),
        other => Err(ConclaveError::schema(format!("unknown choice: {}", other))),
    }
}
