//! Conclave Observer - the read-only verification surface
//!
//! Transcript streaming, audit trail queries, integrity attestation, and
//! cost snapshot visibility. The observer never writes, and it never
//! *asserts* integrity: a failure surfaced here is advisory until the
//! halt detector independently confirms it. Caching is permitted exactly
//! as far as the cache can prove it derives from the current tips.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use conclave_ledger::{verify_chain, ChainReport, Ledger};
use conclave_types::{
    ActorId, ChainHash, ConclaveConfig, CostSnapshot, CycleId, Event, EventBody, EventId,
    EventKind,
};

/// One transcript line: the event plus its read-time verification.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub event: Event,
    /// Signature and witness verification at read time
    pub verified: bool,
    /// Human-facing one-liner
    pub summary: String,
}

/// Audit trail filter. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub kind: Option<EventKind>,
    pub actor: Option<ActorId>,
    pub cycle: Option<CycleId>,
    /// Restrict to events at or after this one in the total order
    pub from: Option<EventId>,
}

impl AuditFilter {
    pub fn by_kind(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn by_actor(actor: ActorId) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    pub fn by_cycle(cycle: CycleId) -> Self {
        Self {
            cycle: Some(cycle),
            ..Self::default()
        }
    }
}

/// The observer's recomputation of every chain. Advisory: the halt
/// detector confirms independently before anything halts.
#[derive(Debug, Clone, Serialize)]
pub struct AttestationReport {
    pub chains: Vec<ChainReport>,
    pub events_checked: u64,
}

impl AttestationReport {
    /// Every chain recomputed cleanly
    pub fn is_clean(&self) -> bool {
        self.chains.iter().all(|c| c.is_clean())
    }
}

/// A cached transcript together with the tips it was derived from.
#[derive(Debug, Clone, Serialize)]
pub struct CachedTranscript {
    pub entries: Vec<TranscriptEntry>,
    /// Tip per identity chain at derivation time
    pub tips: BTreeMap<ActorId, ChainHash>,
}

/// The read-only observer.
pub struct Observer {
    ledger: Arc<Ledger>,
}

impl Observer {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// The full transcript: events in total order with read-time
    /// verification of signatures and witnesses.
    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        let config = self.ledger.config();
        self.ledger
            .all_events()
            .await
            .into_iter()
            .map(|event| entry(event, config))
            .collect()
    }

    /// Transcript restricted to one cycle.
    pub async fn transcript_for_cycle(&self, cycle_id: &CycleId) -> Vec<TranscriptEntry> {
        let config = self.ledger.config();
        self.ledger
            .cycle_events(cycle_id)
            .await
            .into_iter()
            .map(|event| entry(event, config))
            .collect()
    }

    /// Audit trail query.
    pub async fn audit(&self, filter: &AuditFilter) -> Vec<Event> {
        let events = self.ledger.all_events().await;
        let from_index = filter.from.as_ref().and_then(|from| {
            events.iter().position(|e| &e.event_id == from)
        });
        events
            .into_iter()
            .skip(from_index.unwrap_or(0))
            .filter(|e| filter.kind.map_or(true, |k| e.kind() == k))
            .filter(|e| filter.actor.as_ref().map_or(true, |a| &e.actor_id == a))
            .filter(|e| filter.cycle.as_ref().map_or(true, |c| &e.cycle_id == c))
            .collect()
    }

    /// Recompute every chain hash and signature. Advisory only: the
    /// observer reports, the halt detector decides.
    pub async fn attest(&self) -> AttestationReport {
        let config = self.ledger.config();
        let mut chains = Vec::new();
        let mut events_checked = 0u64;
        for actor in self.ledger.chain_actors().await {
            let events = self.ledger.chain(&actor).await;
            events_checked += events.len() as u64;
            chains.push(verify_chain(&actor, &events, config));
        }
        debug!(chains = chains.len(), events_checked, "attestation complete");
        AttestationReport {
            chains,
            events_checked,
        }
    }

    /// Every announced cost snapshot, in announcement order.
    pub async fn cost_snapshots(&self) -> Vec<CostSnapshot> {
        self.ledger
            .all_events()
            .await
            .into_iter()
            .filter_map(|e| match e.body {
                EventBody::CostSnapshotAnnounced(snapshot) => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    /// Derive a cached transcript stamped with the tips it reflects.
    pub async fn cached_transcript(&self) -> CachedTranscript {
        let entries = self.transcript().await;
        let mut tips = BTreeMap::new();
        for actor in self.ledger.chain_actors().await {
            tips.insert(actor.clone(), self.ledger.tip(&actor).await);
        }
        CachedTranscript { entries, tips }
    }

    /// Prove a cache current: every tip it was derived from is still the
    /// tip. A stale cache must be rederived, not served.
    pub async fn cache_is_current(&self, cache: &CachedTranscript) -> bool {
        for actor in self.ledger.chain_actors().await {
            let current = self.ledger.tip(&actor).await;
            if cache.tips.get(&actor) != Some(&current) {
                return false;
            }
        }
        true
    }
}

fn entry(event: Event, config: &ConclaveConfig) -> TranscriptEntry {
    let verified = conclave_ledger::verify_event(&event, config).is_empty();
    let summary = event.summary();
    TranscriptEntry {
        event,
        verified,
        summary,
    }
}
