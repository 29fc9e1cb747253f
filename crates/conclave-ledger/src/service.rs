//! The append service: the trust boundary of the witnessed log
//!
//! Order inside `append` is load-bearing:
//! halt guard → sealed-cycle guard → schema validation → idempotency →
//! timestamp → epoch fence → chain tip → hash + sign → witness
//! co-signing → durable insert. The halt check is the first observable
//! effect; the signature exists before the write; the write is durable
//! before anything else sees the event.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use conclave_crypto::{CryptoError, Keyring};
use conclave_halt::HaltController;
use conclave_identity::EpochFence;
use conclave_types::{
    ActorId, ChainHash, ClientToken, ConclaveConfig, ConclaveError, CycleId, Event, EventBody,
    EventId, EventSignature, ForkDetectedBody, Result, Timestamp,
};
use conclave_witness::{CollusionMonitor, PairAnomaly, WitnessError};

use crate::store::{EventStore, StoreError};
use crate::time::TimeAuthority;
use crate::verify::{kind_is_critical, verify_chain, ChainReport};

/// A caller-formed append request. Everything the caller may legitimately
/// supply; hashes and signatures are not among it.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub actor_id: ActorId,
    /// Epoch the caller's lease was issued under
    pub epoch: u64,
    pub cycle_id: CycleId,
    pub body: EventBody,
    /// Optimistic-concurrency guess at the chain tip
    pub intended_prev_hash: ChainHash,
    /// Idempotency token; retries reuse it
    pub client_token: ClientToken,
    /// Normally `None`: the TimeAuthority issues the timestamp. A
    /// caller-supplied value is honored but subject to the regression
    /// check.
    pub timestamp: Option<Timestamp>,
}

/// The canonical state and hash service.
pub struct Ledger {
    store: Arc<dyn EventStore>,
    time: Arc<dyn TimeAuthority>,
    keyring: Arc<Keyring>,
    halt: HaltController,
    fence: Arc<dyn EpochFence>,
    config: ConclaveConfig,
    /// Terminal cycles refuse all further appends
    sealed_cycles: Arc<StdRwLock<HashSet<CycleId>>>,
    monitor: Arc<StdMutex<CollusionMonitor>>,
    /// The identity that authors fork and integrity events
    sentinel: ActorId,
    /// Appends are serialized: one writer, no check/insert races
    append_lock: Mutex<()>,
}

impl Ledger {
    /// Build the service. Registers the sentinel identity that authors
    /// fork-detection events.
    pub fn new(
        store: Arc<dyn EventStore>,
        time: Arc<dyn TimeAuthority>,
        keyring: Arc<Keyring>,
        halt: HaltController,
        fence: Arc<dyn EpochFence>,
        config: ConclaveConfig,
    ) -> Result<Self> {
        let sentinel = ActorId::new();
        keyring
            .register(sentinel.clone())
            .map_err(|e| ConclaveError::integrity(e.to_string()))?;
        let monitor = CollusionMonitor::new(256, config.witness_pair_threshold);
        Ok(Self {
            store,
            time,
            keyring,
            halt,
            fence,
            config,
            sealed_cycles: Arc::new(StdRwLock::new(HashSet::new())),
            monitor: Arc::new(StdMutex::new(monitor)),
            sentinel,
            append_lock: Mutex::new(()),
        })
    }

    /// The sentinel identity
    pub fn sentinel(&self) -> &ActorId {
        &self.sentinel
    }

    /// Handle to the halt controller
    pub fn halt(&self) -> &HaltController {
        &self.halt
    }

    /// Handle to the keyring
    pub fn keyring(&self) -> &Arc<Keyring> {
        &self.keyring
    }

    /// Active configuration
    pub fn config(&self) -> &ConclaveConfig {
        &self.config
    }

    /// Append one event. Idempotent per `(actor_id, client_token)`.
    pub async fn append(&self, draft: EventDraft) -> Result<EventId> {
        // Halt-first: no other effect may precede this check
        self.halt.guard_actor(&draft.actor_id)?;
        self.guard_cycle(&draft.cycle_id)?;

        let _writer = self.append_lock.lock().await;
        self.append_locked(draft, true).await
    }

    /// Internal append for sentinel-authored events. Skips the epoch
    /// fence (the sentinel holds no lease) but not the halt guard.
    async fn append_sentinel(&self, cycle_id: CycleId, body: EventBody) -> Result<EventId> {
        let draft = EventDraft {
            actor_id: self.sentinel.clone(),
            epoch: 0,
            cycle_id,
            body,
            intended_prev_hash: self.store.tip(&self.sentinel).await,
            client_token: ClientToken::new(),
            timestamp: None,
        };
        self.append_locked(draft, false).await
    }

    async fn append_locked(&self, draft: EventDraft, fenced: bool) -> Result<EventId> {
        draft.body.validate()?;

        // Idempotency: a replayed token returns the original event
        if let Some(original) = self
            .store
            .find_by_token(&draft.actor_id, &draft.client_token)
            .await
        {
            return Ok(original);
        }

        let timestamp = match draft.timestamp {
            Some(t) => t,
            None => self.time.now().await?,
        };

        if fenced {
            self.fence.check(&draft.actor_id, draft.epoch, timestamp)?;
        }

        // Monotonicity within the chain: clock skew is caller error
        if let Some(last) = self.store.last_timestamp(&draft.actor_id).await {
            if timestamp <= last {
                return Err(ConclaveError::TimeRegression {
                    actor_id: draft.actor_id.to_string(),
                    last: last.as_micros(),
                    proposed: timestamp.as_micros(),
                });
            }
        }

        // Optimistic tip check. A mismatch against an already-extended
        // parent is a fork attempt, not a retryable miss.
        let tip = self.store.tip(&draft.actor_id).await;
        if draft.intended_prev_hash != tip {
            if self
                .store
                .prev_extended(&draft.actor_id, &draft.intended_prev_hash)
                .await
            {
                return self
                    .fork_detected(
                        draft.actor_id,
                        draft.cycle_id,
                        Some(draft.intended_prev_hash),
                        "second child offered for an extended parent",
                    )
                    .await;
            }
            return Err(ConclaveError::StaleChain {
                actor_id: draft.actor_id.to_string(),
                intended: draft.intended_prev_hash.0,
                tip: tip.0,
            });
        }

        // Trust boundary: hash, sign, co-sign
        let header = conclave_crypto::HashHeader {
            actor_id: draft.actor_id.clone(),
            cycle_id: draft.cycle_id.clone(),
            timestamp,
        };
        let chain_hash =
            conclave_crypto::compute_chain_hash(&header, &draft.body, &draft.intended_prev_hash);
        let signature = self
            .keyring
            .sign(&draft.actor_id, chain_hash.0.as_bytes())
            .map_err(map_crypto_error(&draft.actor_id))?;

        let witnesses = self
            .collect_witnesses(&draft, &chain_hash)
            .map_err(|e| match e {
                WitnessError::InsufficientWitnesses { required, available } => {
                    ConclaveError::schema(format!(
                        "insufficient eligible witnesses: need {}, have {}",
                        required, available
                    ))
                }
                WitnessError::SigningFailed(detail) => ConclaveError::integrity(detail),
            })?;

        let event = Event {
            event_id: EventId::from_chain_hash(&chain_hash),
            prev_hash: draft.intended_prev_hash,
            chain_hash: chain_hash.clone(),
            signature: EventSignature {
                signature: signature.signature,
                public_key: signature.public_key.key,
            },
            timestamp,
            actor_id: draft.actor_id.clone(),
            cycle_id: draft.cycle_id.clone(),
            body: draft.body,
            witnesses,
        };
        let event_id = event.event_id.clone();
        let kind = event.kind();
        let witness_ids: Vec<ActorId> =
            event.witnesses.iter().map(|w| w.witness_id.clone()).collect();

        // Durable write; the store re-checks both unique constraints
        match self.store.insert(event, draft.client_token).await {
            Ok(()) => {
                info!(actor = %draft.actor_id, %kind, event = %event_id, "event appended");
                if let Ok(mut monitor) = self.monitor.lock() {
                    monitor.observe(&witness_ids);
                }
                Ok(event_id)
            }
            Err(StoreError::DuplicateToken { original }) => Ok(original),
            Err(StoreError::DuplicatePrevHash { actor_id, prev_hash }) => {
                self.fork_detected(
                    actor_id,
                    draft.cycle_id,
                    Some(prev_hash),
                    "unique constraint rejected a second child",
                )
                .await
            }
            Err(StoreError::NotTip { actor_id, tip }) => Err(ConclaveError::StaleChain {
                actor_id: actor_id.to_string(),
                intended: chain_hash.0,
                tip: tip.0,
            }),
        }
    }

    fn collect_witnesses(
        &self,
        draft: &EventDraft,
        chain_hash: &ChainHash,
    ) -> std::result::Result<Vec<conclave_types::WitnessSignature>, WitnessError> {
        let required = self
            .config
            .witnesses_required(kind_is_critical(draft.body.kind()));
        let candidates = self.keyring.actors();
        let mut excluded = self.halt.halted_chains();
        excluded.push(draft.actor_id.clone());

        // Seeded by the parent hash: fixed before the event exists
        let selected = conclave_witness::select_witnesses(
            &draft.intended_prev_hash,
            &candidates,
            &excluded,
            required,
        )?;
        conclave_witness::collect_signatures(&self.keyring, &selected, chain_hash)
    }

    /// Record a detected fork: the fork event is written on the sentinel
    /// chain, then the affected chain halts. Returns the integrity error
    /// the caller must surface.
    async fn fork_detected(
        &self,
        actor_id: ActorId,
        cycle_id: CycleId,
        prev_hash: Option<ChainHash>,
        detail: &str,
    ) -> Result<EventId> {
        error!(actor = %actor_id, detail, "fork detected");
        let body = EventBody::ForkDetected(ForkDetectedBody {
            actor_id: actor_id.clone(),
            prev_hash,
            detail: detail.to_string(),
        });
        // Record first, halt second: the halt guard would refuse the
        // record once the chain is down
        if let Err(e) = Box::pin(self.append_sentinel(cycle_id, body)).await {
            warn!(error = %e, "fork event could not be recorded");
        }
        self.halt.halt_chain(actor_id.clone());
        Err(ConclaveError::integrity(format!(
            "fork detected on chain {}: {}",
            actor_id, detail
        )))
    }

    /// Seal a cycle: terminal states accept no further appends.
    pub fn seal_cycle(&self, cycle_id: CycleId) {
        if let Ok(mut sealed) = self.sealed_cycles.write() {
            sealed.insert(cycle_id);
        }
    }

    fn guard_cycle(&self, cycle_id: &CycleId) -> Result<()> {
        let sealed = self
            .sealed_cycles
            .read()
            .map(|s| s.contains(cycle_id))
            .unwrap_or(true);
        if sealed {
            return Err(ConclaveError::Halted {
                reason: format!("cycle {} is sealed", cycle_id),
            });
        }
        Ok(())
    }

    /// Whether a cycle has been sealed
    pub fn cycle_sealed(&self, cycle_id: &CycleId) -> bool {
        self.sealed_cycles
            .read()
            .map(|s| s.contains(cycle_id))
            .unwrap_or(true)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Current tip of an identity chain
    pub async fn tip(&self, actor_id: &ActorId) -> ChainHash {
        self.store.tip(actor_id).await
    }

    /// Number of events on an identity chain
    pub async fn chain_len(&self, actor_id: &ActorId) -> u64 {
        self.store.chain_len(actor_id).await
    }

    /// Fetch an event
    pub async fn get(&self, event_id: &EventId) -> Option<Event> {
        self.store.get(event_id).await
    }

    /// One identity chain, oldest first
    pub async fn chain(&self, actor_id: &ActorId) -> Vec<Event> {
        self.store.chain(actor_id).await
    }

    /// The whole log in timestamp total order
    pub async fn all_events(&self) -> Vec<Event> {
        self.store.all().await
    }

    /// One cycle's events in timestamp total order
    pub async fn cycle_events(&self, cycle_id: &CycleId) -> Vec<Event> {
        self.store.by_cycle(cycle_id).await
    }

    /// Current witness-pair anomalies
    pub fn witness_anomalies(&self) -> Vec<PairAnomaly> {
        self.monitor
            .lock()
            .map(|m| m.anomalies())
            .unwrap_or_default()
    }

    /// Verify one chain and enforce the outcome: any defect records a
    /// fork event and halts the chain.
    pub async fn verify_and_enforce(&self, actor_id: &ActorId) -> Result<ChainReport> {
        let events = self.store.chain(actor_id).await;
        let cycle_id = events
            .last()
            .map(|e| e.cycle_id.clone())
            .unwrap_or_else(CycleId::new);
        let report = verify_chain(actor_id, &events, &self.config);
        if !report.is_clean() {
            let detail = report
                .defects
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let _ = self
                .fork_detected(actor_id.clone(), cycle_id, None, &detail)
                .await;
            return Err(ConclaveError::integrity(detail));
        }
        Ok(report)
    }

    /// All actors with events on record
    pub async fn chain_actors(&self) -> Vec<ActorId> {
        let mut actors: Vec<ActorId> = self
            .store
            .all()
            .await
            .into_iter()
            .map(|e| e.actor_id)
            .collect();
        actors.sort();
        actors.dedup();
        actors
    }
}

fn map_crypto_error(actor_id: &ActorId) -> impl FnOnce(CryptoError) -> ConclaveError + '_ {
    move |e| match e {
        CryptoError::UnknownSigner(_) => ConclaveError::IdentityConflict {
            actor_id: actor_id.to_string(),
            detail: "no signing key registered".to_string(),
        },
        other => ConclaveError::integrity(other.to_string()),
    }
}
