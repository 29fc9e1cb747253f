//! The append-only event store
//!
//! The store enforces the two unique constraints the core relies on:
//! `(actor_id, prev_hash)` for fork detection and
//! `(actor_id, client_token)` for idempotency. Inserts are atomic: all
//! indexes update under one write lock or none do.
//!
//! `MemoryStore` is the single-writer implementation the core ships; a
//! relational store can be slotted in behind the same trait.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use conclave_types::{ActorId, ChainHash, ClientToken, CycleId, Event, EventId, Timestamp};

/// Store-level rejections. The ledger maps these to the public error set.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another event already extends this parent — fork evidence
    #[error("parent {prev_hash} of chain {actor_id} is already extended")]
    DuplicatePrevHash { actor_id: ActorId, prev_hash: ChainHash },

    /// The token was already used; carries the original event
    #[error("client token already used")]
    DuplicateToken { original: EventId },

    /// The event's parent is not the current tip
    #[error("parent is not the tip of chain {actor_id}")]
    NotTip { actor_id: ActorId, tip: ChainHash },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Append-only storage with the core's unique constraints.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert one event atomically. All-or-nothing.
    async fn insert(&self, event: Event, token: ClientToken) -> StoreResult<()>;

    /// Current tip of an identity chain (genesis sentinel if empty)
    async fn tip(&self, actor_id: &ActorId) -> ChainHash;

    /// Whether some event of this chain already has `prev_hash` as parent
    async fn prev_extended(&self, actor_id: &ActorId, prev_hash: &ChainHash) -> bool;

    /// Last timestamp on an identity chain
    async fn last_timestamp(&self, actor_id: &ActorId) -> Option<Timestamp>;

    /// Resolve an idempotency token to the event it produced
    async fn find_by_token(&self, actor_id: &ActorId, token: &ClientToken) -> Option<EventId>;

    /// Fetch an event by id
    async fn get(&self, event_id: &EventId) -> Option<Event>;

    /// One identity chain, oldest first
    async fn chain(&self, actor_id: &ActorId) -> Vec<Event>;

    /// Number of events on an identity chain
    async fn chain_len(&self, actor_id: &ActorId) -> u64;

    /// Every event, in timestamp total order
    async fn all(&self) -> Vec<Event>;

    /// Every event of one cycle, in timestamp total order
    async fn by_cycle(&self, cycle_id: &CycleId) -> Vec<Event>;
}

#[derive(Default)]
struct MemoryInner {
    events: Vec<Event>,
    by_id: HashMap<EventId, usize>,
    tips: HashMap<ActorId, ChainHash>,
    last_ts: HashMap<ActorId, Timestamp>,
    tokens: HashMap<(ActorId, ClientToken), EventId>,
    extended: HashSet<(ActorId, ChainHash)>,
    chain_lens: HashMap<ActorId, u64>,
}

/// In-memory single-writer store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert(&self, event: Event, token: ClientToken) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let actor_id = event.actor_id.clone();

        // Idempotency constraint first: a replayed token is not a fork
        if let Some(original) = inner.tokens.get(&(actor_id.clone(), token.clone())) {
            return Err(StoreError::DuplicateToken {
                original: original.clone(),
            });
        }

        // Fork constraint: one child per parent per chain
        let parent_key = (actor_id.clone(), event.prev_hash.clone());
        if inner.extended.contains(&parent_key) {
            return Err(StoreError::DuplicatePrevHash {
                actor_id,
                prev_hash: event.prev_hash,
            });
        }

        // Tip constraint: the chain grows only at its end
        let tip = inner
            .tips
            .get(&actor_id)
            .cloned()
            .unwrap_or_else(ChainHash::genesis);
        if event.prev_hash != tip {
            return Err(StoreError::NotTip { actor_id, tip });
        }

        // All constraints hold; update every index together
        let index = inner.events.len();
        inner.by_id.insert(event.event_id.clone(), index);
        inner.tips.insert(actor_id.clone(), event.chain_hash.clone());
        inner.last_ts.insert(actor_id.clone(), event.timestamp);
        inner
            .tokens
            .insert((actor_id.clone(), token), event.event_id.clone());
        inner.extended.insert(parent_key);
        *inner.chain_lens.entry(actor_id).or_insert(0) += 1;
        inner.events.push(event);
        Ok(())
    }

    async fn tip(&self, actor_id: &ActorId) -> ChainHash {
        self.inner
            .read()
            .await
            .tips
            .get(actor_id)
            .cloned()
            .unwrap_or_else(ChainHash::genesis)
    }

    async fn prev_extended(&self, actor_id: &ActorId, prev_hash: &ChainHash) -> bool {
        self.inner
            .read()
            .await
            .extended
            .contains(&(actor_id.clone(), prev_hash.clone()))
    }

    async fn last_timestamp(&self, actor_id: &ActorId) -> Option<Timestamp> {
        self.inner.read().await.last_ts.get(actor_id).copied()
    }

    async fn find_by_token(&self, actor_id: &ActorId, token: &ClientToken) -> Option<EventId> {
        self.inner
            .read()
            .await
            .tokens
            .get(&(actor_id.clone(), token.clone()))
            .cloned()
    }

    async fn get(&self, event_id: &EventId) -> Option<Event> {
        let inner = self.inner.read().await;
        inner.by_id.get(event_id).map(|&i| inner.events[i].clone())
    }

    async fn chain(&self, actor_id: &ActorId) -> Vec<Event> {
        self.inner
            .read()
            .await
            .events
            .iter()
            .filter(|e| &e.actor_id == actor_id)
            .cloned()
            .collect()
    }

    async fn chain_len(&self, actor_id: &ActorId) -> u64 {
        self.inner
            .read()
            .await
            .chain_lens
            .get(actor_id)
            .copied()
            .unwrap_or(0)
    }

    async fn all(&self) -> Vec<Event> {
        let mut events = self.inner.read().await.events.clone();
        events.sort_by_key(|e| e.timestamp);
        events
    }

    async fn by_cycle(&self, cycle_id: &CycleId) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .inner
            .read()
            .await
            .events
            .iter()
            .filter(|e| &e.cycle_id == cycle_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        events
    }
}
