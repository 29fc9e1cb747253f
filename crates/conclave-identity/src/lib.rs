//! Conclave Identity - the agent identity gate
//!
//! Guarantees at most one live instance per actor at any moment. The
//! mechanism is a leased mutex with epoch fencing, not a quorum: identity
//! non-duplication is the property that matters, and a partitioned stale
//! instance simply cannot write because the ledger rejects its epoch.
//!
//! Time is always passed in explicitly; the gate never consults a clock
//! of its own.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use conclave_types::{ActorId, ConclaveError, LeaseId, Result, Timestamp};

/// A live lease: the exclusive right to write under an actor identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: LeaseId,
    pub actor_id: ActorId,
    /// Fencing epoch; bumped on every release, expiry, or revocation
    pub epoch: u64,
    pub expires_at: Timestamp,
}

#[derive(Debug, Clone)]
struct LeaseSlot {
    lease: Lease,
    released: bool,
}

/// The view the ledger uses to fence writes by epoch.
pub trait EpochFence: Send + Sync {
    /// Accept a write claimed under `(actor_id, epoch)` at time `now`.
    fn check(&self, actor_id: &ActorId, epoch: u64, now: Timestamp) -> Result<()>;
}

/// A fence that admits everything. Test and bootstrap use only.
pub struct OpenFence;

impl EpochFence for OpenFence {
    fn check(&self, _actor_id: &ActorId, _epoch: u64, _now: Timestamp) -> Result<()> {
        Ok(())
    }
}

/// The lease gate.
pub struct LeaseGate {
    leases: DashMap<ActorId, LeaseSlot>,
    /// Highest epoch ever issued per actor
    epochs: DashMap<ActorId, u64>,
    ttl_seconds: u64,
    safety_margin_seconds: u64,
}

impl LeaseGate {
    /// Create a gate with the given lease TTL and heartbeat margin
    pub fn new(ttl_seconds: u64, safety_margin_seconds: u64) -> Self {
        Self {
            leases: DashMap::new(),
            epochs: DashMap::new(),
            ttl_seconds,
            safety_margin_seconds,
        }
    }

    /// Acquire a lease for an actor. Fails with `IdentityConflict` while
    /// another live lease exists. Acquiring after a release, expiry, or
    /// revocation increments the epoch.
    pub fn acquire(&self, actor_id: ActorId, now: Timestamp) -> Result<Lease> {
        if let Some(slot) = self.leases.get(&actor_id) {
            if self.is_live(&slot, now) {
                return Err(ConclaveError::IdentityConflict {
                    actor_id: actor_id.to_string(),
                    detail: format!("lease {} is live", slot.lease.lease_id),
                });
            }
        }

        let epoch = {
            let mut entry = self.epochs.entry(actor_id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let lease = Lease {
            lease_id: LeaseId::new(),
            actor_id: actor_id.clone(),
            epoch,
            expires_at: now.plus_seconds(self.ttl_seconds as i64),
        };
        info!(actor = %actor_id, epoch, "lease acquired");
        self.leases.insert(
            actor_id,
            LeaseSlot {
                lease: lease.clone(),
                released: false,
            },
        );
        Ok(lease)
    }

    /// Refresh a lease. Must land strictly before
    /// `expires_at - safety_margin`; a late heartbeat is treated as a
    /// missed one and the lease is released.
    pub fn heartbeat(&self, lease: &Lease, now: Timestamp) -> Result<Lease> {
        let mut slot = self.leases.get_mut(&lease.actor_id).ok_or_else(|| {
            ConclaveError::IdentityConflict {
                actor_id: lease.actor_id.to_string(),
                detail: "no lease on record".to_string(),
            }
        })?;

        if slot.released || slot.lease.lease_id != lease.lease_id {
            return Err(ConclaveError::IdentityConflict {
                actor_id: lease.actor_id.to_string(),
                detail: "lease is no longer current".to_string(),
            });
        }

        let deadline = slot
            .lease
            .expires_at
            .plus_seconds(-(self.safety_margin_seconds as i64));
        if now >= deadline {
            warn!(actor = %lease.actor_id, "heartbeat past the safety margin; lease released");
            slot.released = true;
            return Err(ConclaveError::IdentityConflict {
                actor_id: lease.actor_id.to_string(),
                detail: "heartbeat missed the safety margin".to_string(),
            });
        }

        slot.lease.expires_at = now.plus_seconds(self.ttl_seconds as i64);
        Ok(slot.lease.clone())
    }

    /// Explicitly release a lease. The epoch bumps on the next acquire.
    pub fn release(&self, lease: &Lease) -> Result<()> {
        let mut slot = self.leases.get_mut(&lease.actor_id).ok_or_else(|| {
            ConclaveError::IdentityConflict {
                actor_id: lease.actor_id.to_string(),
                detail: "no lease on record".to_string(),
            }
        })?;
        if slot.lease.lease_id != lease.lease_id {
            return Err(ConclaveError::IdentityConflict {
                actor_id: lease.actor_id.to_string(),
                detail: "lease is no longer current".to_string(),
            });
        }
        info!(actor = %lease.actor_id, "lease released");
        slot.released = true;
        Ok(())
    }

    /// Force-revoke whatever lease an actor holds. Reserved for the
    /// override ritual; the caller records the `OverrideInvoked` event.
    pub fn revoke(&self, actor_id: &ActorId) -> bool {
        match self.leases.get_mut(actor_id) {
            Some(mut slot) if !slot.released => {
                warn!(actor = %actor_id, "lease force-revoked");
                slot.released = true;
                true
            }
            _ => false,
        }
    }

    /// The live lease for an actor, if any
    pub fn live_lease(&self, actor_id: &ActorId, now: Timestamp) -> Option<Lease> {
        self.leases.get(actor_id).and_then(|slot| {
            if self.is_live(&slot, now) {
                Some(slot.lease.clone())
            } else {
                None
            }
        })
    }

    /// Current epoch for an actor (0 if never leased)
    pub fn current_epoch(&self, actor_id: &ActorId) -> u64 {
        self.epochs.get(actor_id).map(|e| *e).unwrap_or(0)
    }

    /// All actors with a live lease
    pub fn live_actors(&self, now: Timestamp) -> Vec<ActorId> {
        let mut actors: Vec<ActorId> = self
            .leases
            .iter()
            .filter(|entry| self.is_live(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();
        actors.sort();
        actors
    }

    fn is_live(&self, slot: &LeaseSlot, now: Timestamp) -> bool {
        !slot.released && now < slot.lease.expires_at
    }
}

impl EpochFence for LeaseGate {
    fn check(&self, actor_id: &ActorId, epoch: u64, now: Timestamp) -> Result<()> {
        let lease = self.live_lease(actor_id, now).ok_or_else(|| {
            ConclaveError::IdentityConflict {
                actor_id: actor_id.to_string(),
                detail: "no live lease".to_string(),
            }
        })?;
        if lease.epoch != epoch {
            return Err(ConclaveError::IdentityConflict {
                actor_id: actor_id.to_string(),
                detail: format!("write fenced: epoch {} superseded by {}", epoch, lease.epoch),
            });
        }
        Ok(())
    }
}
