//! Conclave Halt - sticky halt state with dual-channel propagation
//!
//! Every operation in the core consults the halt state *before* acting.
//! Halt propagates over two independent channels — a shared flag and a
//! watch notification stream — so that suppression of one still surfaces
//! via the other; disagreement between the channels is itself treated as
//! fork evidence.
//!
//! # Invariants
//!
//! 1. Halt is sticky: no timer, heartbeat, or retry clears it
//! 2. The only exit is an adopted reform motion in a newly opened cycle
//! 3. The halt check is the first observable effect of every operation

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{error, info};

use conclave_types::{ActorId, BreachId, ConclaveError, HaltReason, HaltState, Timestamp};

/// The shared halt controller.
///
/// Cloning hands out another handle to the same state; all clones see
/// every transition on both channels.
#[derive(Clone)]
pub struct HaltController {
    /// Channel one: the shared flag (full halt record)
    state: Arc<RwLock<HaltState>>,
    /// Per-identity chain halts (fork containment)
    chain_halts: Arc<RwLock<HashSet<ActorId>>>,
    /// Channel two: the notification stream
    notify_tx: Arc<watch::Sender<bool>>,
    notify_rx: watch::Receiver<bool>,
}

impl HaltController {
    /// Create an unhalted controller
    pub fn new() -> Self {
        let (notify_tx, notify_rx) = watch::channel(false);
        Self {
            state: Arc::new(RwLock::new(HaltState::clear())),
            chain_halts: Arc::new(RwLock::new(HashSet::new())),
            notify_tx: Arc::new(notify_tx),
            notify_rx,
        }
    }

    /// Halt-first guard. Must be the first call of every operation.
    ///
    /// Checks both channels; a mismatch is fork evidence and converts the
    /// controller to halted before the error returns.
    pub fn guard(&self) -> Result<(), ConclaveError> {
        let flag = self
            .state
            .read()
            .map(|s| s.halted)
            .unwrap_or(true);
        let notified = *self.notify_rx.borrow();

        if flag != notified {
            error!("halt channels disagree: flag={} notify={}", flag, notified);
            self.force_halt(HaltReason::ChannelMismatch, None, None);
            return Err(ConclaveError::integrity("halt channel mismatch"));
        }

        if flag {
            let reason = self
                .state
                .read()
                .ok()
                .and_then(|s| s.reason.as_ref().map(|r| r.describe()))
                .unwrap_or_else(|| "halted".to_string());
            return Err(ConclaveError::Halted { reason });
        }
        Ok(())
    }

    /// Guard for a specific identity chain: global halt first, then the
    /// per-chain containment set.
    pub fn guard_actor(&self, actor_id: &ActorId) -> Result<(), ConclaveError> {
        self.guard()?;
        let halted = self
            .chain_halts
            .read()
            .map(|set| set.contains(actor_id))
            .unwrap_or(true);
        if halted {
            return Err(ConclaveError::Halted {
                reason: format!("chain {} is halted", actor_id),
            });
        }
        Ok(())
    }

    /// Declare a halt. Sticky; propagates on both channels.
    pub fn declare(&self, reason: HaltReason, declared_by: Option<ActorId>, at: Timestamp) {
        info!(reason = %reason.describe(), "halt declared");
        self.force_halt(reason, declared_by, Some(at));
    }

    /// Halt a single identity chain without halting the whole core.
    pub fn halt_chain(&self, actor_id: ActorId) {
        error!(actor = %actor_id, "identity chain halted");
        if let Ok(mut set) = self.chain_halts.write() {
            set.insert(actor_id);
        }
    }

    /// Whether the core is halted (flag channel)
    pub fn is_halted(&self) -> bool {
        self.state.read().map(|s| s.halted).unwrap_or(true)
    }

    /// Whether a specific chain is halted
    pub fn chain_halted(&self, actor_id: &ActorId) -> bool {
        self.is_halted()
            || self
                .chain_halts
                .read()
                .map(|set| set.contains(actor_id))
                .unwrap_or(true)
    }

    /// All currently halted chains
    pub fn halted_chains(&self) -> Vec<ActorId> {
        self.chain_halts
            .read()
            .map(|set| {
                let mut chains: Vec<ActorId> = set.iter().cloned().collect();
                chains.sort();
                chains
            })
            .unwrap_or_default()
    }

    /// Subscribe to the notification channel
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.notify_tx.subscribe()
    }

    /// Snapshot of the halt record
    pub fn state(&self) -> HaltState {
        self.state.read().map(|s| s.clone()).unwrap_or_else(|_| {
            let mut poisoned = HaltState::clear();
            poisoned.halted = true;
            poisoned
        })
    }

    /// Record a declared breach as unresolved
    pub fn record_breach(&self, breach_id: BreachId) {
        if let Ok(mut state) = self.state.write() {
            state.unresolved_breaches.insert(breach_id);
        }
    }

    /// Mark a breach responded
    pub fn resolve_breach(&self, breach_id: &BreachId) {
        if let Ok(mut state) = self.state.write() {
            state.unresolved_breaches.remove(breach_id);
        }
    }

    /// Breaches declared but not yet responded to
    pub fn unresolved_breaches(&self) -> Vec<BreachId> {
        self.state
            .read()
            .map(|s| s.unresolved_breaches.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The only exit from halt: an adopted reform motion in a newly
    /// opened cycle. Clears the global halt and the chain containment
    /// set; unresolved breaches survive the reform and must still be
    /// answered.
    pub fn clear_for_reform(&self) {
        info!("halt cleared by reform");
        if let Ok(mut state) = self.state.write() {
            state.halted = false;
            state.reason = None;
            state.declared_by = None;
            state.declared_at = None;
        }
        if let Ok(mut set) = self.chain_halts.write() {
            set.clear();
        }
        let _ = self.notify_tx.send(false);
    }

    fn force_halt(&self, reason: HaltReason, declared_by: Option<ActorId>, at: Option<Timestamp>) {
        if let Ok(mut state) = self.state.write() {
            state.halted = true;
            if state.reason.is_none() {
                state.reason = Some(reason);
                state.declared_by = declared_by;
                state.declared_at = at;
            }
        }
        let _ = self.notify_tx.send(true);
    }

    #[cfg(test)]
    pub(crate) fn desync_flag_for_test(&self) {
        // Simulates a compromised path raising the flag without notifying
        if let Ok(mut state) = self.state.write() {
            state.halted = true;
        }
    }
}

impl Default for HaltController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn actor(i: u128) -> ActorId {
        ActorId::from_uuid(Uuid::from_u128(i))
    }

    fn declared(by: u128) -> HaltReason {
        HaltReason::Declared {
            declared_by: actor(by),
            reason: "operator stop".to_string(),
        }
    }

    #[test]
    fn test_guard_passes_when_clear() {
        let halt = HaltController::new();
        assert!(halt.guard().is_ok());
        assert!(halt.guard_actor(&actor(1)).is_ok());
    }

    #[test]
    fn test_halt_is_sticky() {
        let halt = HaltController::new();
        halt.declare(declared(1), Some(actor(1)), Timestamp::from_micros(1));

        for _ in 0..3 {
            assert!(matches!(halt.guard(), Err(ConclaveError::Halted { .. })));
        }
        assert!(halt.is_halted());
    }

    #[test]
    fn test_both_channels_carry_the_halt() {
        let halt = HaltController::new();
        let rx = halt.subscribe();
        assert!(!*rx.borrow());

        halt.declare(declared(1), Some(actor(1)), Timestamp::from_micros(1));
        assert!(halt.is_halted());
        assert!(*rx.borrow());
    }

    #[test]
    fn test_channel_mismatch_is_integrity_failure() {
        let halt = HaltController::new();
        halt.desync_flag_for_test();

        let result = halt.guard();
        assert!(matches!(result, Err(ConclaveError::IntegrityFailure { .. })));

        // The mismatch converts to a full sticky halt
        assert!(matches!(halt.guard(), Err(ConclaveError::Halted { .. })));
        assert!(matches!(
            halt.state().reason,
            Some(HaltReason::ChannelMismatch)
        ));
    }

    #[test]
    fn test_chain_halt_is_contained() {
        let halt = HaltController::new();
        halt.halt_chain(actor(1));

        assert!(matches!(
            halt.guard_actor(&actor(1)),
            Err(ConclaveError::Halted { .. })
        ));
        assert!(halt.guard_actor(&actor(2)).is_ok());
        assert!(halt.guard().is_ok());
    }

    #[test]
    fn test_first_reason_wins() {
        let halt = HaltController::new();
        halt.declare(declared(1), Some(actor(1)), Timestamp::from_micros(1));
        halt.declare(
            HaltReason::ChannelMismatch,
            None,
            Timestamp::from_micros(2),
        );
        assert!(matches!(halt.state().reason, Some(HaltReason::Declared { .. })));
    }

    #[test]
    fn test_clear_for_reform_keeps_breaches() {
        let halt = HaltController::new();
        let breach = BreachId::new();
        halt.record_breach(breach.clone());
        halt.declare(declared(1), Some(actor(1)), Timestamp::from_micros(1));
        halt.halt_chain(actor(2));

        halt.clear_for_reform();
        assert!(halt.guard().is_ok());
        assert!(halt.guard_actor(&actor(2)).is_ok());
        assert_eq!(halt.unresolved_breaches(), vec![breach]);
    }

    #[test]
    fn test_breach_resolution() {
        let halt = HaltController::new();
        let breach = BreachId::new();
        halt.record_breach(breach.clone());
        assert_eq!(halt.unresolved_breaches().len(), 1);
        halt.resolve_breach(&breach);
        assert!(halt.unresolved_breaches().is_empty());
    }
}
