//! The keyring: per-actor signing keys inside the trust boundary
//!
//! **Private keys never leave the keyring.** The ledger asks the keyring
//! to sign chain hashes on behalf of actors and witnesses; nothing else
//! can produce a valid signature, which is what makes the append path a
//! trust boundary rather than a convention.

use crate::{CryptoError, CryptoResult, KeyPair, PublicKey, Signature};
use std::collections::HashMap;
use std::sync::RwLock;

use conclave_types::ActorId;

/// Per-actor key registry.
pub struct Keyring {
    keys: RwLock<HashMap<ActorId, KeyPair>>,
}

impl Keyring {
    /// Create an empty keyring
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Generate and register a key pair for an actor
    pub fn register(&self, actor_id: ActorId) -> CryptoResult<PublicKey> {
        let keypair = KeyPair::generate();
        let public = PublicKey::from_keypair(&keypair);
        self.keys
            .write()
            .map_err(|e| CryptoError::KeyringError(e.to_string()))?
            .insert(actor_id, keypair);
        Ok(public)
    }

    /// Import an existing key for an actor (secure provisioning only)
    pub fn import(&self, actor_id: ActorId, key_bytes: &[u8; 32]) -> CryptoResult<PublicKey> {
        let keypair = KeyPair::from_bytes(key_bytes);
        let public = PublicKey::from_keypair(&keypair);
        self.keys
            .write()
            .map_err(|e| CryptoError::KeyringError(e.to_string()))?
            .insert(actor_id, keypair);
        Ok(public)
    }

    /// Sign a message on behalf of an actor
    pub fn sign(&self, actor_id: &ActorId, message: &[u8]) -> CryptoResult<Signature> {
        let keys = self
            .keys
            .read()
            .map_err(|e| CryptoError::KeyringError(e.to_string()))?;
        let keypair = keys
            .get(actor_id)
            .ok_or_else(|| CryptoError::UnknownSigner(actor_id.to_string()))?;
        Signature::sign(keypair, message)
    }

    /// Public key of a registered actor
    pub fn public_key(&self, actor_id: &ActorId) -> CryptoResult<PublicKey> {
        let keys = self
            .keys
            .read()
            .map_err(|e| CryptoError::KeyringError(e.to_string()))?;
        keys.get(actor_id)
            .map(PublicKey::from_keypair)
            .ok_or_else(|| CryptoError::UnknownSigner(actor_id.to_string()))
    }

    /// Whether an actor holds a key
    pub fn contains(&self, actor_id: &ActorId) -> bool {
        self.keys
            .read()
            .map(|keys| keys.contains_key(actor_id))
            .unwrap_or(false)
    }

    /// All registered actors, in stable order
    pub fn actors(&self) -> Vec<ActorId> {
        let mut actors: Vec<ActorId> = self
            .keys
            .read()
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        actors.sort();
        actors
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_sign() {
        let keyring = Keyring::new();
        let actor = ActorId::new();
        let public = keyring.register(actor.clone()).unwrap();

        let signature = keyring.sign(&actor, b"chain hash").unwrap();
        assert_eq!(signature.public_key, public);
        assert!(signature.verify(b"chain hash").unwrap());
    }

    #[test]
    fn test_unknown_signer_rejected() {
        let keyring = Keyring::new();
        let result = keyring.sign(&ActorId::new(), b"msg");
        assert!(matches!(result, Err(CryptoError::UnknownSigner(_))));
    }

    #[test]
    fn test_import_is_deterministic() {
        let keyring = Keyring::new();
        let actor = ActorId::new();
        let public = keyring.import(actor.clone(), &[7u8; 32]).unwrap();

        let other = Keyring::new();
        let same = other.import(ActorId::new(), &[7u8; 32]).unwrap();
        assert_eq!(public, same);
    }

    #[test]
    fn test_actors_sorted() {
        let keyring = Keyring::new();
        for _ in 0..5 {
            keyring.register(ActorId::new()).unwrap();
        }
        let actors = keyring.actors();
        let mut sorted = actors.clone();
        sorted.sort();
        assert_eq!(actors, sorted);
    }
}
