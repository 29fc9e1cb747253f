//! Chain hash computation
//!
//! The chain hash binds an event to its predecessor:
//! `sha256(header || body || prev_hash)` where the header is the
//! canonical serialization of (actor, cycle, timestamp, kind). Computed
//! only inside the trust boundary; callers never supply it.

use sha2::{Digest, Sha256};

use conclave_types::{ActorId, ChainHash, CycleId, EventBody, Timestamp};

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compute hash of multiple items
pub fn hash_all(items: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item);
    }
    hasher.finalize().into()
}

/// The header fields covered by the chain hash.
#[derive(Debug, Clone)]
pub struct HashHeader {
    pub actor_id: ActorId,
    pub cycle_id: CycleId,
    pub timestamp: Timestamp,
}

/// Canonical bytes for the header portion of the hash input.
fn header_bytes(header: &HashHeader, kind: &str) -> Vec<u8> {
    format!(
        "{}|{}|{}|{}",
        header.actor_id,
        header.cycle_id,
        header.timestamp.as_micros(),
        kind
    )
    .into_bytes()
}

/// Compute the chain hash over header, body, and parent hash.
pub fn compute_chain_hash(header: &HashHeader, body: &EventBody, prev_hash: &ChainHash) -> ChainHash {
    let header = header_bytes(header, &body.kind().to_string());
    // Body serialization is canonical: struct fields serialize in
    // declaration order under serde_json.
    let body_json = serde_json::to_vec(body).unwrap_or_default();
    let digest = hash_all(&[&header, &body_json, prev_hash.0.as_bytes()]);
    ChainHash::from_digest(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::UtteranceBody;
    use uuid::Uuid;

    fn header() -> HashHeader {
        HashHeader {
            actor_id: ActorId::from_uuid(Uuid::from_u128(1)),
            cycle_id: CycleId::from_uuid(Uuid::from_u128(2)),
            timestamp: Timestamp::from_micros(1_000),
        }
    }

    fn body(text: &str) -> EventBody {
        EventBody::AgentUtterance(UtteranceBody {
            text: text.to_string(),
            turn: 1,
        })
    }

    #[test]
    fn test_sha256_hex_length() {
        assert_eq!(sha256_hex(b"conclave").len(), 64);
    }

    #[test]
    fn test_chain_hash_is_deterministic() {
        let a = compute_chain_hash(&header(), &body("speak"), &ChainHash::genesis());
        let b = compute_chain_hash(&header(), &body("speak"), &ChainHash::genesis());
        assert_eq!(a, b);
    }

    #[test]
    fn test_chain_hash_binds_body() {
        let a = compute_chain_hash(&header(), &body("speak"), &ChainHash::genesis());
        let b = compute_chain_hash(&header(), &body("silence"), &ChainHash::genesis());
        assert_ne!(a, b);
    }

    #[test]
    fn test_chain_hash_binds_parent() {
        let parent = compute_chain_hash(&header(), &body("first"), &ChainHash::genesis());
        let a = compute_chain_hash(&header(), &body("speak"), &ChainHash::genesis());
        let b = compute_chain_hash(&header(), &body("speak"), &parent);
        assert_ne!(a, b);
    }

    #[test]
    fn test_chain_hash_binds_timestamp() {
        let mut later = header();
        later.timestamp = Timestamp::from_micros(2_000);
        let a = compute_chain_hash(&header(), &body("speak"), &ChainHash::genesis());
        let b = compute_chain_hash(&later, &body("speak"), &ChainHash::genesis());
        assert_ne!(a, b);
    }
}
