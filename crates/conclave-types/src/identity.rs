//! Identity types for Conclave
//!
//! All identifiers are strongly typed wrappers around UUIDs so that an
//! actor id can never be passed where a motion id is expected. The one
//! exception is [`EventId`], which is content-addressed: it is derived
//! from the event's chain hash and is never random.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! conclave_id {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

// Participant identity types
conclave_id!(ActorId, "archon", "Unique identifier for a deliberating agent (Archon)");
conclave_id!(PetitionId, "petition", "Unique identifier for an externally submitted intake item");

// Deliberation identity types
conclave_id!(CycleId, "cycle", "Unique identifier for a deliberation cycle");
conclave_id!(MotionId, "motion", "Unique identifier for a motion");
conclave_id!(VoteId, "vote", "Unique identifier for a cast vote");

// Ritual identity types
conclave_id!(BreachId, "breach", "Unique identifier for a declared breach");
conclave_id!(OverrideId, "override", "Unique identifier for an override invocation");

// Infrastructure identity types
conclave_id!(LeaseId, "lease", "Unique identifier for an identity lease");
conclave_id!(ClientToken, "token", "Idempotency token scoped to one intended append");

/// Hex-encoded SHA-256 hash binding an event to its predecessor.
///
/// The genesis sentinel (all zeroes) is the `prev_hash` of the first
/// event in every identity chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainHash(pub String);

impl ChainHash {
    /// The sentinel parent of the first event in a chain
    pub fn genesis() -> Self {
        Self("0".repeat(64))
    }

    /// Whether this is the genesis sentinel
    pub fn is_genesis(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    /// Construct from a 32-byte digest
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Decode back to raw digest bytes, if well-formed
    pub fn to_digest(&self) -> Option<[u8; 32]> {
        if self.0.len() != 64 {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, chunk) in self.0.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).ok()?;
            out[i] = u8::from_str_radix(s, 16).ok()?;
        }
        Some(out)
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-addressed event identifier, derived from the chain hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// Derive the event id from the event's chain hash
    pub fn from_chain_hash(hash: &ChainHash) -> Self {
        Self(format!("evt_{}", hash.0))
    }

    /// The chain hash this id addresses
    pub fn chain_hash(&self) -> ChainHash {
        ChainHash(self.0.strip_prefix("evt_").unwrap_or(&self.0).to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_display() {
        let id = ActorId::new();
        assert!(id.to_string().starts_with("archon_"));
    }

    #[test]
    fn test_id_parsing() {
        let id = MotionId::new();
        let parsed = MotionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_equality() {
        let uuid = Uuid::new_v4();
        assert_eq!(ActorId::from_uuid(uuid), ActorId::from_uuid(uuid));
    }

    #[test]
    fn test_genesis_sentinel() {
        let genesis = ChainHash::genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.0.len(), 64);
    }

    #[test]
    fn test_chain_hash_digest_roundtrip() {
        let digest = [7u8; 32];
        let hash = ChainHash::from_digest(digest);
        assert_eq!(hash.to_digest(), Some(digest));
        assert!(!hash.is_genesis());
    }

    #[test]
    fn test_event_id_from_chain_hash() {
        let hash = ChainHash::from_digest([1u8; 32]);
        let id = EventId::from_chain_hash(&hash);
        assert!(id.0.starts_with("evt_"));
        assert_eq!(id.chain_hash(), hash);
    }
}
