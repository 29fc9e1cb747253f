//! Deterministic witness selection
//!
//! Selection is a draw without replacement from the eligible pool,
//! indexed by `sha256(seed || round)`. The seed is the parent event's
//! chain hash: fixed before the event exists, reproducible by any
//! verifier, controllable by nobody.

use sha2::{Digest, Sha256};

use conclave_crypto::{Keyring, PublicKey, Signature};
use conclave_types::{ActorId, ChainHash, WitnessSignature};

use crate::{WitnessError, WitnessResult};

/// Select `count` witnesses from `candidates`, excluding the event's own
/// actor and any halted identity.
///
/// The pool is sorted before the draw so selection depends only on the
/// seed and the set membership, not on caller ordering.
pub fn select_witnesses(
    seed: &ChainHash,
    candidates: &[ActorId],
    excluded: &[ActorId],
    count: usize,
) -> WitnessResult<Vec<ActorId>> {
    let mut pool: Vec<ActorId> = candidates
        .iter()
        .filter(|actor| !excluded.contains(actor))
        .cloned()
        .collect();
    pool.sort();
    pool.dedup();

    if pool.len() < count {
        return Err(WitnessError::InsufficientWitnesses {
            required: count,
            available: pool.len(),
        });
    }

    let mut selected = Vec::with_capacity(count);
    for round in 0u64.. {
        if selected.len() == count {
            break;
        }
        let index = draw_index(seed, round, pool.len());
        selected.push(pool.remove(index));
    }
    Ok(selected)
}

fn draw_index(seed: &ChainHash, round: u64, pool_len: usize) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(seed.0.as_bytes());
    hasher.update(round.to_be_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    let mut value = [0u8; 8];
    value.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(value) % pool_len as u64) as usize
}

/// Collect co-signatures over a chain hash from the selected witnesses.
///
/// Witnesses sign the same chain hash the actor signs; the signatures are
/// embedded in the event before the row becomes visible.
pub fn collect_signatures(
    keyring: &Keyring,
    witnesses: &[ActorId],
    chain_hash: &ChainHash,
) -> WitnessResult<Vec<WitnessSignature>> {
    let mut signatures = Vec::with_capacity(witnesses.len());
    for witness in witnesses {
        let signature = keyring
            .sign(witness, chain_hash.0.as_bytes())
            .map_err(|e| WitnessError::SigningFailed(e.to_string()))?;
        signatures.push(WitnessSignature {
            witness_id: witness.clone(),
            signature: signature.signature,
            public_key: signature.public_key.key,
        });
    }
    Ok(signatures)
}

/// Verify every witness signature on an event's chain hash.
pub fn verify_signatures(witnesses: &[WitnessSignature], chain_hash: &ChainHash) -> bool {
    witnesses.iter().all(|w| {
        conclave_crypto::verify_hex(
            &w.signature,
            &PublicKey::from_hex(w.public_key.clone()),
            chain_hash.0.as_bytes(),
        )
        .unwrap_or(false)
    })
}

/// Re-derive the expected selection and check the event's witnesses
/// against it. Returns false when the witness set could not have come
/// from the seeded draw.
pub fn selection_matches(
    seed: &ChainHash,
    candidates: &[ActorId],
    excluded: &[ActorId],
    witnesses: &[WitnessSignature],
) -> bool {
    match select_witnesses(seed, candidates, excluded, witnesses.len()) {
        Ok(expected) => {
            let actual: Vec<&ActorId> = witnesses.iter().map(|w| &w.witness_id).collect();
            expected.iter().collect::<Vec<_>>() == actual
        }
        Err(_) => false,
    }
}

/// A detached witness signature helper for tests and tools.
pub fn sign_as_witness(
    keyring: &Keyring,
    witness: &ActorId,
    chain_hash: &ChainHash,
) -> WitnessResult<Signature> {
    keyring
        .sign(witness, chain_hash.0.as_bytes())
        .map_err(|e| WitnessError::SigningFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn actors(n: u128) -> Vec<ActorId> {
        (1..=n).map(|i| ActorId::from_uuid(Uuid::from_u128(i))).collect()
    }

    fn seed(byte: u8) -> ChainHash {
        ChainHash::from_digest([byte; 32])
    }

    #[test]
    fn test_selection_is_deterministic() {
        let pool = actors(8);
        let a = select_witnesses(&seed(1), &pool, &[], 3).unwrap();
        let b = select_witnesses(&seed(1), &pool, &[], 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_selection_ignores_caller_order() {
        let pool = actors(8);
        let mut shuffled = pool.clone();
        shuffled.reverse();
        let a = select_witnesses(&seed(1), &pool, &[], 3).unwrap();
        let b = select_witnesses(&seed(1), &shuffled, &[], 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_selection_varies_with_seed() {
        let pool = actors(16);
        let a = select_witnesses(&seed(1), &pool, &[], 4).unwrap();
        let b = select_witnesses(&seed(2), &pool, &[], 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_excluded_actors_never_selected() {
        let pool = actors(8);
        let excluded = vec![pool[0].clone(), pool[1].clone()];
        for i in 0..32u8 {
            let selected = select_witnesses(&seed(i), &pool, &excluded, 3).unwrap();
            for witness in &selected {
                assert!(!excluded.contains(witness));
            }
        }
    }

    #[test]
    fn test_no_duplicate_witnesses() {
        let pool = actors(8);
        let selected = select_witnesses(&seed(9), &pool, &[], 5).unwrap();
        let mut deduped = selected.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), selected.len());
    }

    #[test]
    fn test_insufficient_pool_rejected() {
        let pool = actors(2);
        let result = select_witnesses(&seed(1), &pool, &[pool[0].clone()], 2);
        assert!(matches!(
            result,
            Err(WitnessError::InsufficientWitnesses { required: 2, available: 1 })
        ));
    }

    #[test]
    fn test_collect_and_verify_signatures() {
        let keyring = Keyring::new();
        let pool = actors(4);
        for actor in &pool {
            keyring.import(actor.clone(), &[actor.0.as_bytes()[15]; 32]).unwrap();
        }
        let hash = seed(3);
        let selected = select_witnesses(&hash, &pool, &[], 2).unwrap();
        let signatures = collect_signatures(&keyring, &selected, &hash).unwrap();
        assert_eq!(signatures.len(), 2);
        assert!(verify_signatures(&signatures, &hash));
        assert!(!verify_signatures(&signatures, &seed(4)));
    }

    #[test]
    fn test_selection_matches_detects_substitution() {
        let keyring = Keyring::new();
        let pool = actors(6);
        for actor in &pool {
            keyring.import(actor.clone(), &[actor.0.as_bytes()[15]; 32]).unwrap();
        }
        let hash = seed(5);
        let selected = select_witnesses(&hash, &pool, &[], 2).unwrap();
        let mut signatures = collect_signatures(&keyring, &selected, &hash).unwrap();
        assert!(selection_matches(&hash, &pool, &[], &signatures));

        // Swap in a witness the draw did not pick
        let outsider = pool.iter().find(|a| !selected.contains(a)).unwrap();
        signatures[0].witness_id = outsider.clone();
        assert!(!selection_matches(&hash, &pool, &[], &signatures));
    }
}
