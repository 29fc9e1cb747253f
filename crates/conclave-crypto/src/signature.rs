//! Digital signatures over chain hashes

use crate::{CryptoError, CryptoResult, KeyPair, PublicKey};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};

/// A detached signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Hex-encoded signature bytes
    pub signature: String,
    /// Public key of the signer
    pub public_key: PublicKey,
}

impl Signature {
    /// Sign a message
    pub fn sign(keypair: &KeyPair, message: &[u8]) -> CryptoResult<Self> {
        let signature = keypair
            .signing_key()
            .try_sign(message)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        Ok(Self {
            signature: hex::encode(signature.to_bytes()),
            public_key: PublicKey::from_keypair(keypair),
        })
    }

    /// Verify the signature against a message
    pub fn verify(&self, message: &[u8]) -> CryptoResult<bool> {
        verify_hex(&self.signature, &self.public_key, message)
    }
}

/// Verify a hex-encoded signature under a public key.
pub fn verify_hex(signature_hex: &str, public_key: &PublicKey, message: &[u8]) -> CryptoResult<bool> {
    let signature_bytes =
        hex::decode(signature_hex).map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;

    if signature_bytes.len() != 64 {
        return Err(CryptoError::VerificationFailed(
            "Signature must be 64 bytes".to_string(),
        ));
    }

    let mut sig_array = [0u8; 64];
    sig_array.copy_from_slice(&signature_bytes);

    let signature = Ed25519Signature::from_bytes(&sig_array);
    let verifying_key = public_key.to_verifying_key()?;

    Ok(verifying_key.verify(message, &signature).is_ok())
}
