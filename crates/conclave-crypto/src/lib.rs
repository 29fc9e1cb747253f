//! Conclave Crypto - chain hashing and signatures for the witnessed log
//!
//! This crate provides:
//! - Key generation and management
//! - Ed25519 signatures over chain hashes
//! - SHA-256 chain hash computation
//! - The keyring: the only holder of private keys
//!
//! # Security Invariant
//!
//! **Private keys never leave the keyring.** Chain hashes and signatures
//! are computed inside the ledger's trust boundary; nothing outside it
//! can produce a valid signature.

pub mod hash;
pub mod keyring;
pub mod keys;
pub mod signature;

pub use hash::*;
pub use keyring::*;
pub use keys::*;
pub use signature::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Unknown signer: {0}")]
    UnknownSigner(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
