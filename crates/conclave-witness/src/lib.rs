//! Conclave Witness - verifiable witness selection and attribution
//!
//! Every event carries at least *w* witness co-signatures. Witnesses are
//! selected by a deterministic function seeded from the parent event's
//! chain hash, so any verifier can recompute the selection and no single
//! party can bias it.
//!
//! The crate also tracks the rolling distribution of witness pairs: a
//! pair that co-signs far more often than chance suggests collusion and
//! is escalated as a witness-anomaly citation.

pub mod monitor;
pub mod precedent;
pub mod selection;

pub use monitor::*;
pub use precedent::*;
pub use selection::*;

use thiserror::Error;

/// Witness subsystem errors
#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("Not enough eligible witnesses: need {required}, have {available}")]
    InsufficientWitnesses { required: usize, available: usize },

    #[error("Witness signing failed: {0}")]
    SigningFailed(String),
}

/// Result type for witness operations
pub type WitnessResult<T> = std::result::Result<T, WitnessError>;
