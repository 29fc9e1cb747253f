//! The closed error set propagated to the public boundary
//!
//! `Halted` and `IntegrityFailure` are never recovered locally; they
//! surface unchanged. `StaleChain` is the only retryable error, and only
//! outside halt.

use thiserror::Error;

/// Result type for Conclave operations
pub type Result<T> = std::result::Result<T, ConclaveError>;

/// Conclave error kinds (closed set)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConclaveError {
    /// Any operation attempted under halt. Fatal to the operation.
    #[error("Halted: {reason}")]
    Halted { reason: String },

    /// Optimistic-concurrency miss on the chain tip
    #[error("Stale chain for {actor_id}: intended prev {intended} is not the tip {tip}")]
    StaleChain {
        actor_id: String,
        intended: String,
        tip: String,
    },

    /// Lease held by another instance, or a write fenced by a stale epoch
    #[error("Identity conflict for {actor_id}: {detail}")]
    IdentityConflict { actor_id: String, detail: String },

    /// Signature, hash, or fork detection. Halts the chain.
    #[error("Integrity failure: {detail}")]
    IntegrityFailure { detail: String },

    /// Event body failed validation. Not written; not halt-inducing.
    #[error("Schema violation: {detail}")]
    SchemaViolation { detail: String },

    /// Tally attempted without quorum. The tally is not written.
    #[error("Quorum unmet for {motion_id}: {cast} of {roster} cast, {required} required")]
    QuorumUnmet {
        motion_id: String,
        cast: u32,
        roster: u32,
        required: u32,
    },

    /// Non-monotone timestamp. Caller error; no halt.
    #[error("Time regression for {actor_id}: {proposed} is not after {last}")]
    TimeRegression {
        actor_id: String,
        last: i64,
        proposed: i64,
    },
}

impl ConclaveError {
    /// Shorthand constructor for halt errors
    pub fn halted(reason: impl Into<String>) -> Self {
        Self::Halted {
            reason: reason.into(),
        }
    }

    /// Shorthand constructor for integrity failures
    pub fn integrity(detail: impl Into<String>) -> Self {
        Self::IntegrityFailure {
            detail: detail.into(),
        }
    }

    /// Shorthand constructor for schema violations
    pub fn schema(detail: impl Into<String>) -> Self {
        Self::SchemaViolation {
            detail: detail.into(),
        }
    }

    /// Only `StaleChain` may be retried, and only outside halt
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StaleChain { .. })
    }

    /// Whether this error must surface to the boundary unchanged
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Halted { .. } | Self::IntegrityFailure { .. })
    }

    /// Stable code for reports and structured logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Halted { .. } => "HALTED",
            Self::StaleChain { .. } => "STALE_CHAIN",
            Self::IdentityConflict { .. } => "IDENTITY_CONFLICT",
            Self::IntegrityFailure { .. } => "INTEGRITY_FAILURE",
            Self::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            Self::QuorumUnmet { .. } => "QUORUM_UNMET",
            Self::TimeRegression { .. } => "TIME_REGRESSION",
        }
    }

    /// Process exit code for the operator CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Halted { .. } => 2,
            Self::StaleChain { .. } => 3,
            Self::IdentityConflict { .. } => 4,
            Self::IntegrityFailure { .. } => 5,
            Self::SchemaViolation { .. } | Self::QuorumUnmet { .. } | Self::TimeRegression { .. } => 1,
        }
    }
}
