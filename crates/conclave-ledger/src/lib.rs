//! Conclave Ledger - the canonical state and hash service
//!
//! The sole writer interface to the witnessed log. Chain hashes,
//! signatures, and witness co-signatures are produced inside this
//! crate's trust boundary; no caller supplies them.
//!
//! # Invariants
//!
//! 1. Appends are idempotent per `(actor_id, client_token)`
//! 2. `append` fails with `StaleChain` when the intended parent is not
//!    the tip; a second child of an extended parent is a fork and halts
//!    the chain
//! 3. The only write is append; nothing mutates or deletes
//! 4. Timestamps are monotonic per identity chain, issued by a single
//!    TimeAuthority
//! 5. The halt check is the first observable effect of every append

pub mod service;
pub mod store;
pub mod time;
pub mod verify;

pub use service::*;
pub use store::*;
pub use time::*;
pub use verify::*;
