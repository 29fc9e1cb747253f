//! Conclave Types - Canonical domain types for the witnessed deliberation core
//!
//! Everything the core records or decides is expressed in these types:
//! - Strongly-typed identifiers for actors, cycles, motions, votes
//! - The closed set of event kinds and their body schemas
//! - Motions, votes, consensus levels, adoption thresholds
//! - Cycle and halt state
//! - The closed error set propagated to the public boundary
//!
//! # Invariants
//!
//! 1. Event bodies are a closed tagged union; unknown fields are rejected
//! 2. Consensus levels are derived, never supplied
//! 3. `Adopted` and `Rejected` are terminal motion states
//! 4. Precedent citations carry `binding = false`, literally

pub mod config;
pub mod cycle;
pub mod error;
pub mod event;
pub mod halt;
pub mod identity;
pub mod motion;
pub mod time;
pub mod vote;

pub use config::*;
pub use cycle::*;
pub use error::*;
pub use event::*;
pub use halt::*;
pub use identity::*;
pub use motion::*;
pub use time::*;
pub use vote::*;
