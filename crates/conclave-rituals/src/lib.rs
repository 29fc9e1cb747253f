//! Conclave Rituals - the five explicit state machines
//!
//! Cycle boundary, continuation vote, breach acknowledgment, override,
//! and cessation. Every transition is produced by exactly one event of a
//! named kind; nothing here runs on a timer, and nothing advances as a
//! side effect of another machine.
//!
//! The whole module is one fold: [`RitualState::apply`] consumes events
//! in log order and is the single definition of every transition. The
//! live system and the replayer run the same fold, which is what makes
//! the replay law hold by construction.

pub mod replay;
pub mod state;

pub use replay::*;
pub use state::*;
