//! Core enforcement engine for clockwarden
//!
//! This crate provides:
//! - The punch ledger and the lockout, parity and max-login rules over it
//! - The per-session shift state machine and its deadlines
//! - Forced enforcement (credential replay, punch-out, workstation lock)
//! - Interactive punching and overtime polling

mod completion;
mod deadline;
mod events;
mod executor;
mod ledger;
mod overtime;
mod punch;
mod session;

pub use completion::*;
pub use deadline::*;
pub use events::*;
pub use executor::*;
pub use ledger::*;
pub use overtime::*;
pub use punch::*;
pub use session::*;
