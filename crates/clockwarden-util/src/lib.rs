//! Shared utilities for clockwarden
//!
//! This crate provides:
//! - ID types (LocalUser, SessionId, ClientId)
//! - Time utilities (mockable wall clock, ledger timestamp format, wall-clock windows)
//! - Default paths for socket, data, log and config locations

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
