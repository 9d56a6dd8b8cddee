//! Linux host for clockwarden
//!
//! Provides:
//! - HTTP punch gateway for the remote timekeeping and overtime services
//! - Workstation locking through logind

mod gateway;
mod lock;

pub use gateway::*;
pub use lock::*;
