//! Shared types for clockwarden
//!
//! This crate defines the vocabulary shared by the engine, the gateway
//! adapters and the IPC surface:
//! - Punch kinds and classified punch outcomes
//! - Shift snapshots
//! - Commands, responses and events of the daemon protocol

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
