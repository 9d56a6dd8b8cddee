//! IPC layer for clockwardend
//!
//! Provides:
//! - Unix domain socket server with NDJSON framing
//! - Client connection tracking and event fan-out
//! - Peer UID based roles
//! - A small client, also used for the single-instance probe

mod client;
mod server;

pub use client::*;
pub use server::*;

use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server error: {0}")]
    ServerError(String),
}

pub type IpcResult<T> = Result<T, IpcError>;
