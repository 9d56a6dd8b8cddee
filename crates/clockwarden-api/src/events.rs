//! Event types for daemon -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{PunchKind, ShiftSnapshot, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: clockwarden_util::now(),
            payload,
        }
    }
}

/// All possible events from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A deadline was missed; the workstation is about to be locked
    WarningIssued { message: String },

    /// A punch was written to the ledger
    PunchRecorded { kind: PunchKind, label: String },

    /// Shift timers or phase changed
    ShiftChanged(ShiftSnapshot),

    /// Daemon is shutting down
    Shutdown,
}
