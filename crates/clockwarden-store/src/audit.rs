//! Audit event types

use chrono::{DateTime, Local};
use clockwarden_api::{DenialReason, PunchKind};
use clockwarden_util::LocalUser;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Policy loaded
    PolicyLoaded { config_path: String, defaults: bool },

    /// Punch accepted by the remote service and written to the ledger
    PunchRecorded {
        local_user: LocalUser,
        kind: PunchKind,
        label: String,
    },

    /// Interactive punch refused locally
    PunchDenied {
        local_user: LocalUser,
        reason: DenialReason,
    },

    /// A shift deadline was missed
    WarningIssued { local_user: LocalUser, message: String },

    /// Forced enforcement ran for a user
    ForcedPunch {
        local_user: LocalUser,
        credentials_found: bool,
        response: Option<String>,
    },

    /// Workstation lock attempted
    WorkstationLocked { local_user: LocalUser, success: bool },

    /// Shift limit extended by approved overtime
    ShiftExtended {
        local_user: LocalUser,
        hours: f64,
        new_deadline: Option<DateTime<Local>>,
    },

    /// Overtime request sent to the remote service
    OvertimeRequested {
        local_user: LocalUser,
        hours: f64,
        accepted: bool,
    },

    /// Client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    pub timestamp: DateTime<Local>,

    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // set by store
            timestamp: clockwarden_util::now(),
            event,
        }
    }
}
