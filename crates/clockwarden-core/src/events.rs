//! Core events emitted by the engine

use chrono::{DateTime, Local};
use clockwarden_api::{DenialReason, PunchKind, ShiftSnapshot};
use clockwarden_util::LocalUser;

use crate::EnforcementReport;

/// Events emitted by the session enforcer, punch desk and executor
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A shift deadline was missed; a forced log-off follows
    WarningIssued { local_user: LocalUser, message: String },

    /// Shift timers or phase changed
    ShiftChanged {
        local_user: LocalUser,
        snapshot: ShiftSnapshot,
    },

    /// An interactive punch was accepted and written to the ledger
    PunchRecorded {
        local_user: LocalUser,
        kind: PunchKind,
        label: String,
        end_of_day: bool,
    },

    /// An interactive punch was refused before reaching the remote service
    PunchDenied {
        local_user: LocalUser,
        reason: DenialReason,
    },

    /// Approved overtime moved the forced-logout deadline
    ShiftExtended {
        local_user: LocalUser,
        hours: f64,
        forced_logout_at: Option<DateTime<Local>>,
    },

    /// A forced enforcement procedure finished
    Enforced(EnforcementReport),
}
