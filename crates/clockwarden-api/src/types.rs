//! Shared domain types

use chrono::{DateTime, Local};
use clockwarden_util::LocalUser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Kind of a ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PunchKind {
    /// Clocked in with the remote service
    Login,
    /// Clocked out with the remote service
    #[serde(rename = "CLOCKOUT")]
    ClockOut,
}

impl PunchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchKind::Login => "LOGIN",
            PunchKind::ClockOut => "CLOCKOUT",
        }
    }
}

impl fmt::Display for PunchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown punch kind: {0}")]
pub struct ParsePunchKindError(pub String);

impl FromStr for PunchKind {
    type Err = ParsePunchKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LOGIN" => Ok(PunchKind::Login),
            "CLOCKOUT" => Ok(PunchKind::ClockOut),
            other => Err(ParsePunchKindError(other.to_string())),
        }
    }
}

/// One appended ledger line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunchEvent {
    pub local_user: LocalUser,
    pub kind: PunchKind,
    pub timestamp: DateTime<Local>,
}

/// Remote-service credentials captured on the first punch-in of a day
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub remote_user: String,
    pub remote_password: String,
}

impl Credentials {
    pub fn new(remote_user: impl Into<String>, remote_password: impl Into<String>) -> Self {
        Self {
            remote_user: remote_user.into(),
            remote_password: remote_password.into(),
        }
    }

    /// Both fields present; blank credentials are never replayed
    pub fn is_usable(&self) -> bool {
        !self.remote_user.is_empty() && !self.remote_password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("remote_user", &self.remote_user)
            .field("remote_password", &"<redacted>")
            .finish()
    }
}

/// A stored credential capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub local_user: LocalUser,
    pub timestamp: DateTime<Local>,
    pub credentials: Credentials,
}

/// Classified response of the remote punch endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PunchOutcome {
    /// Remote service registered a clock-in
    PunchIn { label: String },
    /// Remote service registered a clock-out
    PunchOut { label: String },
    /// Request succeeded but carried no punch (outside an allowed punch window)
    InvalidPunchWindow { raw_response: String },
    /// No token, transport failure or non-success status
    RequestFailed,
}

impl PunchOutcome {
    /// Human-readable response text shown to the user and written to the diagnostic log
    pub fn describe(&self) -> String {
        match self {
            PunchOutcome::PunchIn { label } => format!("Punch Successful: {}", label),
            PunchOutcome::PunchOut { label } => {
                format!("Punch Successful: {} YOU WILL BE LOGGED OUT IN 10 SECONDS", label)
            }
            PunchOutcome::InvalidPunchWindow { raw_response } => format!(
                "Punch Not Successful: Invalid Punch Time Detected. {}",
                raw_response
            ),
            PunchOutcome::RequestFailed => "Punch Failed!".to_string(),
        }
    }

    /// The ledger event this outcome corresponds to, if any
    pub fn ledger_kind(&self) -> Option<PunchKind> {
        match self {
            PunchOutcome::PunchIn { .. } => Some(PunchKind::Login),
            PunchOutcome::PunchOut { .. } => Some(PunchKind::ClockOut),
            _ => None,
        }
    }
}

/// Today's overtime decision for a user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OvertimeStatus {
    pub accepted: bool,
    pub hours: f64,
}

/// Coarse state of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPhase {
    /// No countdown and no open shift
    Idle,
    /// Waiting for the first punch-in; grace timer armed
    PreLoginWait,
    /// Shift open; lunch and/or forced-logout timers armed
    OnShift,
}

/// Point-in-time view of a session's shift state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftSnapshot {
    pub phase: ShiftPhase,
    pub shift_start: Option<DateTime<Local>>,
    pub allowed_shift_length: Duration,
    pub pre_login_deadline: Option<DateTime<Local>>,
    pub lunch_deadline: Option<DateTime<Local>>,
    pub forced_logout_deadline: Option<DateTime<Local>>,
}

/// Why an interactive punch was refused before reaching the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    LockedOut,
    MaxLoginsReached,
    InvalidCredentials,
    OvertimeNotAllowed,
}

impl DenialReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::LockedOut => "Access Denied: Locked out.",
            DenialReason::MaxLoginsReached => {
                "Maximum number of logins reached for today. Cannot punch."
            }
            DenialReason::InvalidCredentials => "Invalid credentials.",
            DenialReason::OvertimeNotAllowed => {
                "Overtime can only be requested after returning from lunch."
            }
        }
    }
}

/// Result of an interactive punch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PunchReport {
    /// Refused locally; nothing was sent to the remote punch endpoint
    Denied { reason: DenialReason },
    /// Remote service accepted the punch and the ledger was updated
    Recorded {
        outcome: PunchOutcome,
        end_of_day: bool,
    },
    /// Remote service did not register a punch; nothing recorded
    NotRecorded { outcome: PunchOutcome },
}

impl PunchReport {
    pub fn message(&self) -> String {
        match self {
            PunchReport::Denied { reason } => reason.message().to_string(),
            PunchReport::Recorded { outcome, .. } | PunchReport::NotRecorded { outcome } => {
                outcome.describe()
            }
        }
    }
}

/// Client role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Same account as the daemon, or root
    Admin,
    /// Any other local account
    Observer,
}

impl ClientRole {
    pub fn can_punch(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

/// Daemon state snapshot for `GetState`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStateSnapshot {
    pub api_version: u32,
    pub local_user: LocalUser,
    pub shift: ShiftSnapshot,
    pub today_login_count: u32,
    pub locked_out: bool,
    pub next_punch_is_out: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_kind_parses_ledger_tokens() {
        assert_eq!("LOGIN".parse::<PunchKind>().unwrap(), PunchKind::Login);
        assert_eq!("CLOCKOUT".parse::<PunchKind>().unwrap(), PunchKind::ClockOut);
        assert!("LOGOUT".parse::<PunchKind>().is_err());
        assert_eq!(PunchKind::ClockOut.to_string(), "CLOCKOUT");
    }

    #[test]
    fn punch_kind_json_matches_ledger_tokens() {
        assert_eq!(serde_json::to_string(&PunchKind::ClockOut).unwrap(), "\"CLOCKOUT\"");
        assert_eq!(serde_json::to_string(&PunchKind::Login).unwrap(), "\"LOGIN\"");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("mlopez", "hunter2");
        let dbg = format!("{:?}", creds);
        assert!(dbg.contains("mlopez"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn outcome_descriptions() {
        let out = PunchOutcome::PunchOut { label: "PUNCH_OUT".into() };
        assert!(out.describe().contains("LOGGED OUT IN 10 SECONDS"));
        assert_eq!(out.ledger_kind(), Some(PunchKind::ClockOut));
        assert_eq!(PunchOutcome::RequestFailed.ledger_kind(), None);
    }
}
