//! Command types for the clockwarden protocol

use clockwarden_util::ClientId;
use serde::{Deserialize, Serialize};

use crate::{ClientRole, PunchReport, ServiceStateSnapshot, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    PermissionDenied,
    UnsupportedVersion,
    GatewayError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get current shift and ledger state
    GetState,

    /// (Re)start the pre-login grace countdown
    StartCountdown,

    /// Interactive punch with the user's remote credentials
    Punch {
        remote_user: String,
        password: String,
    },

    /// Overtime was approved out of band; extend today's shift
    OvertimeApproved { hours: f64 },

    /// Ask the remote service to approve overtime for today
    RequestOvertime { note: String, hours: f64 },

    /// Forced log-off now: lock first, then replay the cached punch
    LockNow,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Ping for keepalive and single-instance detection
    Ping,
}

impl Command {
    /// Commands that change enforcement state need an admin client
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Command::StartCountdown
                | Command::Punch { .. }
                | Command::OvertimeApproved { .. }
                | Command::RequestOvertime { .. }
                | Command::LockNow
        )
    }

    /// Name used in logs; never includes credentials
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetState => "get_state",
            Command::StartCountdown => "start_countdown",
            Command::Punch { .. } => "punch",
            Command::OvertimeApproved { .. } => "overtime_approved",
            Command::RequestOvertime { .. } => "request_overtime",
            Command::LockNow => "lock_now",
            Command::SubscribeEvents => "subscribe_events",
            Command::UnsubscribeEvents => "unsubscribe_events",
            Command::Ping => "ping",
        }
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(ServiceStateSnapshot),
    CountdownStarted,
    Punch(PunchReport),
    ShiftExtended,
    OvertimeRequested { accepted: bool },
    LockRequested,
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}
