//! Capability traits

use async_trait::async_trait;
use clockwarden_api::{OvertimeStatus, PunchOutcome};
use clockwarden_util::LocalUser;
use thiserror::Error;

/// Errors from the remote timekeeping service
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from desktop host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Lock failed: {0}")]
    LockFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;

/// Remote timekeeping service
///
/// `authenticate` caches a session token inside the gateway; `submit_punch`
/// uses whatever token is cached and reports `RequestFailed` without one.
#[async_trait]
pub trait PunchGateway: Send + Sync {
    /// Log in with remote credentials. `Ok(false)` means the service rejected them.
    async fn authenticate(&self, remote_user: &str, password: &str) -> GatewayResult<bool>;

    /// Token from the last successful `authenticate`
    fn current_token(&self) -> Option<String>;

    /// Register a punch for the authenticated user
    async fn submit_punch(&self) -> GatewayResult<PunchOutcome>;

    /// Ask for overtime approval for today. Returns whether the request was accepted.
    async fn request_overtime(
        &self,
        local_user: &LocalUser,
        note: &str,
        hours: f64,
    ) -> GatewayResult<bool>;

    /// Today's overtime decision, `None` if nothing has been requested
    async fn today_overtime_status(
        &self,
        local_user: &LocalUser,
    ) -> GatewayResult<Option<OvertimeStatus>>;
}

/// Desktop lock
#[async_trait]
pub trait WorkstationLocker: Send + Sync {
    async fn lock(&self) -> HostResult<()>;
}
