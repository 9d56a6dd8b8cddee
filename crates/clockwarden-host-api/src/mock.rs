//! Mock capabilities for testing

use async_trait::async_trait;
use clockwarden_api::{OvertimeStatus, PunchOutcome};
use clockwarden_util::LocalUser;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    GatewayError, GatewayResult, HostError, HostResult, PunchGateway, WorkstationLocker,
};

/// Calls observed by [`MockGateway`]
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Authenticate { remote_user: String },
    SubmitPunch,
    RequestOvertime { local_user: LocalUser, hours: f64 },
    OvertimeStatus { local_user: LocalUser },
}

/// Scriptable in-memory gateway
pub struct MockGateway {
    token: Mutex<Option<String>>,
    calls: Arc<Mutex<Vec<GatewayCall>>>,

    /// Accepted `(remote_user, password)`; empty accepts anything non-blank
    pub valid_credentials: Arc<Mutex<Vec<(String, String)>>>,

    /// Outcomes returned by successive `submit_punch` calls.
    /// When empty, a punch-in is reported.
    pub punch_outcomes: Arc<Mutex<VecDeque<PunchOutcome>>>,

    /// Configure every call to fail at the transport level
    pub fail_transport: Arc<Mutex<bool>>,

    /// Whether `request_overtime` is accepted
    pub accept_overtime: Arc<Mutex<bool>>,

    /// Value returned by `today_overtime_status`
    pub overtime_status: Arc<Mutex<Option<OvertimeStatus>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            token: Mutex::new(None),
            calls: Arc::new(Mutex::new(Vec::new())),
            valid_credentials: Arc::new(Mutex::new(Vec::new())),
            punch_outcomes: Arc::new(Mutex::new(VecDeque::new())),
            fail_transport: Arc::new(Mutex::new(false)),
            accept_overtime: Arc::new(Mutex::new(true)),
            overtime_status: Arc::new(Mutex::new(None)),
        }
    }

    /// Only accept this credential pair
    pub fn with_credentials(self, remote_user: &str, password: &str) -> Self {
        self.valid_credentials
            .lock()
            .unwrap()
            .push((remote_user.into(), password.into()));
        self
    }

    /// Queue the outcome of the next `submit_punch`
    pub fn push_punch_outcome(&self, outcome: PunchOutcome) {
        self.punch_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn set_overtime_status(&self, status: Option<OvertimeStatus>) {
        *self.overtime_status.lock().unwrap() = status;
    }

    pub fn set_fail_transport(&self, fail: bool) {
        *self.fail_transport.lock().unwrap() = fail;
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn punch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::SubmitPunch))
            .count()
    }

    fn record(&self, call: GatewayCall) -> GatewayResult<()> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_transport.lock().unwrap() {
            return Err(GatewayError::Transport("Mock transport failure".into()));
        }
        Ok(())
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PunchGateway for MockGateway {
    async fn authenticate(&self, remote_user: &str, password: &str) -> GatewayResult<bool> {
        self.record(GatewayCall::Authenticate {
            remote_user: remote_user.to_string(),
        })?;

        let valid = self.valid_credentials.lock().unwrap();
        let accepted = if valid.is_empty() {
            !remote_user.is_empty() && !password.is_empty()
        } else {
            valid.iter().any(|(u, p)| u == remote_user && p == password)
        };

        *self.token.lock().unwrap() = accepted.then(|| format!("mock-token-{}", remote_user));
        Ok(accepted)
    }

    fn current_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    async fn submit_punch(&self) -> GatewayResult<PunchOutcome> {
        self.record(GatewayCall::SubmitPunch)?;

        if self.current_token().is_none() {
            return Ok(PunchOutcome::RequestFailed);
        }

        Ok(self
            .punch_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| PunchOutcome::PunchIn {
                label: "PUNCH_IN".into(),
            }))
    }

    async fn request_overtime(
        &self,
        local_user: &LocalUser,
        _note: &str,
        hours: f64,
    ) -> GatewayResult<bool> {
        self.record(GatewayCall::RequestOvertime {
            local_user: local_user.clone(),
            hours,
        })?;
        Ok(*self.accept_overtime.lock().unwrap())
    }

    async fn today_overtime_status(
        &self,
        local_user: &LocalUser,
    ) -> GatewayResult<Option<OvertimeStatus>> {
        self.record(GatewayCall::OvertimeStatus {
            local_user: local_user.clone(),
        })?;
        Ok(*self.overtime_status.lock().unwrap())
    }
}

/// Counting lock double
pub struct MockLocker {
    locks: AtomicUsize,

    /// Configure lock to fail
    pub fail_lock: Arc<Mutex<bool>>,
}

impl MockLocker {
    pub fn new() -> Self {
        Self {
            locks: AtomicUsize::new(0),
            fail_lock: Arc::new(Mutex::new(false)),
        }
    }

    /// Number of lock attempts, failed ones included
    pub fn lock_count(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }
}

impl Default for MockLocker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkstationLocker for MockLocker {
    async fn lock(&self) -> HostResult<()> {
        self.locks.fetch_add(1, Ordering::SeqCst);
        if *self.fail_lock.lock().unwrap() {
            return Err(HostError::LockFailed("Mock lock failure".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn punch_without_token_fails() {
        let gateway = MockGateway::new();
        let outcome = gateway.submit_punch().await.unwrap();
        assert_eq!(outcome, PunchOutcome::RequestFailed);
    }

    #[tokio::test]
    async fn scripted_punch_after_login() {
        let gateway = MockGateway::new().with_credentials("dperez", "pw");
        assert!(!gateway.authenticate("dperez", "wrong").await.unwrap());
        assert!(gateway.current_token().is_none());

        assert!(gateway.authenticate("dperez", "pw").await.unwrap());
        gateway.push_punch_outcome(PunchOutcome::PunchOut {
            label: "PUNCH_OUT".into(),
        });

        assert!(matches!(
            gateway.submit_punch().await.unwrap(),
            PunchOutcome::PunchOut { .. }
        ));
        assert!(matches!(
            gateway.submit_punch().await.unwrap(),
            PunchOutcome::PunchIn { .. }
        ));
        assert_eq!(gateway.punch_count(), 2);
    }

    #[tokio::test]
    async fn transport_failure() {
        let gateway = MockGateway::new();
        gateway.set_fail_transport(true);
        assert!(matches!(
            gateway.authenticate("a", "b").await,
            Err(GatewayError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn locker_counts_failures() {
        let locker = MockLocker::new();
        locker.lock().await.unwrap();
        *locker.fail_lock.lock().unwrap() = true;
        assert!(locker.lock().await.is_err());
        assert_eq!(locker.lock_count(), 2);
    }
}
