//! Forced enforcement: replay cached credentials, punch out, lock
//!
//! Every procedure runs as a spawned task and never fails outward. Each step
//! is written to the enforcer diagnostic log and traced; the returned
//! `JoinHandle` is only awaited by tests.

use clockwarden_api::{PunchKind, PunchOutcome};
use clockwarden_host_api::{PunchGateway, WorkstationLocker};
use clockwarden_store::DiagnosticLog;
use clockwarden_util::LocalUser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{CoreEvent, PunchLedger};

/// When the workstation lock happens relative to the punch replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Replay, wait the settle delay, then lock
    AfterSettle,
    /// Lock first, then replay; no delay
    Immediate,
}

/// Which procedure produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementKind {
    ForcedLogOff,
    ForcedPunchOut,
    LockAfterPunchOut,
}

/// What a forced procedure did
#[derive(Debug, Clone, PartialEq)]
pub struct EnforcementReport {
    pub local_user: LocalUser,
    pub kind: EnforcementKind,
    /// Replay credentials were found in the cache
    pub credentials_found: bool,
    /// Response text of the replayed punch, if one was submitted
    pub response: Option<String>,
    /// Whether a CLOCKOUT was appended to the ledger
    pub clock_out_recorded: bool,
    /// `None` if no lock was attempted
    pub locked: Option<bool>,
}

impl EnforcementReport {
    fn new(local_user: &LocalUser, kind: EnforcementKind) -> Self {
        Self {
            local_user: local_user.clone(),
            kind,
            credentials_found: false,
            response: None,
            clock_out_recorded: false,
            locked: None,
        }
    }
}

/// Forced enforcement executor
#[derive(Clone)]
pub struct EnforcementExecutor {
    ledger: Arc<PunchLedger>,
    gateway: Arc<dyn PunchGateway>,
    locker: Arc<dyn WorkstationLocker>,
    log: Arc<DiagnosticLog>,
    settle_delay: Duration,
    events: Option<mpsc::UnboundedSender<CoreEvent>>,
}

impl EnforcementExecutor {
    pub fn new(
        ledger: Arc<PunchLedger>,
        gateway: Arc<dyn PunchGateway>,
        locker: Arc<dyn WorkstationLocker>,
        log: Arc<DiagnosticLog>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            gateway,
            locker,
            log,
            settle_delay,
            events: None,
        }
    }

    /// Publish a [`CoreEvent::Enforced`] after every procedure
    pub fn with_events(mut self, events: mpsc::UnboundedSender<CoreEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn ledger(&self) -> &Arc<PunchLedger> {
        &self.ledger
    }

    /// Startup reconciliation: if the ledger says the user is still clocked in,
    /// punch them out.
    pub fn enforce_startup_restrictions(
        &self,
        local_user: &LocalUser,
    ) -> Option<JoinHandle<EnforcementReport>> {
        let now = clockwarden_util::now();
        if self.ledger.should_next_punch_be_out(local_user, now) {
            info!(local_user = %local_user, "Open shift found at startup, forcing punch-out");
            Some(self.force_punch_out(local_user))
        } else {
            debug!(local_user = %local_user, "No open shift at startup");
            None
        }
    }

    /// Replay credentials, punch, record CLOCKOUT and lock the workstation
    pub fn force_log_off(
        &self,
        local_user: &LocalUser,
        mode: LockMode,
    ) -> JoinHandle<EnforcementReport> {
        let this = self.clone();
        let local_user = local_user.clone();

        tokio::spawn(async move {
            let mut report = EnforcementReport::new(&local_user, EnforcementKind::ForcedLogOff);

            if mode == LockMode::Immediate {
                report.locked = Some(this.try_lock(&local_user).await);
            }

            this.replay_punch(&local_user, &mut report).await;

            if mode == LockMode::AfterSettle {
                tokio::time::sleep(this.settle_delay).await;
                report.locked = Some(this.try_lock(&local_user).await);
            }

            this.finish(report)
        })
    }

    /// Replay credentials, punch and record CLOCKOUT, without locking
    pub fn force_punch_out(&self, local_user: &LocalUser) -> JoinHandle<EnforcementReport> {
        let this = self.clone();
        let local_user = local_user.clone();

        tokio::spawn(async move {
            let mut report =
                EnforcementReport::new(&local_user, EnforcementKind::ForcedPunchOut);
            this.replay_punch(&local_user, &mut report).await;
            this.finish(report)
        })
    }

    /// Wait the settle delay, then lock. Used after an interactive punch-out.
    pub fn lock_after_settle(&self, local_user: &LocalUser) -> JoinHandle<EnforcementReport> {
        let this = self.clone();
        let local_user = local_user.clone();

        tokio::spawn(async move {
            let mut report =
                EnforcementReport::new(&local_user, EnforcementKind::LockAfterPunchOut);
            tokio::time::sleep(this.settle_delay).await;
            report.locked = Some(this.try_lock(&local_user).await);
            this.finish(report)
        })
    }

    async fn replay_punch(&self, local_user: &LocalUser, report: &mut EnforcementReport) {
        let Some(credentials) = self
            .ledger
            .last_saved_credentials(local_user)
            .filter(|c| c.is_usable())
        else {
            self.note(&format!("No credentials found for {}", local_user));
            return;
        };
        report.credentials_found = true;

        match self
            .gateway
            .authenticate(&credentials.remote_user, &credentials.remote_password)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                self.note(&format!("Auth failed for {}", credentials.remote_user));
                return;
            }
            Err(e) => {
                self.note(&format!(
                    "ERROR authenticating {}: {}",
                    credentials.remote_user, e
                ));
                return;
            }
        }

        let outcome = match self.gateway.submit_punch().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.note(&format!("ERROR submitting forced punch: {}", e));
                return;
            }
        };

        let response = outcome.describe();
        self.note(&format!("Forced punch response: {}", response));
        if let PunchOutcome::PunchIn { .. } = outcome {
            warn!(local_user = %local_user, "Forced punch registered as a clock-in remotely");
        }
        report.response = Some(response);

        match self
            .ledger
            .record_clock_out(local_user, clockwarden_util::now())
        {
            Ok(()) => report.clock_out_recorded = true,
            Err(e) => self.note(&format!("ERROR recording {}: {}", PunchKind::ClockOut, e)),
        }
    }

    async fn try_lock(&self, local_user: &LocalUser) -> bool {
        match self.locker.lock().await {
            Ok(()) => {
                info!(local_user = %local_user, "Workstation locked");
                true
            }
            Err(e) => {
                self.note(&format!("ERROR locking workstation: {}", e));
                false
            }
        }
    }

    fn note(&self, message: &str) {
        info!(detail = message, "Enforcement step");
        self.log.write(&clockwarden_util::now(), message);
    }

    fn finish(&self, report: EnforcementReport) -> EnforcementReport {
        debug!(report = ?report, "Enforcement finished");
        if let Some(events) = &self.events {
            let _ = events.send(CoreEvent::Enforced(report.clone()));
        }
        report
    }
}
