//! Interactive punching
//!
//! The desk is what a punch dialog talks to: it applies the ledger rules,
//! talks to the remote service, records what was accepted and drives the
//! session state machine and overtime watch from the outcome.

use chrono::{DateTime, Local};
use clockwarden_api::{Credentials, DenialReason, PunchKind, PunchOutcome, PunchReport};
use clockwarden_host_api::PunchGateway;
use clockwarden_util::LocalUser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    CoreEvent, EnforcementExecutor, OvertimeWatch, ParityCompletion, PunchLedger,
    SessionEnforcer, ShiftCompletion,
};

/// Logins needed today before overtime may be requested (back from lunch)
pub const OVERTIME_MIN_LOGINS: u32 = 2;

pub struct PunchDesk {
    ledger: Arc<PunchLedger>,
    gateway: Arc<dyn PunchGateway>,
    session: SessionEnforcer,
    executor: EnforcementExecutor,
    watch: OvertimeWatch,
    completion: Arc<dyn ShiftCompletion>,
    events: mpsc::UnboundedSender<CoreEvent>,
}

impl PunchDesk {
    pub fn new(
        gateway: Arc<dyn PunchGateway>,
        session: SessionEnforcer,
        executor: EnforcementExecutor,
        watch: OvertimeWatch,
        events: mpsc::UnboundedSender<CoreEvent>,
    ) -> Self {
        Self {
            ledger: executor.ledger().clone(),
            gateway,
            session,
            executor,
            watch,
            completion: Arc::new(ParityCompletion::default()),
            events,
        }
    }

    /// Replace the end-of-day classification
    pub fn with_completion(mut self, completion: Arc<dyn ShiftCompletion>) -> Self {
        self.completion = completion;
        self
    }

    pub fn ledger(&self) -> &Arc<PunchLedger> {
        &self.ledger
    }

    pub fn session(&self) -> &SessionEnforcer {
        &self.session
    }

    pub fn executor(&self) -> &EnforcementExecutor {
        &self.executor
    }

    /// Punch in or out with the user's remote credentials
    pub async fn punch(
        &self,
        local_user: &LocalUser,
        remote_user: &str,
        password: &str,
        now: DateTime<Local>,
    ) -> PunchReport {
        if self.ledger.is_locked_out(local_user, now) {
            return self.deny(local_user, DenialReason::LockedOut);
        }
        if self.ledger.has_exceeded_max_logins(local_user, now) {
            return self.deny(local_user, DenialReason::MaxLoginsReached);
        }

        match self.gateway.authenticate(remote_user, password).await {
            Ok(true) => {}
            Ok(false) => return self.deny(local_user, DenialReason::InvalidCredentials),
            Err(e) => {
                warn!(local_user = %local_user, remote_user, error = %e, "Authentication request failed");
                return PunchReport::NotRecorded {
                    outcome: PunchOutcome::RequestFailed,
                };
            }
        }

        let outcome = match self.gateway.submit_punch().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(local_user = %local_user, error = %e, "Punch request failed");
                PunchOutcome::RequestFailed
            }
        };

        let (kind, label, end_of_day) = match &outcome {
            PunchOutcome::PunchIn { label } => {
                let credentials = Credentials::new(remote_user, password);
                if let Err(e) = self.ledger.record_login(local_user, Some(&credentials), now) {
                    warn!(local_user = %local_user, error = %e, "Failed to record login");
                }
                self.session.on_punch_in(now);
                self.watch.start(local_user);
                (PunchKind::Login, label.clone(), false)
            }
            PunchOutcome::PunchOut { label } => {
                if let Err(e) = self.ledger.record_clock_out(local_user, now) {
                    warn!(local_user = %local_user, error = %e, "Failed to record clock-out");
                }
                let end_of_day = self.completion.is_end_of_day(&self.ledger, local_user, now);
                self.session.on_punch_out(end_of_day, now);
                self.watch.stop();
                self.executor.lock_after_settle(local_user);
                (PunchKind::ClockOut, label.clone(), end_of_day)
            }
            PunchOutcome::InvalidPunchWindow { .. } | PunchOutcome::RequestFailed => {
                info!(local_user = %local_user, outcome = %outcome.describe(), "Punch not registered");
                return PunchReport::NotRecorded { outcome };
            }
        };

        info!(
            local_user = %local_user,
            kind = %kind,
            label = %label,
            end_of_day,
            "Punch recorded"
        );
        let _ = self.events.send(CoreEvent::PunchRecorded {
            local_user: local_user.clone(),
            kind,
            label,
            end_of_day,
        });

        PunchReport::Recorded {
            outcome,
            end_of_day,
        }
    }

    /// Ask for overtime today. `Ok(accepted)` once forwarded; refused before lunch.
    pub async fn request_overtime(
        &self,
        local_user: &LocalUser,
        note: &str,
        hours: f64,
        now: DateTime<Local>,
    ) -> Result<bool, DenialReason> {
        let count = self.ledger.today_login_count(local_user, now);
        if count < OVERTIME_MIN_LOGINS {
            debug!(local_user = %local_user, count, "Overtime requested before lunch");
            return Err(DenialReason::OvertimeNotAllowed);
        }

        match self.gateway.request_overtime(local_user, note, hours).await {
            Ok(accepted) => {
                info!(local_user = %local_user, hours, accepted, "Overtime requested");
                Ok(accepted)
            }
            Err(e) => {
                warn!(local_user = %local_user, error = %e, "Overtime request failed");
                Ok(false)
            }
        }
    }

    fn deny(&self, local_user: &LocalUser, reason: DenialReason) -> PunchReport {
        info!(local_user = %local_user, reason = ?reason, "Punch denied");
        let _ = self.events.send(CoreEvent::PunchDenied {
            local_user: local_user.clone(),
            reason,
        });
        PunchReport::Denied { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clockwarden_api::ShiftPhase;
    use clockwarden_config::{LedgerPolicy, ShiftPolicy};
    use clockwarden_host_api::{GatewayCall, MockGateway, MockLocker};
    use clockwarden_store::{
        DiagnosticLog, ENFORCER_LOG_FILE, FileStore, OVERTIME_LOG_FILE, SESSION_LOG_FILE,
    };
    use std::time::Duration;

    struct Harness {
        _dir: tempfile::TempDir,
        gateway: Arc<MockGateway>,
        locker: Arc<MockLocker>,
        desk: PunchDesk,
        events: mpsc::UnboundedReceiver<CoreEvent>,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new().with_credentials("dperez", "pw"));
        let locker = Arc::new(MockLocker::new());
        let ledger = Arc::new(PunchLedger::new(
            Arc::new(FileStore::new(dir.path())),
            LedgerPolicy::default(),
        ));
        let executor = EnforcementExecutor::new(
            ledger,
            gateway.clone(),
            locker.clone(),
            Arc::new(DiagnosticLog::in_dir(dir.path(), ENFORCER_LOG_FILE)),
            Duration::from_secs(10),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let session = SessionEnforcer::new(
            LocalUser::new("dana"),
            ShiftPolicy::default(),
            executor.clone(),
            tx.clone(),
            Arc::new(DiagnosticLog::in_dir(dir.path(), SESSION_LOG_FILE)),
        );
        let watch = OvertimeWatch::new(
            gateway.clone(),
            session.clone(),
            Duration::from_secs(30),
            Arc::new(DiagnosticLog::in_dir(dir.path(), OVERTIME_LOG_FILE)),
        );
        let desk = PunchDesk::new(gateway.clone(), session, executor, watch, tx);

        Harness {
            _dir: dir,
            gateway,
            locker,
            desk,
            events: rx,
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
    }

    fn punch_out(label: &str) -> PunchOutcome {
        PunchOutcome::PunchOut {
            label: label.into(),
        }
    }

    fn user() -> LocalUser {
        LocalUser::new("dana")
    }

    #[tokio::test(start_paused = true)]
    async fn punch_in_records_and_opens_shift() {
        let mut h = harness();

        let report = h.desk.punch(&user(), "dperez", "pw", at(9, 0)).await;
        assert!(matches!(report, PunchReport::Recorded { end_of_day: false, .. }));

        let ledger = h.desk.ledger();
        assert_eq!(ledger.today_login_count(&user(), at(9, 0)), 1);
        assert_eq!(
            ledger.last_saved_credentials(&user()),
            Some(Credentials::new("dperez", "pw"))
        );

        let snapshot = h.desk.session().snapshot();
        assert_eq!(snapshot.phase, ShiftPhase::OnShift);
        assert_eq!(snapshot.lunch_deadline, Some(at(14, 0)));

        let recorded = std::iter::from_fn(|| h.events.try_recv().ok())
            .any(|e| matches!(e, CoreEvent::PunchRecorded { kind: PunchKind::Login, .. }));
        assert!(recorded);
    }

    #[tokio::test(start_paused = true)]
    async fn lunch_punch_out_locks_and_starts_lockout() {
        let h = harness();
        h.desk.punch(&user(), "dperez", "pw", at(9, 0)).await;

        h.gateway.push_punch_outcome(punch_out("PUNCH_OUT"));
        let report = h.desk.punch(&user(), "dperez", "pw", at(12, 0)).await;
        assert_eq!(
            report,
            PunchReport::Recorded {
                outcome: punch_out("PUNCH_OUT"),
                end_of_day: false
            }
        );

        let snapshot = h.desk.session().snapshot();
        assert_eq!(snapshot.lunch_deadline, None);
        assert_eq!(snapshot.shift_start, Some(at(9, 0)));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(h.locker.lock_count(), 1);

        let submits = h.gateway.punch_count();
        let report = h.desk.punch(&user(), "dperez", "pw", at(12, 10)).await;
        assert_eq!(
            report,
            PunchReport::Denied {
                reason: DenialReason::LockedOut
            }
        );
        assert_eq!(h.gateway.punch_count(), submits);

        let report = h.desk.punch(&user(), "dperez", "pw", at(12, 51)).await;
        assert!(matches!(report, PunchReport::Recorded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn second_punch_out_ends_the_day() {
        let h = harness();
        h.desk.punch(&user(), "dperez", "pw", at(9, 0)).await;
        h.gateway.push_punch_outcome(punch_out("PUNCH_OUT"));
        h.desk.punch(&user(), "dperez", "pw", at(12, 30)).await;
        h.desk.punch(&user(), "dperez", "pw", at(13, 30)).await;

        h.gateway.push_punch_outcome(punch_out("PUNCH_OUT"));
        let report = h.desk.punch(&user(), "dperez", "pw", at(17, 30)).await;
        assert!(matches!(report, PunchReport::Recorded { end_of_day: true, .. }));
        assert_eq!(h.desk.session().snapshot().phase, ShiftPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_credentials_are_denied() {
        let h = harness();

        let report = h.desk.punch(&user(), "dperez", "wrong", at(9, 0)).await;
        assert_eq!(
            report,
            PunchReport::Denied {
                reason: DenialReason::InvalidCredentials
            }
        );
        assert_eq!(h.gateway.punch_count(), 0);
        assert_eq!(h.desk.ledger().today_login_count(&user(), at(9, 0)), 0);
        assert_eq!(h.desk.session().snapshot().phase, ShiftPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn max_logins_checked_before_authenticating() {
        let h = harness();
        for hour in [7, 8, 9, 10] {
            h.desk.ledger().record_login(&user(), None, at(hour, 0)).unwrap();
        }

        let report = h.desk.punch(&user(), "dperez", "pw", at(11, 0)).await;
        assert_eq!(
            report,
            PunchReport::Denied {
                reason: DenialReason::MaxLoginsReached
            }
        );
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn punch_outside_window_records_nothing() {
        let h = harness();
        let outcome = PunchOutcome::InvalidPunchWindow {
            raw_response: "{\"status\":\"OK\"}".into(),
        };
        h.gateway.push_punch_outcome(outcome.clone());

        let report = h.desk.punch(&user(), "dperez", "pw", at(9, 0)).await;
        assert_eq!(report, PunchReport::NotRecorded { outcome });
        assert_eq!(h.desk.ledger().today_login_count(&user(), at(9, 0)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_is_not_recorded() {
        let h = harness();
        h.gateway.set_fail_transport(true);

        let report = h.desk.punch(&user(), "dperez", "pw", at(9, 0)).await;
        assert_eq!(
            report,
            PunchReport::NotRecorded {
                outcome: PunchOutcome::RequestFailed
            }
        );
        assert_eq!(h.desk.ledger().today_login_count(&user(), at(9, 0)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overtime_only_after_lunch() {
        let h = harness();
        h.desk.ledger().record_login(&user(), None, at(9, 0)).unwrap();

        let result = h.desk.request_overtime(&user(), "inventory", 2.0, at(11, 0)).await;
        assert_eq!(result, Err(DenialReason::OvertimeNotAllowed));

        h.desk.ledger().record_clock_out(&user(), at(12, 0)).unwrap();
        h.desk.ledger().record_login(&user(), None, at(13, 0)).unwrap();

        let result = h.desk.request_overtime(&user(), "inventory", 2.0, at(15, 0)).await;
        assert_eq!(result, Ok(true));
        assert!(h.gateway.calls().iter().any(|c| matches!(
            c,
            GatewayCall::RequestOvertime { hours, .. } if *hours == 2.0
        )));
    }
}
