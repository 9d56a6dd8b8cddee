//! Overtime approval polling
//!
//! While a shift is open, the watch asks the remote service whether overtime
//! was approved for today. The first accepted answer extends the shift and
//! ends the watch.

use clockwarden_host_api::PunchGateway;
use clockwarden_store::DiagnosticLog;
use clockwarden_util::LocalUser;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::SessionEnforcer;

struct Inner {
    gateway: Arc<dyn PunchGateway>,
    session: SessionEnforcer,
    poll_interval: Duration,
    log: Arc<DiagnosticLog>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Background poller for today's overtime status
#[derive(Clone)]
pub struct OvertimeWatch {
    inner: Arc<Inner>,
}

impl OvertimeWatch {
    pub fn new(
        gateway: Arc<dyn PunchGateway>,
        session: SessionEnforcer,
        poll_interval: Duration,
        log: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                session,
                poll_interval,
                log,
                task: Mutex::new(None),
            }),
        }
    }

    /// Start polling for `local_user`, replacing any running watch
    pub fn start(&self, local_user: &LocalUser) {
        let inner = self.inner.clone();
        let local_user = local_user.clone();

        let mut task = self.task();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        info!(local_user = %local_user, interval = ?self.inner.poll_interval, "Overtime watch started");
        *task = Some(tokio::spawn(async move {
            inner.run(local_user).await;
        }));
    }

    pub fn stop(&self) {
        if let Some(handle) = self.task().take() {
            handle.abort();
            debug!("Overtime watch stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.task.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Inner {
    async fn run(&self, local_user: LocalUser) {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            match self.gateway.today_overtime_status(&local_user).await {
                Ok(Some(status)) if status.accepted => {
                    let now = clockwarden_util::now();
                    self.log
                        .write(&now, &format!("Overtime approved: {}h", status.hours));
                    info!(local_user = %local_user, hours = status.hours, "Overtime approved");
                    self.session.on_overtime_approved(status.hours, now);
                    return;
                }
                Ok(_) => {
                    debug!(local_user = %local_user, "No approved overtime yet");
                }
                Err(e) => {
                    warn!(local_user = %local_user, error = %e, "Overtime status poll failed");
                    self.log
                        .write(&clockwarden_util::now(), &format!("ERROR: {}", e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnforcementExecutor, PunchLedger};
    use clockwarden_api::OvertimeStatus;
    use clockwarden_config::{LedgerPolicy, ShiftPolicy};
    use clockwarden_host_api::{GatewayCall, MockGateway, MockLocker};
    use clockwarden_store::{
        ENFORCER_LOG_FILE, FileStore, OVERTIME_LOG_FILE, SESSION_LOG_FILE,
    };
    use tokio::sync::mpsc;

    struct Harness {
        dir: tempfile::TempDir,
        gateway: Arc<MockGateway>,
        session: SessionEnforcer,
        watch: OvertimeWatch,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new());
        let ledger = Arc::new(PunchLedger::new(
            Arc::new(FileStore::new(dir.path())),
            LedgerPolicy::default(),
        ));
        let executor = EnforcementExecutor::new(
            ledger,
            gateway.clone(),
            Arc::new(MockLocker::new()),
            Arc::new(DiagnosticLog::in_dir(dir.path(), ENFORCER_LOG_FILE)),
            Duration::from_secs(10),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = SessionEnforcer::new(
            LocalUser::new("dana"),
            ShiftPolicy::default(),
            executor,
            tx,
            Arc::new(DiagnosticLog::in_dir(dir.path(), SESSION_LOG_FILE)),
        );
        let watch = OvertimeWatch::new(
            gateway.clone(),
            session.clone(),
            Duration::from_secs(30),
            Arc::new(DiagnosticLog::in_dir(dir.path(), OVERTIME_LOG_FILE)),
        );

        Harness {
            dir,
            gateway,
            session,
            watch,
        }
    }

    fn polls(gateway: &MockGateway) -> usize {
        gateway
            .calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::OvertimeStatus { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_accepted() {
        let h = harness();
        let user = LocalUser::new("dana");
        let start = clockwarden_util::now();
        h.session.on_punch_in(start);
        h.watch.start(&user);

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(polls(&h.gateway), 2);
        assert!(h.watch.is_running());

        h.gateway.set_overtime_status(Some(OvertimeStatus {
            accepted: true,
            hours: 2.0,
        }));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(polls(&h.gateway), 3);
        assert!(!h.watch.is_running());
        assert_eq!(
            h.session.snapshot().allowed_shift_length,
            Duration::from_secs(10 * 3600)
        );

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(polls(&h.gateway), 3);

        let log = std::fs::read_to_string(h.dir.path().join(OVERTIME_LOG_FILE)).unwrap();
        assert!(log.contains("Overtime approved: 2h"));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_request_keeps_polling() {
        let h = harness();
        h.gateway.set_overtime_status(Some(OvertimeStatus {
            accepted: false,
            hours: 1.0,
        }));
        h.watch.start(&LocalUser::new("dana"));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(polls(&h.gateway), 3);
        assert!(h.watch.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_logged_and_polling_continues() {
        let h = harness();
        h.gateway.set_fail_transport(true);
        h.watch.start(&LocalUser::new("dana"));

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(polls(&h.gateway), 2);
        assert!(h.watch.is_running());

        let log = std::fs::read_to_string(h.dir.path().join(OVERTIME_LOG_FILE)).unwrap();
        assert!(log.contains("ERROR:"));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_and_stop_ends() {
        let h = harness();
        let user = LocalUser::new("dana");
        h.watch.start(&user);
        tokio::time::sleep(Duration::from_secs(20)).await;
        h.watch.start(&user);

        // The first watch would have polled at 30s
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(polls(&h.gateway), 0);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(polls(&h.gateway), 1);

        h.watch.stop();
        assert!(!h.watch.is_running());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(polls(&h.gateway), 1);
    }
}
