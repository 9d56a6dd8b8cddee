//! Punch ledger rules
//!
//! Counts, parity and lockout are derived by re-scanning the persisted punch
//! log on every query. Storage failures read as an empty ledger.

use chrono::{DateTime, Local};
use clockwarden_api::{CredentialRecord, Credentials, PunchEvent, PunchKind};
use clockwarden_config::LedgerPolicy;
use clockwarden_store::{PunchStore, StoreResult};
use clockwarden_util::{LocalUser, checked_deadline};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Punch history for the local desktop, with the rules derived from it
pub struct PunchLedger {
    store: Arc<dyn PunchStore>,
    policy: LedgerPolicy,
}

impl PunchLedger {
    pub fn new(store: Arc<dyn PunchStore>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Append a LOGIN. On the user's first login of `now`'s day, usable
    /// credentials are also captured for unattended replay.
    pub fn record_login(
        &self,
        local_user: &LocalUser,
        credentials: Option<&Credentials>,
        now: DateTime<Local>,
    ) -> StoreResult<()> {
        let first_today = self.today_login_count(local_user, now) == 0;

        self.store.append_punch(&PunchEvent {
            local_user: local_user.clone(),
            kind: PunchKind::Login,
            timestamp: now,
        })?;

        if first_today && let Some(credentials) = credentials.filter(|c| c.is_usable()) {
            self.store.append_credentials(&CredentialRecord {
                local_user: local_user.clone(),
                timestamp: now,
                credentials: credentials.clone(),
            })?;
            info!(local_user = %local_user, remote_user = %credentials.remote_user, "Saved replay credentials");
        }

        debug!(local_user = %local_user, first_today, "Login recorded");
        Ok(())
    }

    /// Append a CLOCKOUT, regardless of current parity
    pub fn record_clock_out(&self, local_user: &LocalUser, now: DateTime<Local>) -> StoreResult<()> {
        self.store.append_punch(&PunchEvent {
            local_user: local_user.clone(),
            kind: PunchKind::ClockOut,
            timestamp: now,
        })?;
        debug!(local_user = %local_user, "Clock-out recorded");
        Ok(())
    }

    /// Number of LOGIN events dated `now`'s calendar day
    pub fn today_login_count(&self, local_user: &LocalUser, now: DateTime<Local>) -> u32 {
        let today = now.date_naive();
        self.punches(local_user)
            .iter()
            .filter(|p| p.kind == PunchKind::Login && p.timestamp.date_naive() == today)
            .count() as u32
    }

    /// When the lockout following the user's last clock-out ends, if it is still running.
    /// A lockout whose end is not a representable date is ignored.
    pub fn lockout_until(
        &self,
        local_user: &LocalUser,
        now: DateTime<Local>,
    ) -> Option<DateTime<Local>> {
        let last_clock_out = self
            .punches(local_user)
            .into_iter()
            .rev()
            .find(|p| p.kind == PunchKind::ClockOut)?
            .timestamp;

        let until = checked_deadline(last_clock_out, self.policy.lockout_after(&last_clock_out))?;
        (now < until).then_some(until)
    }

    pub fn is_locked_out(&self, local_user: &LocalUser, now: DateTime<Local>) -> bool {
        self.lockout_until(local_user, now).is_some()
    }

    pub fn has_exceeded_max_logins(&self, local_user: &LocalUser, now: DateTime<Local>) -> bool {
        self.today_login_count(local_user, now) >= self.policy.max_logins_per_day
    }

    /// Parity heuristic: an odd number of logins today means the user is clocked in
    pub fn should_next_punch_be_out(&self, local_user: &LocalUser, now: DateTime<Local>) -> bool {
        self.today_login_count(local_user, now) % 2 == 1
    }

    /// Most recently captured credentials for unattended replay
    pub fn last_saved_credentials(&self, local_user: &LocalUser) -> Option<Credentials> {
        match self.store.last_credentials(local_user) {
            Ok(record) => record.map(|r| r.credentials),
            Err(e) => {
                warn!(local_user = %local_user, error = %e, "Failed to read credential cache");
                None
            }
        }
    }

    fn punches(&self, local_user: &LocalUser) -> Vec<PunchEvent> {
        self.store.punches_for(local_user).unwrap_or_else(|e| {
            warn!(local_user = %local_user, error = %e, "Failed to read punch log");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clockwarden_store::FileStore;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    fn ledger(dir: &tempfile::TempDir) -> PunchLedger {
        PunchLedger::new(
            Arc::new(FileStore::new(dir.path())),
            LedgerPolicy::default(),
        )
    }

    #[test]
    fn empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");
        let now = at(2, 9, 0);

        assert_eq!(ledger.today_login_count(&user, now), 0);
        assert!(!ledger.is_locked_out(&user, now));
        assert!(!ledger.should_next_punch_be_out(&user, now));
        assert!(ledger.last_saved_credentials(&user).is_none());
    }

    #[test]
    fn login_count_ignores_clock_outs_and_other_days() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");

        ledger.record_login(&user, None, at(1, 9, 0)).unwrap();
        ledger.record_login(&user, None, at(2, 8, 0)).unwrap();
        ledger.record_clock_out(&user, at(2, 12, 0)).unwrap();
        ledger.record_clock_out(&user, at(2, 12, 1)).unwrap();
        ledger.record_login(&user, None, at(2, 13, 0)).unwrap();

        assert_eq!(ledger.today_login_count(&user, at(2, 14, 0)), 2);
        assert_eq!(ledger.today_login_count(&user, at(1, 14, 0)), 1);
        assert_eq!(ledger.today_login_count(&LocalUser::new("lee"), at(2, 14, 0)), 0);
    }

    #[test]
    fn parity_and_max_logins() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");
        let now = at(2, 18, 0);

        let mut expected_out = Vec::new();
        let mut expected_max = Vec::new();
        for i in 0..5 {
            expected_out.push(ledger.should_next_punch_be_out(&user, now));
            expected_max.push(ledger.has_exceeded_max_logins(&user, now));
            if i < 4 {
                ledger.record_login(&user, None, at(2, 8 + i, 0)).unwrap();
            }
        }

        assert_eq!(expected_out, vec![false, true, false, true, false]);
        assert_eq!(expected_max, vec![false, false, false, false, true]);
    }

    #[test]
    fn two_logins_without_clock_out_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");

        ledger.record_login(&user, None, at(2, 8, 0)).unwrap();
        ledger.record_login(&user, None, at(2, 8, 5)).unwrap();
        assert_eq!(ledger.today_login_count(&user, at(2, 9, 0)), 2);
        assert!(!ledger.should_next_punch_be_out(&user, at(2, 9, 0)));
    }

    #[test]
    fn credentials_captured_once_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");

        ledger
            .record_login(&user, Some(&Credentials::new("dperez", "first")), at(2, 8, 0))
            .unwrap();
        ledger
            .record_login(&user, Some(&Credentials::new("dperez", "second")), at(2, 13, 0))
            .unwrap();
        assert_eq!(
            ledger.last_saved_credentials(&user).unwrap().remote_password,
            "first"
        );

        ledger
            .record_login(&user, Some(&Credentials::new("dperez", "next-day")), at(3, 8, 0))
            .unwrap();
        assert_eq!(
            ledger.last_saved_credentials(&user).unwrap().remote_password,
            "next-day"
        );
    }

    #[test]
    fn blank_credentials_are_not_captured() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");

        ledger
            .record_login(&user, Some(&Credentials::new("dperez", "")), at(2, 8, 0))
            .unwrap();
        assert!(ledger.last_saved_credentials(&user).is_none());
    }

    #[test]
    fn lunch_lockout_is_fifty_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");

        ledger.record_clock_out(&user, at(2, 12, 0)).unwrap();

        assert!(ledger.is_locked_out(&user, at(2, 12, 49)));
        assert_eq!(ledger.lockout_until(&user, at(2, 12, 10)), Some(at(2, 12, 50)));
        assert!(!ledger.is_locked_out(&user, at(2, 12, 50)));
        assert!(!ledger.is_locked_out(&user, at(2, 12, 51)));
    }

    #[test]
    fn evening_lockout_is_four_hours() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");

        ledger.record_clock_out(&user, at(2, 20, 0)).unwrap();

        assert!(ledger.is_locked_out(&user, at(2, 23, 59)));
        assert!(!ledger.is_locked_out(&user, at(3, 0, 0)));
        assert!(!ledger.is_locked_out(&user, at(3, 0, 1)));
    }

    #[test]
    fn lockout_uses_last_clock_out_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let user = LocalUser::new("dana");

        ledger.record_clock_out(&user, at(2, 20, 0)).unwrap();
        // Appended later with an earlier timestamp: scan order wins
        ledger.record_clock_out(&user, at(2, 12, 0)).unwrap();

        assert!(!ledger.is_locked_out(&user, at(2, 21, 0)));
    }

    #[test]
    fn oversized_lockout_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let policy = LedgerPolicy {
            lunch_lockout: std::time::Duration::from_secs(u64::MAX),
            rest_lockout: std::time::Duration::from_secs(u64::MAX),
            ..LedgerPolicy::default()
        };
        let ledger = PunchLedger::new(Arc::new(FileStore::new(dir.path())), policy);
        let user = LocalUser::new("dana");

        ledger.record_clock_out(&user, at(2, 12, 0)).unwrap();
        assert_eq!(ledger.lockout_until(&user, at(2, 12, 10)), None);
    }
}
