//! End-of-day classification for punch-outs

use chrono::{DateTime, Local};
use clockwarden_util::LocalUser;

use crate::PunchLedger;

/// Decides whether a punch-out closes the working day.
///
/// Called after the CLOCKOUT has been recorded.
pub trait ShiftCompletion: Send + Sync {
    fn is_end_of_day(&self, ledger: &PunchLedger, local_user: &LocalUser, now: DateTime<Local>)
    -> bool;
}

/// Even number of logins today, and at least `min_logins` of them
#[derive(Debug, Clone, Copy)]
pub struct ParityCompletion {
    pub min_logins: u32,
}

impl ParityCompletion {
    pub fn new(min_logins: u32) -> Self {
        Self { min_logins }
    }
}

impl Default for ParityCompletion {
    fn default() -> Self {
        Self::new(clockwarden_config::DEFAULT_END_OF_DAY_MIN_LOGINS)
    }
}

impl ShiftCompletion for ParityCompletion {
    fn is_end_of_day(
        &self,
        ledger: &PunchLedger,
        local_user: &LocalUser,
        now: DateTime<Local>,
    ) -> bool {
        let count = ledger.today_login_count(local_user, now);
        count % 2 == 0 && count >= self.min_logins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clockwarden_config::LedgerPolicy;
    use clockwarden_store::FileStore;
    use std::sync::Arc;

    #[test]
    fn lunch_punch_out_is_not_end_of_day() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = PunchLedger::new(Arc::new(FileStore::new(dir.path())), LedgerPolicy::default());
        let user = LocalUser::new("dana");
        let completion = ParityCompletion::default();
        let at = |h| Local.with_ymd_and_hms(2025, 6, 2, h, 0, 0).unwrap();

        ledger.record_login(&user, None, at(9)).unwrap();
        ledger.record_clock_out(&user, at(12)).unwrap();
        assert!(!completion.is_end_of_day(&ledger, &user, at(12)));

        ledger.record_login(&user, None, at(13)).unwrap();
        ledger.record_clock_out(&user, at(17)).unwrap();
        assert!(completion.is_end_of_day(&ledger, &user, at(17)));
    }

    #[test]
    fn zero_logins_is_not_end_of_day() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = PunchLedger::new(Arc::new(FileStore::new(dir.path())), LedgerPolicy::default());
        let now = Local.with_ymd_and_hms(2025, 6, 2, 17, 0, 0).unwrap();

        assert!(!ParityCompletion::default().is_end_of_day(&ledger, &LocalUser::new("dana"), now));
    }
}
