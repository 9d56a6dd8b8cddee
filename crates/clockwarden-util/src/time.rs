//! Time utilities for clockwarden
//!
//! Everything time-sensitive in the ledger and the session engine takes an
//! explicit `now`; callers obtain it from [`now`], which honours mock time.
//!
//! # Mock Time for Development
//!
//! In debug builds, `CLOCKWARDEN_MOCK_TIME` overrides the system time.
//! The mocked clock advances at the real rate from the given instant.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 11:58:00`)

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "CLOCKWARDEN_MOCK_TIME";

/// Timestamp layout used in the punch log and credential cache
pub const LEDGER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)]
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive_dt) = NaiveDateTime::parse_from_str(&raw, LEDGER_TIMESTAMP_FORMAT) else {
                tracing::warn!(
                    mock_time = %raw,
                    expected_format = LEDGER_TIMESTAMP_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };
            let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() else {
                tracing::warn!(mock_time = %raw, "Mock time is ambiguous in the local timezone");
                return None;
            };
            let offset = mock_dt.signed_duration_since(chrono::Local::now());
            tracing::info!(mock_time = %raw, offset_secs = offset.num_seconds(), "Mock time enabled");
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current local time, shifted by `CLOCKWARDEN_MOCK_TIME` in debug builds.
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Render a timestamp the way it is stored in the ledger files
pub fn format_timestamp(dt: &DateTime<Local>) -> String {
    dt.format(LEDGER_TIMESTAMP_FORMAT).to_string()
}

/// Parse a ledger timestamp.
///
/// Accepts the native `YYYY-MM-DD HH:MM:SS` layout and RFC 3339. Returns `None`
/// for anything else, including local times that do not exist (DST gaps).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, LEDGER_TIMESTAMP_FORMAT) {
        return Local.from_local_datetime(&naive).earliest();
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Local))
}

/// `start + d`, or `None` when the result is not a representable date
pub fn checked_deadline(start: DateTime<Local>, d: Duration) -> Option<DateTime<Local>> {
    let d = chrono::Duration::from_std(d).ok()?;
    start.checked_add_signed(d)
}

/// Time left from `now` until `deadline`, zero if already past
pub fn until(deadline: DateTime<Local>, now: DateTime<Local>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// Wall-clock time of day (minute resolution), used for lockout windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    /// Returns seconds since midnight
    pub fn as_seconds_from_midnight(&self) -> u32 {
        (self.hour as u32) * 3600 + (self.minute as u32) * 60
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_seconds_from_midnight()
            .cmp(&other.as_seconds_from_midnight())
    }
}

/// Inclusive time-of-day range on a single day (no midnight wrap)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: WallClock,
    pub end: WallClock,
}

impl DayWindow {
    pub fn new(start: WallClock, end: WallClock) -> Self {
        Self { start, end }
    }

    /// True if the time of day of `dt` lies in `[start, end]`, to the second
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        let t = dt.time();
        t >= self.start.to_naive_time() && t <= self.end.to_naive_time()
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn timestamp_round_trips_through_ledger_format() {
        let dt = Local.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap();
        let s = format_timestamp(&dt);
        assert_eq!(s, "2025-03-14 09:05:07");
        assert_eq!(parse_timestamp(&s), Some(dt));
    }

    #[test]
    fn parse_timestamp_accepts_rfc3339() {
        let dt = Local.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap();
        assert_eq!(parse_timestamp(&dt.to_rfc3339()), Some(dt));
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        for bad in ["", "yesterday", "14/03/2025 09:05", "2025-03-14"] {
            assert!(parse_timestamp(bad).is_none(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn day_window_is_inclusive_to_the_second() {
        let window = DayWindow::new(WallClock::new(10, 0).unwrap(), WallClock::new(16, 0).unwrap());
        let at = |h, m, s| Local.with_ymd_and_hms(2025, 6, 2, h, m, s).unwrap();

        assert!(window.contains(&at(10, 0, 0)));
        assert!(window.contains(&at(12, 30, 0)));
        assert!(window.contains(&at(16, 0, 0)));
        assert!(!window.contains(&at(16, 0, 1)));
        assert!(!window.contains(&at(9, 59, 59)));
    }

    #[test]
    fn until_saturates_at_zero() {
        let now = Local.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        assert_eq!(until(now - chrono::Duration::minutes(5), now), Duration::ZERO);
        assert_eq!(until(now + chrono::Duration::minutes(5), now), Duration::from_secs(300));
    }

    #[test]
    fn checked_deadline_refuses_overflow() {
        let now = Local.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        assert_eq!(
            checked_deadline(now, Duration::from_secs(3600)),
            Some(now + chrono::Duration::hours(1))
        );
        assert_eq!(checked_deadline(now, Duration::from_secs(u64::MAX)), None);
        assert_eq!(checked_deadline(now, Duration::from_secs(36_000_000_028_800)), None);
    }

    #[test]
    fn wall_clock_ordering() {
        assert!(WallClock::new(8, 0).unwrap() < WallClock::new(12, 0).unwrap());
        assert!(WallClock::new(24, 0).is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(8 * 3600)), "8h 0m 0s");
    }

    #[test]
    fn now_returns_plausible_time() {
        let t = now();
        assert!(t.year() >= 2020);
    }
}
