//! Validated policy structures

use crate::schema::{
    RawConfig, RawEnforcementConfig, RawGatewayConfig, RawLedgerConfig, RawOvertimeConfig,
    RawServiceConfig, RawShiftConfig,
};
use crate::validation::parse_time;
use clockwarden_util::{DayWindow, WallClock, default_log_dir, default_socket_path};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PRE_LOGIN_GRACE: Duration = Duration::from_secs(2 * 60);
pub const DEFAULT_LUNCH_WINDOW: Duration = Duration::from_secs(5 * 3600);
pub const DEFAULT_SHIFT_LENGTH: Duration = Duration::from_secs(8 * 3600);
pub const DEFAULT_END_OF_DAY_MIN_LOGINS: u32 = 2;
pub const DEFAULT_MAX_LOGINS_PER_DAY: u32 = 4;
pub const DEFAULT_LUNCH_LOCKOUT_START: (u8, u8) = (10, 0);
pub const DEFAULT_LUNCH_LOCKOUT_END: (u8, u8) = (16, 0);
pub const DEFAULT_LUNCH_LOCKOUT: Duration = Duration::from_secs(50 * 60);
pub const DEFAULT_REST_LOCKOUT: Duration = Duration::from_secs(4 * 3600);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_API_KEY_ENV: &str = "SAASHR_API_KEY";
pub const DEFAULT_COMPANY: &str = "AGI04";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_OVERTIME_POLL_INTERVAL: Duration = Duration::from_secs(30);

const DEFAULT_LOGIN_URL: &str = "https://secure2.saashr.com/ta/rest/v1/login";
const DEFAULT_PUNCH_URL: &str = "https://secure3.saashr.com/ta/rest/v1/webclock";
const DEFAULT_OVERTIME_URL: &str = "https://clock.adrianas.com/backend/timeclock/overtime";
const DEFAULT_OVERTIME_STATUS_URL: &str = "https://clock.adrianas.com/backend/timeclock/overtime/today";

/// Validated policy ready for use by the engine
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub service: ServiceConfig,
    pub shift: ShiftPolicy,
    pub ledger: LedgerPolicy,
    pub enforcement: EnforcementPolicy,
    pub gateway: GatewayConfig,
    pub overtime: OvertimePolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            shift: ShiftPolicy::from_raw(raw.shift),
            ledger: LedgerPolicy::from_raw(raw.ledger),
            enforcement: EnforcementPolicy::from_raw(raw.enforcement),
            gateway: GatewayConfig::from_raw(raw.gateway),
            overtime: OvertimePolicy::from_raw(raw.overtime),
        }
    }
}

/// Paths used by the daemon
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            log_dir: raw.log_dir.unwrap_or_else(default_log_dir),
            data_dir: raw
                .data_dir
                .unwrap_or_else(clockwarden_util::default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Session state machine timings
#[derive(Debug, Clone)]
pub struct ShiftPolicy {
    pub pre_login_grace: Duration,
    pub lunch_window: Duration,
    /// Allowed shift length before any overtime approval
    pub default_shift_length: Duration,
    pub end_of_day_min_logins: u32,
}

impl ShiftPolicy {
    fn from_raw(raw: RawShiftConfig) -> Self {
        Self {
            pre_login_grace: raw
                .pre_login_grace_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_PRE_LOGIN_GRACE),
            lunch_window: raw
                .lunch_window_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_LUNCH_WINDOW),
            default_shift_length: raw
                .default_shift_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SHIFT_LENGTH),
            end_of_day_min_logins: raw
                .end_of_day_min_logins
                .unwrap_or(DEFAULT_END_OF_DAY_MIN_LOGINS),
        }
    }
}

impl Default for ShiftPolicy {
    fn default() -> Self {
        Self::from_raw(RawShiftConfig::default())
    }
}

/// Rules derived from the punch ledger
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    pub max_logins_per_day: u32,
    /// A clock-out inside this range is a lunch break
    pub lunch_range: DayWindow,
    pub lunch_lockout: Duration,
    pub rest_lockout: Duration,
}

impl LedgerPolicy {
    fn from_raw(raw: RawLedgerConfig) -> Self {
        let start = wall_clock_or(raw.lunch_lockout_start.as_deref(), DEFAULT_LUNCH_LOCKOUT_START);
        let end = wall_clock_or(raw.lunch_lockout_end.as_deref(), DEFAULT_LUNCH_LOCKOUT_END);

        Self {
            max_logins_per_day: raw
                .max_logins_per_day
                .unwrap_or(DEFAULT_MAX_LOGINS_PER_DAY),
            lunch_range: DayWindow::new(start, end),
            lunch_lockout: raw
                .lunch_lockout_minutes
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .unwrap_or(DEFAULT_LUNCH_LOCKOUT),
            rest_lockout: raw
                .rest_lockout_minutes
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .unwrap_or(DEFAULT_REST_LOCKOUT),
        }
    }

    /// Lockout length that follows a clock-out at `clock_out`
    pub fn lockout_after(&self, clock_out: &chrono::DateTime<chrono::Local>) -> Duration {
        if self.lunch_range.contains(clock_out) {
            self.lunch_lockout
        } else {
            self.rest_lockout
        }
    }
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self::from_raw(RawLedgerConfig::default())
    }
}

fn wall_clock_or(value: Option<&str>, fallback: (u8, u8)) -> WallClock {
    let (hour, minute) = value
        .and_then(|v| parse_time(v).ok())
        .unwrap_or(fallback);
    WallClock { hour, minute }
}

#[derive(Debug, Clone)]
pub struct EnforcementPolicy {
    pub settle_delay: Duration,
}

impl EnforcementPolicy {
    fn from_raw(raw: RawEnforcementConfig) -> Self {
        Self {
            settle_delay: raw
                .settle_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SETTLE_DELAY),
        }
    }
}

impl Default for EnforcementPolicy {
    fn default() -> Self {
        Self::from_raw(RawEnforcementConfig::default())
    }
}

/// Remote timekeeping service endpoints
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub login_url: String,
    pub punch_url: String,
    pub overtime_url: String,
    pub overtime_status_url: String,
    pub company: String,
    pub api_key_env: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    fn from_raw(raw: RawGatewayConfig) -> Self {
        Self {
            login_url: raw.login_url.unwrap_or_else(|| DEFAULT_LOGIN_URL.into()),
            punch_url: raw.punch_url.unwrap_or_else(|| DEFAULT_PUNCH_URL.into()),
            overtime_url: raw
                .overtime_url
                .unwrap_or_else(|| DEFAULT_OVERTIME_URL.into()),
            overtime_status_url: raw
                .overtime_status_url
                .unwrap_or_else(|| DEFAULT_OVERTIME_STATUS_URL.into()),
            company: raw.company.unwrap_or_else(|| DEFAULT_COMPANY.into()),
            api_key_env: raw
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.into()),
            timeout: raw
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_GATEWAY_TIMEOUT),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_raw(RawGatewayConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct OvertimePolicy {
    pub poll_interval: Duration,
}

impl OvertimePolicy {
    fn from_raw(raw: RawOvertimeConfig) -> Self {
        Self {
            poll_interval: raw
                .poll_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_OVERTIME_POLL_INTERVAL),
        }
    }
}

impl Default for OvertimePolicy {
    fn default() -> Self {
        Self::from_raw(RawOvertimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    #[test]
    fn defaults_match_shop_rules() {
        let policy = Policy::default();
        assert_eq!(policy.shift.pre_login_grace, Duration::from_secs(120));
        assert_eq!(policy.shift.lunch_window, Duration::from_secs(18000));
        assert_eq!(policy.shift.default_shift_length, Duration::from_secs(28800));
        assert_eq!(policy.ledger.max_logins_per_day, 4);
        assert_eq!(policy.enforcement.settle_delay, Duration::from_secs(10));
        assert_eq!(policy.gateway.api_key_env, "SAASHR_API_KEY");
        assert_eq!(policy.overtime.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn lockout_length_depends_on_clock_out_time() {
        let ledger = LedgerPolicy::default();
        let noon = Local.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        let at_ten = Local.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let at_four = Local.with_ymd_and_hms(2025, 6, 2, 16, 0, 0).unwrap();
        let evening = Local.with_ymd_and_hms(2025, 6, 2, 20, 0, 0).unwrap();

        assert_eq!(ledger.lockout_after(&noon), Duration::from_secs(50 * 60));
        assert_eq!(ledger.lockout_after(&at_ten), Duration::from_secs(50 * 60));
        assert_eq!(ledger.lockout_after(&at_four), Duration::from_secs(50 * 60));
        assert_eq!(ledger.lockout_after(&evening), Duration::from_secs(4 * 3600));
    }
}
