//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub service: RawServiceConfig,

    #[serde(default)]
    pub shift: RawShiftConfig,

    #[serde(default)]
    pub ledger: RawLedgerConfig,

    #[serde(default)]
    pub enforcement: RawEnforcementConfig,

    #[serde(default)]
    pub gateway: RawGatewayConfig,

    #[serde(default)]
    pub overtime: RawOvertimeConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Directory for the plaintext diagnostic logs
    pub log_dir: Option<PathBuf>,

    /// Directory for the punch log, credential cache and audit database
    pub data_dir: Option<PathBuf>,
}

/// Session timer settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawShiftConfig {
    /// Time allowed between session start and the first punch-in
    pub pre_login_grace_seconds: Option<u64>,

    /// Time allowed between a punch-in and the lunch punch-out
    pub lunch_window_seconds: Option<u64>,

    /// Shift length before overtime
    pub default_shift_seconds: Option<u64>,

    /// Logins needed today before a punch-out counts as end of day
    pub end_of_day_min_logins: Option<u32>,
}

/// Ledger rule settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLedgerConfig {
    pub max_logins_per_day: Option<u32>,

    /// Start of the midday range where a clock-out is treated as lunch (HH:MM)
    pub lunch_lockout_start: Option<String>,

    /// End of that range, inclusive (HH:MM)
    pub lunch_lockout_end: Option<String>,

    pub lunch_lockout_minutes: Option<u64>,

    /// Lockout after a clock-out outside the lunch range
    pub rest_lockout_minutes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEnforcementConfig {
    /// Wait between a forced punch attempt and the workstation lock
    pub settle_delay_seconds: Option<u64>,
}

/// Remote timekeeping endpoints
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGatewayConfig {
    pub login_url: Option<String>,
    pub punch_url: Option<String>,
    pub overtime_url: Option<String>,
    pub overtime_status_url: Option<String>,

    /// Company code sent with the login request
    pub company: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawOvertimeConfig {
    pub poll_interval_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sections() {
        let toml_str = r#"
            config_version = 1

            [shift]
            lunch_window_seconds = 14400

            [ledger]
            lunch_lockout_start = "11:00"
            lunch_lockout_end = "15:00"

            [gateway]
            company = "ACME01"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.shift.lunch_window_seconds, Some(14400));
        assert_eq!(config.ledger.lunch_lockout_start.as_deref(), Some("11:00"));
        assert_eq!(config.gateway.company.as_deref(), Some("ACME01"));
        assert!(config.overtime.poll_interval_seconds.is_none());
    }
}
