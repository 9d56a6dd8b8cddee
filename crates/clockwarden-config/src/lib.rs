//! Configuration parsing and validation for clockwarden
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Shift timings and ledger lockout rules
//! - Remote gateway endpoints, with the API key read from the environment or a `.env` file

mod envfile;
mod policy;
mod schema;
mod validation;

pub use envfile::*;
pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields the default policy
pub fn load_config_or_default(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No config file, using defaults");
            Ok(Policy::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Policy::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_minimal_config() {
        let policy = parse_config("config_version = 1").unwrap();
        assert_eq!(policy.ledger.max_logins_per_day, 4);
        assert_eq!(policy.gateway.company, "AGI04");
    }

    #[test]
    fn parse_overrides() {
        let config = r#"
            config_version = 1

            [shift]
            pre_login_grace_seconds = 300

            [ledger]
            max_logins_per_day = 6
            lunch_lockout_minutes = 30

            [enforcement]
            settle_delay_seconds = 0
        "#;

        let policy = parse_config(config).unwrap();
        assert_eq!(policy.shift.pre_login_grace, Duration::from_secs(300));
        assert_eq!(policy.ledger.max_logins_per_day, 6);
        assert_eq!(policy.ledger.lunch_lockout, Duration::from_secs(30 * 60));
        assert_eq!(policy.enforcement.settle_delay, Duration::ZERO);
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_values() {
        let config = r#"
            config_version = 1

            [ledger]
            lunch_lockout_start = "25:00"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let policy = load_config_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(policy.shift.default_shift_length, Duration::from_secs(8 * 3600));
    }
}
