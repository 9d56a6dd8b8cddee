//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field} must be at most {max}")]
    DurationTooLong { field: &'static str, max: u64 },

    #[error("Lunch lockout range {start}-{end} ends before it starts")]
    InvertedLunchRange { start: String, end: String },

    #[error("Gateway {field} is not an http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Global config error: {0}")]
    GlobalError(String),
}

const DAY_SECONDS: u64 = 24 * 60 * 60;
const DAY_MINUTES: u64 = 24 * 60;
const HOUR_SECONDS: u64 = 60 * 60;

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let durations = [
        ("shift.pre_login_grace_seconds", config.shift.pre_login_grace_seconds, DAY_SECONDS),
        ("shift.lunch_window_seconds", config.shift.lunch_window_seconds, DAY_SECONDS),
        ("shift.default_shift_seconds", config.shift.default_shift_seconds, DAY_SECONDS),
        ("ledger.lunch_lockout_minutes", config.ledger.lunch_lockout_minutes, DAY_MINUTES),
        ("ledger.rest_lockout_minutes", config.ledger.rest_lockout_minutes, DAY_MINUTES),
        ("gateway.timeout_seconds", config.gateway.timeout_seconds, HOUR_SECONDS),
        ("overtime.poll_interval_seconds", config.overtime.poll_interval_seconds, DAY_SECONDS),
    ];
    for (field, value, max) in durations {
        match value {
            Some(0) => errors.push(ValidationError::ZeroDuration { field }),
            Some(v) if v > max => errors.push(ValidationError::DurationTooLong { field, max }),
            _ => {}
        }
    }

    if let Some(v) = config.enforcement.settle_delay_seconds
        && v > HOUR_SECONDS
    {
        errors.push(ValidationError::DurationTooLong {
            field: "enforcement.settle_delay_seconds",
            max: HOUR_SECONDS,
        });
    }

    if config.ledger.max_logins_per_day == Some(0) {
        errors.push(ValidationError::GlobalError(
            "ledger.max_logins_per_day must be at least 1".into(),
        ));
    }

    errors.extend(validate_lunch_range(config));

    let urls = [
        ("login_url", &config.gateway.login_url),
        ("punch_url", &config.gateway.punch_url),
        ("overtime_url", &config.gateway.overtime_url),
        ("overtime_status_url", &config.gateway.overtime_status_url),
    ];
    for (field, value) in urls {
        if let Some(url) = value
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: url.clone(),
            });
        }
    }

    errors
}

fn validate_lunch_range(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut parsed = [None, None];

    for (slot, value) in [
        &config.ledger.lunch_lockout_start,
        &config.ledger.lunch_lockout_end,
    ]
    .into_iter()
    .enumerate()
    {
        if let Some(value) = value {
            match parse_time(value) {
                Ok(t) => parsed[slot] = Some(t),
                Err(message) => errors.push(ValidationError::InvalidTimeFormat {
                    value: value.clone(),
                    message,
                }),
            }
        }
    }

    let start = parsed[0].unwrap_or(crate::DEFAULT_LUNCH_LOCKOUT_START);
    let end = parsed[1].unwrap_or(crate::DEFAULT_LUNCH_LOCKOUT_END);
    if errors.is_empty() && start > end {
        errors.push(ValidationError::InvertedLunchRange {
            start: format!("{:02}:{:02}", start.0, start.1),
            end: format!("{:02}:{:02}", end.0, end.1),
        });
    }

    errors
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<(u8, u8), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected HH:MM format".into());
    }

    let hour: u8 = parts[0]
        .parse()
        .map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = parts[1]
        .parse()
        .map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RawConfig {
        toml::from_str("config_version = 1").unwrap()
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("10:00").unwrap(), (10, 0));
        assert_eq!(parse_time("23:59").unwrap(), (23, 59));

        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&minimal()).is_empty());
    }

    #[test]
    fn zero_durations_rejected() {
        let mut config = minimal();
        config.shift.lunch_window_seconds = Some(0);
        config.enforcement.settle_delay_seconds = Some(0);

        let errors = validate_config(&config);
        // settle delay may legitimately be zero
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ValidationError::ZeroDuration { field: "shift.lunch_window_seconds" }
        ));
    }

    #[test]
    fn oversized_durations_rejected() {
        let mut config = minimal();
        config.shift.default_shift_seconds = Some(u64::MAX);
        config.ledger.lunch_lockout_minutes = Some(u64::MAX / 2);
        config.enforcement.settle_delay_seconds = Some(HOUR_SECONDS + 1);

        let errors = validate_config(&config);
        let fields: Vec<_> = errors
            .iter()
            .filter_map(|e| match e {
                ValidationError::DurationTooLong { field, .. } => Some(*field),
                _ => None,
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                "shift.default_shift_seconds",
                "ledger.lunch_lockout_minutes",
                "enforcement.settle_delay_seconds",
            ]
        );
    }

    #[test]
    fn full_day_bounds_are_accepted() {
        let mut config = minimal();
        config.shift.default_shift_seconds = Some(DAY_SECONDS);
        config.ledger.rest_lockout_minutes = Some(DAY_MINUTES);

        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn inverted_lunch_range_rejected() {
        let mut config = minimal();
        config.ledger.lunch_lockout_start = Some("15:00".into());
        config.ledger.lunch_lockout_end = Some("11:00".into());

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvertedLunchRange { .. })));
    }

    #[test]
    fn non_http_url_rejected() {
        let mut config = minimal();
        config.gateway.punch_url = Some("ftp://clock.example.com/punch".into());

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidUrl { field: "punch_url", .. })));
    }
}
