//! Config validation CLI tool
//!
//! Validates a clockwarden configuration file and reports any errors.

use clockwarden_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a clockwarden configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match clockwarden_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", clockwarden_config::CURRENT_CONFIG_VERSION);
            println!("  Pre-login grace: {}", format_duration(policy.shift.pre_login_grace));
            println!("  Lunch window: {}", format_duration(policy.shift.lunch_window));
            println!("  Shift length: {}", format_duration(policy.shift.default_shift_length));
            println!("  Max logins per day: {}", policy.ledger.max_logins_per_day);
            println!(
                "  Lunch range: {:02}:{:02}-{:02}:{:02} ({} lockout, otherwise {})",
                policy.ledger.lunch_range.start.hour,
                policy.ledger.lunch_range.start.minute,
                policy.ledger.lunch_range.end.hour,
                policy.ledger.lunch_range.end.minute,
                format_duration(policy.ledger.lunch_lockout),
                format_duration(policy.ledger.rest_lockout),
            );
            println!("  Punch endpoint: {}", policy.gateway.punch_url);
            println!("  API key variable: {}", policy.gateway.api_key_env);

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                clockwarden_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                clockwarden_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                clockwarden_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                clockwarden_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        clockwarden_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
