//! Default paths for clockwarden components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/clockwarden/clockwarden.sock` or `/tmp/clockwarden-$USER/clockwarden.sock`
//! - Data (ledger, credential cache, audit db): `$XDG_DATA_HOME/clockwarden` or `~/.local/share/clockwarden`
//! - Logs (plaintext diagnostics): `$XDG_STATE_HOME/clockwarden` or `~/.local/state/clockwarden`
//! - Config: `$XDG_CONFIG_HOME/clockwarden/config.toml` or `~/.config/clockwarden/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const CLOCKWARDEN_SOCKET_ENV: &str = "CLOCKWARDEN_SOCKET";

/// Environment variable for overriding the data directory
pub const CLOCKWARDEN_DATA_DIR_ENV: &str = "CLOCKWARDEN_DATA_DIR";

const SOCKET_FILENAME: &str = "clockwarden.sock";

const APP_DIR: &str = "clockwarden";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$CLOCKWARDEN_SOCKET`
/// 2. `$XDG_RUNTIME_DIR/clockwarden/clockwarden.sock`
/// 3. `/tmp/clockwarden-$USER/clockwarden.sock`
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(CLOCKWARDEN_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path ignoring `$CLOCKWARDEN_SOCKET` (clap checks the env var itself)
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$CLOCKWARDEN_DATA_DIR`
/// 2. `$XDG_DATA_HOME/clockwarden`
/// 3. `~/.local/share/clockwarden`
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(CLOCKWARDEN_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Data directory ignoring `$CLOCKWARDEN_DATA_DIR`
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share").join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default directory for the plaintext diagnostic logs.
pub fn default_log_dir() -> PathBuf {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("state").join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("logs")
}

/// Get the per-user configuration directory
pub fn default_config_dir() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config").join(APP_DIR);
    }

    PathBuf::from("/etc").join(APP_DIR)
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}
