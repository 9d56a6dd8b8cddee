//! Plaintext diagnostic logs (`timestamp: message`)

use chrono::{DateTime, Local};
use clockwarden_util::format_timestamp;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const ENFORCER_LOG_FILE: &str = "enforcer_debug_log.txt";
pub const SESSION_LOG_FILE: &str = "session_debug_log.txt";
pub const OVERTIME_LOG_FILE: &str = "overtime_debug_log.txt";

/// Write-only diagnostic log. Writing never fails outward.
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn in_dir(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self::new(dir.as_ref().join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `timestamp: message`
    pub fn write(&self, at: &DateTime<Local>, message: &str) {
        let line = format!("{}: {}\n", format_timestamp(at), message);
        if let Err(e) = self.append(&line) {
            warn!(path = %self.path.display(), error = %e, "Failed to write diagnostic log");
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        // A poisoned lock only means another writer panicked mid-line
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}
