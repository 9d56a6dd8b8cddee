//! Workstation locking via logind

use async_trait::async_trait;
use clockwarden_host_api::{HostError, HostResult, WorkstationLocker};
use tokio::process::Command;
use tracing::{debug, info};

/// Locks the current graphical session with `loginctl lock-session`
pub struct LinuxLocker {
    program: String,
    args: Vec<String>,
}

impl LinuxLocker {
    pub fn new() -> Self {
        Self {
            program: "loginctl".into(),
            args: vec!["lock-session".into()],
        }
    }

    /// Use another lock command (e.g. a screensaver's `--lock`)
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for LinuxLocker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkstationLocker for LinuxLocker {
    async fn lock(&self) -> HostResult<()> {
        debug!(program = %self.program, args = ?self.args, "Locking workstation");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await?;

        if output.status.success() {
            info!("Workstation locked");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(HostError::LockFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )))
        }
    }
}
