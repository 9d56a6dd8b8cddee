//! One-shot cancellable deadline timers

use chrono::{DateTime, Local};
use clockwarden_util::until;
use tokio::task::JoinHandle;

/// A pending one-shot timer task.
///
/// Dropping the deadline aborts the task. Each deadline carries the
/// generation it was armed with so a callback that already woke up can
/// tell whether it has since been replaced.
#[derive(Debug)]
pub struct Deadline {
    at: DateTime<Local>,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Deadline {
    /// Run `on_fire` once `at` is reached, measured from `now`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(at: DateTime<Local>, now: DateTime<Local>, generation: u64, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = until(at, now);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });

        Self {
            at,
            generation,
            handle: Some(handle),
        }
    }

    pub fn at(&self) -> DateTime<Local> {
        self.at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Consume a deadline from inside its own callback without aborting it
    pub fn fired(mut self) {
        self.handle.take();
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
