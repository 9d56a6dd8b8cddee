//! Session state machine
//!
//! Idle -> PreLoginWait -> OnShift -> Idle, with three independent deadlines:
//! pre-login grace, lunch window and forced shift end. Every timer and shift
//! mutation happens under one gate per enforcer. Timer callbacks take the
//! gate, check that their deadline is still the armed one, mutate, release
//! the gate and only then warn and start the forced log-off.

use chrono::{DateTime, Local};
use clockwarden_api::{ShiftPhase, ShiftSnapshot};
use clockwarden_config::ShiftPolicy;
use clockwarden_store::DiagnosticLog;
use clockwarden_util::{LocalUser, SessionId, checked_deadline, format_duration};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{CoreEvent, Deadline, EnforcementExecutor, LockMode};

pub const LUNCH_WARNING: &str =
    "Lunch window exceeded. Forcing clock out for lunch and locking workstation.";
pub const SHIFT_LIMIT_WARNING: &str = "Shift limit reached. Locking workstation.";

/// Largest overtime grant accepted for one day
pub const MAX_OVERTIME_HOURS: f64 = 24.0;

/// Warning shown when the pre-login grace runs out
pub fn pre_login_warning(grace: Duration) -> String {
    let secs = grace.as_secs();
    let within = match secs / 60 {
        1 if secs % 60 == 0 => "1 minute".to_string(),
        m if m > 0 && secs % 60 == 0 => format!("{} minutes", m),
        _ => format_duration(grace),
    };
    format!("You did not clock in within {}. Locking workstation.", within)
}

/// The three deadlines a session owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    PreLogin,
    Lunch,
    ForcedLogout,
}

impl TimerKind {
    fn warning(&self, policy: &ShiftPolicy) -> String {
        match self {
            TimerKind::PreLogin => pre_login_warning(policy.pre_login_grace),
            TimerKind::Lunch => LUNCH_WARNING.to_string(),
            TimerKind::ForcedLogout => SHIFT_LIMIT_WARNING.to_string(),
        }
    }

    fn debug_note(&self) -> &'static str {
        match self {
            TimerKind::PreLogin => "Pre-login grace expired. Locking workstation.",
            TimerKind::Lunch => "Lunch timer expired. Locking workstation.",
            TimerKind::ForcedLogout => "Forced shift timer expired. Locking workstation.",
        }
    }
}

/// Shift state guarded by the gate
#[derive(Debug)]
struct ShiftState {
    shift_start: Option<DateTime<Local>>,
    allowed_shift_length: Duration,
    pre_login: Option<Deadline>,
    lunch: Option<Deadline>,
    forced_logout: Option<Deadline>,
    disposed: bool,
}

impl ShiftState {
    fn new(default_shift_length: Duration) -> Self {
        Self {
            shift_start: None,
            allowed_shift_length: default_shift_length,
            pre_login: None,
            lunch: None,
            forced_logout: None,
            disposed: false,
        }
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<Deadline> {
        match kind {
            TimerKind::PreLogin => &mut self.pre_login,
            TimerKind::Lunch => &mut self.lunch,
            TimerKind::ForcedLogout => &mut self.forced_logout,
        }
    }

    fn reset_shift(&mut self, default_shift_length: Duration) {
        self.forced_logout = None;
        self.lunch = None;
        self.shift_start = None;
        self.allowed_shift_length = default_shift_length;
    }

    fn phase(&self) -> ShiftPhase {
        if self.shift_start.is_some() {
            ShiftPhase::OnShift
        } else if self.pre_login.is_some() {
            ShiftPhase::PreLoginWait
        } else {
            ShiftPhase::Idle
        }
    }

    fn snapshot(&self) -> ShiftSnapshot {
        ShiftSnapshot {
            phase: self.phase(),
            shift_start: self.shift_start,
            allowed_shift_length: self.allowed_shift_length,
            pre_login_deadline: self.pre_login.as_ref().map(Deadline::at),
            lunch_deadline: self.lunch.as_ref().map(Deadline::at),
            forced_logout_deadline: self.forced_logout.as_ref().map(Deadline::at),
        }
    }
}

struct Inner {
    session_id: SessionId,
    local_user: LocalUser,
    policy: ShiftPolicy,
    gate: Mutex<ShiftState>,
    next_generation: AtomicU64,
    executor: EnforcementExecutor,
    events: mpsc::UnboundedSender<CoreEvent>,
    log: Arc<DiagnosticLog>,
}

/// Shift deadline enforcement for one local desktop session.
///
/// Cheap to clone; clones share the same state. Methods that arm timers
/// must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct SessionEnforcer {
    inner: Arc<Inner>,
}

impl SessionEnforcer {
    pub fn new(
        local_user: LocalUser,
        policy: ShiftPolicy,
        executor: EnforcementExecutor,
        events: mpsc::UnboundedSender<CoreEvent>,
        log: Arc<DiagnosticLog>,
    ) -> Self {
        let session_id = SessionId::new();
        info!(
            session_id = %session_id,
            local_user = %local_user,
            pre_login_grace = %format_duration(policy.pre_login_grace),
            lunch_window = %format_duration(policy.lunch_window),
            shift_length = %format_duration(policy.default_shift_length),
            "Session enforcer created"
        );

        Self {
            inner: Arc::new(Inner {
                session_id,
                local_user,
                gate: Mutex::new(ShiftState::new(policy.default_shift_length)),
                policy,
                next_generation: AtomicU64::new(1),
                executor,
                events,
                log,
            }),
        }
    }

    pub fn local_user(&self) -> &LocalUser {
        &self.inner.local_user
    }

    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    /// Start (or restart) the pre-login grace countdown. Clears any open shift.
    pub fn start_pre_login_countdown(&self, now: DateTime<Local>) {
        self.mutate("start_pre_login_countdown", |inner, state| {
            state.reset_shift(inner.policy.default_shift_length);
            let grace = inner.policy.pre_login_grace;
            state.pre_login = arm_after(inner, TimerKind::PreLogin, now, grace, now);
        });
    }

    pub fn cancel_pre_login_countdown(&self) {
        self.mutate("cancel_pre_login_countdown", |_, state| {
            state.pre_login = None;
        });
    }

    /// A punch-in was registered remotely
    pub fn on_punch_in(&self, now: DateTime<Local>) {
        self.mutate("on_punch_in", |inner, state| {
            state.pre_login = None;

            state.lunch = arm_after(inner, TimerKind::Lunch, now, inner.policy.lunch_window, now);

            ensure_forced_logout(inner, state, now);
        });
    }

    /// A punch-out was registered remotely
    pub fn on_punch_out(&self, end_of_day: bool, now: DateTime<Local>) {
        self.mutate("on_punch_out", |inner, state| {
            state.lunch = None;
            if end_of_day {
                state.reset_shift(inner.policy.default_shift_length);
            }
            debug!(end_of_day, at = %now, "Punch-out applied");
        });
    }

    /// Overtime was approved; the shift limit becomes the default length plus `hours`.
    /// Hours outside `0..=MAX_OVERTIME_HOURS` leave the shift untouched.
    pub fn on_overtime_approved(&self, hours: f64, now: DateTime<Local>) {
        let Some(extra) = overtime_extension(hours) else {
            warn!(hours, "Ignoring invalid overtime hours");
            return;
        };

        let forced_logout_at = self
            .mutate("on_overtime_approved", |inner, state| {
                let length = inner.policy.default_shift_length.checked_add(extra)?;
                checked_deadline(state.shift_start.unwrap_or(now), length)?;

                state.allowed_shift_length = length;
                if state.shift_start.is_some() {
                    ensure_forced_logout(inner, state, now);
                }
                Some(state.forced_logout.as_ref().map(Deadline::at))
            })
            .flatten();

        if let Some(forced_logout_at) = forced_logout_at {
            self.write_debug(&format!("Overtime approved: {}h", hours));
            let _ = self.inner.events.send(CoreEvent::ShiftExtended {
                local_user: self.inner.local_user.clone(),
                hours,
                forced_logout_at,
            });
        }
    }

    /// Cancel every timer. Idempotent; callbacks already in flight become no-ops.
    pub fn shutdown(&self) {
        let mut state = self.state();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.pre_login = None;
        state.lunch = None;
        state.forced_logout = None;
        info!(session_id = %self.inner.session_id, "Session enforcer shut down");
    }

    pub fn snapshot(&self) -> ShiftSnapshot {
        self.state().snapshot()
    }

    fn state(&self) -> MutexGuard<'_, ShiftState> {
        self.inner.state()
    }

    /// Apply `f` under the gate, then publish the new snapshot.
    /// Returns `None` without calling `f` once shut down.
    fn mutate<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Arc<Inner>, &mut ShiftState) -> R,
    ) -> Option<R> {
        let (result, snapshot) = {
            let mut state = self.state();
            if state.disposed {
                debug!(operation, "Session enforcer shut down, ignoring");
                return None;
            }
            let result = f(&self.inner, &mut state);
            (result, state.snapshot())
        };

        debug!(operation, phase = ?snapshot.phase, "Shift state updated");
        self.inner.publish(snapshot);
        Some(result)
    }

    fn write_debug(&self, message: &str) {
        self.inner.write_debug(message);
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ShiftState> {
        // Poisoning only means a callback panicked mid-update; the state itself stays usable
        self.gate.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish(&self, snapshot: ShiftSnapshot) {
        let _ = self.events.send(CoreEvent::ShiftChanged {
            local_user: self.local_user.clone(),
            snapshot,
        });
    }

    fn write_debug(&self, message: &str) {
        self.log.write(
            &clockwarden_util::now(),
            &format!("[{}] {}", self.local_user, message),
        );
    }

    fn on_timer(&self, kind: TimerKind, generation: u64) {
        let snapshot = {
            let mut state = self.state();
            if state.disposed {
                return;
            }

            let Some(deadline) = state.slot(kind).take_if(|d| d.generation() == generation)
            else {
                debug!(timer = ?kind, generation, "Stale timer callback ignored");
                return;
            };
            deadline.fired();

            if kind == TimerKind::ForcedLogout {
                state.reset_shift(self.policy.default_shift_length);
            }
            state.snapshot()
        };

        warn!(local_user = %self.local_user, timer = ?kind, "Shift deadline missed");
        let _ = self.events.send(CoreEvent::WarningIssued {
            local_user: self.local_user.clone(),
            message: kind.warning(&self.policy),
        });
        self.write_debug(kind.debug_note());

        self.executor
            .force_log_off(&self.local_user, LockMode::AfterSettle);
        self.publish(snapshot);
    }
}

/// Arm `kind` at `start + after`; an unrepresentable deadline leaves it unarmed
fn arm_after(
    inner: &Arc<Inner>,
    kind: TimerKind,
    start: DateTime<Local>,
    after: Duration,
    now: DateTime<Local>,
) -> Option<Deadline> {
    match checked_deadline(start, after) {
        Some(at) => Some(arm(inner, kind, at, now)),
        None => {
            warn!(timer = ?kind, after = ?after, "Deadline out of range, timer not armed");
            None
        }
    }
}

fn arm(inner: &Arc<Inner>, kind: TimerKind, at: DateTime<Local>, now: DateTime<Local>) -> Deadline {
    let generation = inner.next_generation.fetch_add(1, Ordering::SeqCst);
    let weak: Weak<Inner> = Arc::downgrade(inner);

    debug!(timer = ?kind, generation, at = %at, "Timer armed");
    Deadline::arm(at, now, generation, move || {
        if let Some(inner) = weak.upgrade() {
            inner.on_timer(kind, generation);
        }
    })
}

/// Start today's shift clock if needed and (re-)arm the forced logout at
/// `shift_start + allowed_shift_length`; an overdue deadline fires at once.
fn ensure_forced_logout(inner: &Arc<Inner>, state: &mut ShiftState, now: DateTime<Local>) {
    let shift_start = match state.shift_start {
        Some(start) if start.date_naive() == now.date_naive() => start,
        _ => {
            state.shift_start = Some(now);
            now
        }
    };

    state.forced_logout = arm_after(
        inner,
        TimerKind::ForcedLogout,
        shift_start,
        state.allowed_shift_length,
        now,
    );
}

/// Shift extension for an overtime grant of `hours`, if the grant is in range
pub fn overtime_extension(hours: f64) -> Option<Duration> {
    if !(0.0..=MAX_OVERTIME_HOURS).contains(&hours) {
        return None;
    }
    Duration::try_from_secs_f64(hours * 3600.0).ok()
}
