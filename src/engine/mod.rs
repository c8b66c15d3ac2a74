use crate::clock::Clock;
use crate::config::TimesheetConfig;
use crate::error::TimerError;
use crate::models::{format_elapsed, Category, Session};
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::error;
mod core;
pub mod elapsed;
mod ticker;

pub use elapsed::{ElapsedClock, FallbackTimer};
use ticker::Ticker;

/// Timer Controller: strict FSM over the single active timer.
/// Owns the state, the in-flight guard and the tick task.
pub struct TimerController {
    pub(crate) shared: Arc<Shared>,
    pub(crate) store: Arc<dyn SessionStore>,
    /// At most one tick task; replaced on arm, dropped on every exit from a running variant
    pub(crate) ticker: Mutex<Option<Ticker>>,
    pub(crate) store_timeout: Duration,
    pub(crate) tick_interval: Duration,
}

/// State read by the tick task. Only the controller transitions it.
pub(crate) struct Shared {
    pub(crate) state: Mutex<TimerState>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Set while start/stop/resume awaits the store
    pub(crate) busy: AtomicBool,
    pub(crate) last_error: Mutex<Option<String>>,
    pub(crate) updates: watch::Sender<TimerSnapshot>,
}

/// Timer state. Exactly one variant holds; the clock driving the display lives
/// inside the running variant, so two tick sources cannot coexist.
#[derive(Debug, Clone)]
pub enum TimerState {
    NoTimer,
    /// Backed by a stored `ativo` session; elapsed from its server-issued start
    PersistedTimer {
        session: Session,
        clock: ElapsedClock,
    },
    /// Store unavailable at start: tracked locally, never persisted
    LocalTimer {
        started_at: DateTime<Utc>,
        description: String,
        category: Category,
        counter: FallbackTimer,
    },
}

impl TimerState {
    pub fn is_active(&self) -> bool {
        !matches!(self, TimerState::NoTimer)
    }

    pub fn mode(&self) -> TimerMode {
        match self {
            TimerState::NoTimer => TimerMode::Idle,
            TimerState::PersistedTimer { .. } => TimerMode::Persisted,
            TimerState::LocalTimer { .. } => TimerMode::Local,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Idle,
    Persisted,
    Local,
}

/// View state published on every transition and tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    /// Degraded mode: the running timer is local and will not be saved
    pub offline: bool,
    pub busy: bool,
    pub session_id: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub display: String,
    pub last_error: Option<String>,
}

impl TimerSnapshot {
    fn idle() -> Self {
        Self {
            mode: TimerMode::Idle,
            offline: false,
            busy: false,
            session_id: None,
            description: None,
            category: None,
            started_at: None,
            elapsed_seconds: 0,
            display: format_elapsed(0),
            last_error: None,
        }
    }

    /// Start control enabled
    pub fn can_start(&self) -> bool {
        self.mode == TimerMode::Idle && !self.busy
    }

    /// Stop control enabled
    pub fn can_stop(&self) -> bool {
        self.mode != TimerMode::Idle && !self.busy
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Persisted(Session),
    /// Store failed or timed out; running in offline mode
    Local,
    /// A timer is already active or another call is in flight
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    Finalized(Session),
    /// Local timer dropped; its elapsed time was never persisted
    Discarded { elapsed_seconds: u64 },
    /// The store had already finalized the session (e.g. an earlier stop whose
    /// answer timed out); the timer is cleared without a second stop.
    AlreadyStopped { session_id: String },
    Ignored,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, TimerState>, TimerError> {
        self.state
            .lock()
            .map_err(|e| TimerError::Internal(format!("Mutex poisoned: {}", e)))
    }

    pub(crate) fn set_last_error(&self, message: Option<String>) {
        match self.last_error.lock() {
            Ok(mut last) => *last = message,
            Err(e) => error!("[TIMER] last_error mutex poisoned: {}", e),
        }
    }

    /// Advance the active clock once and publish. No-op without a timer.
    pub(crate) fn tick(&self) {
        let now = self.clock.now();
        {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(e) => {
                    error!("[TIMER] Tick skipped, mutex poisoned: {}", e);
                    return;
                }
            };
            match &mut *state {
                TimerState::NoTimer => return,
                TimerState::PersistedTimer { clock, .. } => {
                    clock.tick(now);
                }
                TimerState::LocalTimer { counter, .. } => {
                    counter.tick();
                }
            }
        }
        self.publish();
    }

    pub(crate) fn snapshot(&self) -> TimerSnapshot {
        let mut snapshot = match self.state.lock() {
            Ok(state) => match &*state {
                TimerState::NoTimer => TimerSnapshot::idle(),
                TimerState::PersistedTimer { session, clock } => TimerSnapshot {
                    mode: TimerMode::Persisted,
                    offline: false,
                    busy: false,
                    session_id: Some(session.id.clone()),
                    description: Some(session.description.clone()),
                    category: Some(session.category),
                    started_at: Some(session.start),
                    elapsed_seconds: clock.elapsed_seconds(),
                    display: format_elapsed(clock.elapsed_seconds()),
                    last_error: None,
                },
                TimerState::LocalTimer {
                    started_at,
                    description,
                    category,
                    counter,
                } => TimerSnapshot {
                    mode: TimerMode::Local,
                    offline: true,
                    busy: false,
                    session_id: None,
                    description: Some(description.clone()),
                    category: Some(*category),
                    started_at: Some(*started_at),
                    elapsed_seconds: counter.elapsed_seconds(),
                    display: format_elapsed(counter.elapsed_seconds()),
                    last_error: None,
                },
            },
            Err(e) => {
                error!("[TIMER] Snapshot from poisoned state: {}", e);
                TimerSnapshot::idle()
            }
        };
        snapshot.busy = self.busy.load(Ordering::Acquire);
        snapshot.last_error = self.last_error.lock().ok().and_then(|e| e.clone());
        snapshot
    }

    pub(crate) fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }
}

impl TimerController {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: &TimesheetConfig) -> Self {
        let (updates, _) = watch::channel(TimerSnapshot::idle());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TimerState::NoTimer),
                clock,
                busy: AtomicBool::new(false),
                last_error: Mutex::new(None),
                updates,
            }),
            store,
            ticker: Mutex::new(None),
            store_timeout: config.store_timeout(),
            tick_interval: config.tick_interval(),
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.shared.snapshot()
    }

    /// Receives a snapshot on every transition and tick
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn state(&self) -> Result<TimerState, TimerError> {
        Ok(self.shared.lock_state()?.clone())
    }

    /// Advance the active clock once (the tick task calls the same path)
    pub fn tick(&self) {
        self.shared.tick();
    }

    #[cfg(test)]
    pub(crate) fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .map(|t| t.as_ref().map_or(false, |t| !t.is_finished()))
            .unwrap_or(false)
    }
}
