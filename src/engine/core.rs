use crate::engine::ticker::Ticker;
use crate::engine::{
    ElapsedClock, FallbackTimer, StartOutcome, StopOutcome, TimerController, TimerState,
};
use crate::error::{StoreError, TimerError};
use crate::models::{Category, NewSession, Session};
use crate::store::with_timeout;
use scopeguard::guard;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which source a running timer belongs to, captured before awaiting the store
enum Running {
    Persisted(String),
    Local,
}

impl TimerController {
    /// Claims the in-flight flag. Returns false when another start/stop is pending.
    fn try_begin(&self) -> bool {
        let claimed = self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if claimed {
            self.shared.publish();
        }
        claimed
    }

    fn arm_ticker(&self) -> Result<(), TimerError> {
        let mut slot = self
            .ticker
            .lock()
            .map_err(|e| TimerError::Internal(format!("Mutex poisoned: {}", e)))?;
        // Abort any previous task before arming the new one
        drop(slot.take());
        *slot = Some(Ticker::arm(Arc::downgrade(&self.shared), self.tick_interval));
        Ok(())
    }

    fn release_ticker(&self) {
        match self.ticker.lock() {
            Ok(mut slot) => drop(slot.take()),
            Err(poisoned) => drop(poisoned.into_inner().take()),
        }
    }

    /// Enter a running variant and arm the tick task.
    fn enter(&self, next: TimerState) -> Result<(), TimerError> {
        let mut state = self.shared.lock_state()?;
        *state = next;
        drop(state);
        self.shared.set_last_error(None);
        self.arm_ticker()
    }

    /// Leave any running variant. The tick task is released on every path.
    fn leave(&self) -> Result<TimerState, TimerError> {
        let _release = guard((), |_| self.release_ticker());
        let mut state = self.shared.lock_state()?;
        Ok(std::mem::replace(&mut *state, TimerState::NoTimer))
    }

    fn persisted_state(&self, session: Session) -> TimerState {
        let mut clock = ElapsedClock::new(session.start);
        clock.tick(self.shared.clock.now());
        TimerState::PersistedTimer { session, clock }
    }

    /// Transition: NoTimer → PersistedTimer, or NoTimer → LocalTimer when the store fails.
    /// Store failures never reach the caller; only invalid arguments do, and only
    /// when no timer is active (a start while running is always `Ignored`).
    pub async fn start(
        &self,
        description: &str,
        category: Category,
    ) -> Result<StartOutcome, TimerError> {
        if !self.try_begin() {
            debug!("[FSM] Ignored start: another timer operation is in flight");
            return Ok(StartOutcome::Ignored);
        }
        let _busy = guard((), |_| {
            self.shared.busy.store(false, Ordering::Release);
            self.shared.publish();
        });

        if self.shared.lock_state()?.is_active() {
            warn!("[FSM] Ignored start: a timer is already active");
            return Ok(StartOutcome::Ignored);
        }
        let new_session = NewSession::new(description, category)?;

        match with_timeout(self.store_timeout, self.store.create_session(&new_session)).await {
            Ok(session) => {
                info!(
                    "[TIMER] Started session {} ({}: {})",
                    session.id, session.category, session.description
                );
                self.enter(self.persisted_state(session.clone()))?;
                Ok(StartOutcome::Persisted(session))
            }
            Err(e) => {
                warn!(
                    "[TIMER] Session store unavailable ({}). Running local timer, it will not be saved",
                    e
                );
                self.enter(TimerState::LocalTimer {
                    started_at: self.shared.clock.now(),
                    description: new_session.description,
                    category: new_session.category,
                    counter: FallbackTimer::new(self.tick_interval),
                })?;
                Ok(StartOutcome::Local)
            }
        }
    }

    /// Transition: PersistedTimer → NoTimer via `stop_session`, LocalTimer → NoTimer by discarding.
    /// A failed persisted stop keeps the timer running and returns `StopFailed`.
    pub async fn stop(&self) -> Result<StopOutcome, TimerError> {
        if !self.try_begin() {
            debug!("[FSM] Ignored stop: another timer operation is in flight");
            return Ok(StopOutcome::Ignored);
        }
        let _busy = guard((), |_| {
            self.shared.busy.store(false, Ordering::Release);
            self.shared.publish();
        });

        let running = match &*self.shared.lock_state()? {
            TimerState::NoTimer => None,
            TimerState::PersistedTimer { session, .. } => Some(Running::Persisted(session.id.clone())),
            TimerState::LocalTimer { .. } => Some(Running::Local),
        };

        match running {
            None => {
                debug!("[FSM] Ignored stop: no active timer");
                Ok(StopOutcome::Ignored)
            }
            Some(Running::Local) => {
                let elapsed_seconds = match self.leave()? {
                    TimerState::LocalTimer { counter, .. } => counter.elapsed_seconds(),
                    _ => 0,
                };
                self.shared.set_last_error(None);
                warn!(
                    "[TIMER] Local timer stopped; {}s were tracked offline and are not saved",
                    elapsed_seconds
                );
                Ok(StopOutcome::Discarded { elapsed_seconds })
            }
            Some(Running::Persisted(id)) => {
                match with_timeout(self.store_timeout, self.store.stop_session(&id)).await {
                    Ok(session) => {
                        self.leave()?;
                        self.shared.set_last_error(None);
                        info!(
                            "[TIMER] Stopped session {} ({} min)",
                            session.id,
                            session.duration_minutes.unwrap_or(0)
                        );
                        Ok(StopOutcome::Finalized(session))
                    }
                    Err(e) => {
                        if matches!(e, StoreError::Conflict(_) | StoreError::NotFound(_))
                            && self.closed_on_store(&id).await
                        {
                            self.leave()?;
                            self.shared.set_last_error(None);
                            warn!(
                                "[TIMER] Session {} was already closed on the store ({}). Timer cleared",
                                id, e
                            );
                            return Ok(StopOutcome::AlreadyStopped { session_id: id });
                        }
                        error!(
                            "[TIMER] Failed to stop session {}: {}. Timer keeps running",
                            id, e
                        );
                        self.shared
                            .set_last_error(Some(format!("Failed to stop timer: {}", e)));
                        Err(TimerError::StopFailed {
                            session_id: id,
                            source: e,
                        })
                    }
                }
            }
        }
    }

    /// True when the store no longer reports `id` as the running session.
    /// An unreachable store counts as "still running".
    async fn closed_on_store(&self, id: &str) -> bool {
        match with_timeout(self.store_timeout, self.store.get_active_session()).await {
            Ok(Some(active)) => active.id != id || !active.is_active(),
            Ok(None) => true,
            Err(e) => {
                warn!("[TIMER] Could not confirm state of session {}: {}", id, e);
                false
            }
        }
    }

    /// On load: rebuild PersistedTimer from the store's active session, using its `start`.
    /// A store failure leaves NoTimer; there is no local fallback on load.
    pub async fn resume_active(&self) -> Result<Option<Session>, TimerError> {
        if !self.try_begin() {
            debug!("[FSM] Ignored resume: another timer operation is in flight");
            return Ok(None);
        }
        let _busy = guard((), |_| {
            self.shared.busy.store(false, Ordering::Release);
            self.shared.publish();
        });

        if self.shared.lock_state()?.is_active() {
            debug!("[FSM] Ignored resume: a timer is already active");
            return Ok(None);
        }

        match with_timeout(self.store_timeout, self.store.get_active_session()).await {
            Ok(Some(session)) if session.is_active() => {
                info!(
                    "[TIMER] Resumed active session {} started at {}",
                    session.id, session.start
                );
                self.enter(self.persisted_state(session.clone()))?;
                Ok(Some(session))
            }
            Ok(Some(session)) => {
                warn!(
                    "[TIMER] Store returned session {} as active but its status is {}",
                    session.id,
                    session.status.as_str()
                );
                Ok(None)
            }
            Ok(None) => {
                debug!("[TIMER] No active session to resume");
                Ok(None)
            }
            Err(e) => {
                warn!("[TIMER] Could not check for an active session: {}", e);
                Ok(None)
            }
        }
    }

    /// Release the tick task without touching the store (view unmount).
    pub fn shutdown(&self) {
        self.release_ticker();
        match self.shared.lock_state() {
            Ok(state) if state.is_active() => {
                info!(
                    "[TIMER] Shutting down with a {:?} timer running",
                    state.mode()
                );
            }
            Ok(_) => {}
            Err(e) => error!("[TIMER] Shutdown: {}", e),
        }
    }
}
