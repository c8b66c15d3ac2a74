use crate::engine::Shared;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Owned periodic tick task. Dropping the handle aborts the task, so the
/// interval cannot outlive the running state that armed it.
pub(crate) struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Must be called inside a tokio runtime.
    pub(crate) fn arm(shared: Weak<Shared>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            // Skip: missed ticks are not replayed. The persisted clock recomputes from instants.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match shared.upgrade() {
                    Some(shared) => shared.tick(),
                    None => break,
                }
            }
            debug!("[TIMER] Tick task exited (controller dropped)");
        });
        Self { handle }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
