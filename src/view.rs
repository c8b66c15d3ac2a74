use crate::clock::Clock;
use crate::config::TimesheetConfig;
use crate::engine::{StartOutcome, StopOutcome, TimerController, TimerMode, TimerSnapshot};
use crate::error::TimerError;
use crate::models::{format_minutes, Category, Session, TimesheetStats};
use crate::stats::StatsAggregator;
use crate::store::{with_timeout, SessionStore};
use chrono::Local;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The timer view: resumes on load, drives start/stop through the controller
/// and keeps the stats panel and recent history current.
pub struct TimesheetView {
    controller: TimerController,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    stats: Mutex<TimesheetStats>,
    history: Mutex<Vec<Session>>,
    stats_window_days: u32,
    store_timeout: Duration,
}

impl TimesheetView {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: &TimesheetConfig) -> Self {
        let controller = TimerController::new(store.clone(), clock.clone(), config);
        let mut stats = TimesheetStats::default();
        stats.daily_average_display = format_minutes(0);
        Self {
            controller,
            store,
            clock,
            stats: Mutex::new(stats),
            history: Mutex::new(Vec::new()),
            // Never narrower than the rolling week the aggregator reports
            stats_window_days: config
                .stats_window_days
                .max(StatsAggregator::WEEK_DAYS as u32),
            store_timeout: config.store_timeout(),
        }
    }

    pub fn controller(&self) -> &TimerController {
        &self.controller
    }

    /// Resume a running persisted session, then load stats.
    pub async fn load(&self) -> Result<TimerSnapshot, TimerError> {
        self.controller.resume_active().await?;
        self.refresh_stats().await;
        Ok(self.controller.snapshot())
    }

    pub async fn start(&self, description: &str, category: Category) -> Result<StartOutcome, TimerError> {
        let outcome = self.controller.start(description, category).await?;
        if outcome == StartOutcome::Local {
            warn!("[VIEW] Offline mode: timer is running locally and will not be saved");
        }
        Ok(outcome)
    }

    /// Stop the running timer. Stats refresh only when a stored session was closed.
    pub async fn stop(&self) -> Result<StopOutcome, TimerError> {
        let outcome = self.controller.stop().await?;
        if matches!(
            outcome,
            StopOutcome::Finalized(_) | StopOutcome::AlreadyStopped { .. }
        ) {
            self.refresh_stats().await;
        }
        Ok(outcome)
    }

    /// Reload finalized sessions. On failure the previous stats stay on screen.
    pub async fn refresh_stats(&self) -> TimesheetStats {
        match with_timeout(
            self.store_timeout,
            self.store.list_recent_sessions(self.stats_window_days),
        )
        .await
        {
            Ok(sessions) => {
                let now = self.clock.now().with_timezone(&Local);
                let stats = StatsAggregator::compute(&sessions, &now);
                debug!(
                    "[STATS] {} sessions loaded, today {} min, week {} min",
                    sessions.len(),
                    stats.today.total_minutes,
                    stats.week.total_minutes
                );
                if let Ok(mut current) = self.stats.lock() {
                    *current = stats;
                }
                if let Ok(mut history) = self.history.lock() {
                    *history = sessions;
                }
            }
            Err(e) => {
                warn!("[STATS] Failed to refresh stats, keeping previous values: {}", e);
            }
        }
        self.stats()
    }

    pub fn stats(&self) -> TimesheetStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn history(&self) -> Vec<Session> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.controller.subscribe()
    }

    /// Status line for the timer panel
    pub fn render_status(&self) -> String {
        render_snapshot(&self.controller.snapshot())
    }

    /// Unmount: release the tick task
    pub fn shutdown(&self) {
        info!("[VIEW] Timer view closing");
        self.controller.shutdown();
    }
}

pub fn render_snapshot(snapshot: &TimerSnapshot) -> String {
    let mut line = match snapshot.mode {
        TimerMode::Idle => "No timer running".to_string(),
        TimerMode::Persisted | TimerMode::Local => format!(
            "{} {} [{}] {}",
            if snapshot.mode == TimerMode::Local { "○" } else { "●" },
            snapshot.display,
            snapshot.category.map(|c| c.label()).unwrap_or("-"),
            snapshot.description.as_deref().unwrap_or("")
        ),
    };
    if snapshot.offline {
        line.push_str("  (offline: local timer, not saved)");
    }
    if snapshot.busy {
        line.push_str("  (working...)");
    }
    if let Some(error) = &snapshot.last_error {
        line.push_str(&format!("\n! {} (retry with `stop`)", error));
    }
    line
}

pub fn render_stats(stats: &TimesheetStats) -> String {
    format!(
        "Today: {} in {} entries\nLast 7 days: {} in {} entries\nDaily average: {}",
        format_minutes(stats.today.total_minutes),
        stats.today.total_registrations,
        format_minutes(stats.week.total_minutes),
        stats.week.total_registrations,
        stats.daily_average_display
    )
}
