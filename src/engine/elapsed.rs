use chrono::{DateTime, Utc};
use std::time::Duration;

/// Display clock for a persisted session.
/// Each tick recomputes `now - start` from the two instants, so delayed or
/// skipped ticks never lose time.
#[derive(Debug, Clone)]
pub struct ElapsedClock {
    start: DateTime<Utc>,
    elapsed_seconds: u64,
}

impl ElapsedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            elapsed_seconds: 0,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Never decreases: a wall clock stepping backwards holds the last value.
    pub fn tick(&mut self, now: DateTime<Utc>) -> u64 {
        let secs = (now - self.start).num_seconds().max(0) as u64;
        self.elapsed_seconds = self.elapsed_seconds.max(secs);
        self.elapsed_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }
}

/// Local counting timer for offline mode. There is no authoritative start to
/// reconcile against, so elapsed is `ticks * step`, where the step is the
/// period of the tick task driving it.
#[derive(Debug, Clone)]
pub struct FallbackTimer {
    step_millis: u64,
    elapsed_millis: u64,
}

impl FallbackTimer {
    pub fn new(step: Duration) -> Self {
        Self {
            step_millis: (step.as_millis() as u64).max(1),
            elapsed_millis: 0,
        }
    }

    /// Whole seconds counted so far
    pub fn tick(&mut self) -> u64 {
        self.elapsed_millis = self.elapsed_millis.saturating_add(self.step_millis);
        self.elapsed_seconds()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_millis / 1000
    }
}

impl Default for FallbackTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
