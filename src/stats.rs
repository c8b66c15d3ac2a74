use crate::models::{format_minutes, Session, SessionStatus, TimesheetStats, WindowTotals};
use chrono::{DateTime, TimeZone, Utc};

/// Today / rolling-week totals over finalized sessions.
pub struct StatsAggregator;

impl StatsAggregator {
    pub const WEEK_DAYS: i64 = 7;

    /// "Today" is `now`'s calendar date in its own time zone; "week" is the
    /// rolling 7 days ending at `now`. Running sessions are ignored.
    pub fn compute<Tz: TimeZone>(sessions: &[Session], now: &DateTime<Tz>) -> TimesheetStats {
        let zone = now.timezone();
        let today = now.date_naive();
        let now_utc = now.with_timezone(&Utc);
        let week_start = now_utc - chrono::Duration::days(Self::WEEK_DAYS);

        let mut stats = TimesheetStats::default();
        for session in sessions {
            let minutes = match (session.status, session.duration_minutes) {
                (SessionStatus::Finalizado, Some(minutes)) => minutes.max(0),
                _ => continue,
            };

            if session.start.with_timezone(&zone).date_naive() == today {
                add(&mut stats.today, minutes);
            }
            if session.start > week_start && session.start <= now_utc {
                add(&mut stats.week, minutes);
            }
        }

        stats.daily_average_minutes = Self::daily_average(stats.week.total_minutes);
        stats.daily_average_display = format_minutes(stats.daily_average_minutes);
        stats
    }

    /// `week_total / 7`, rounded to the nearest minute
    pub fn daily_average(week_total_minutes: i64) -> i64 {
        if week_total_minutes <= 0 {
            return 0;
        }
        (week_total_minutes as f64 / Self::WEEK_DAYS as f64).round() as i64
    }
}

fn add(totals: &mut WindowTotals, minutes: i64) {
    totals.total_minutes = totals.total_minutes.saturating_add(minutes);
    totals.total_registrations += 1;
}
