use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Runtime configuration (store selection, timeouts, tick period)
#[derive(Debug, Clone)]
pub struct TimesheetConfig {
    /// REST backend; when absent the local SQLite store is used
    pub api_base_url: Option<String>,
    pub access_token: Option<String>,
    pub db_path: String,
    pub user_id: String,
    /// Bound on every store call. Expiry counts as a store failure.
    pub store_timeout_secs: u64,
    /// Period of the tick task; the offline counter advances by the same amount per tick
    pub tick_interval_ms: u64,
    /// History fetched for the stats panel; never less than the 7-day week
    pub stats_window_days: u32,
    /// Sent in X-App-Version header
    pub app_version: String,
}

impl Default for TimesheetConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            access_token: None,
            db_path: "timesheet.db".to_string(),
            user_id: "local".to_string(),
            store_timeout_secs: 10,
            tick_interval_ms: 1000,
            stats_window_days: 7,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TimesheetConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_base_url: non_empty("TIMESHEET_API_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string()),
            access_token: non_empty("TIMESHEET_ACCESS_TOKEN"),
            db_path: non_empty("TIMESHEET_DB_PATH").unwrap_or(defaults.db_path),
            user_id: non_empty("TIMESHEET_USER_ID").unwrap_or(defaults.user_id),
            store_timeout_secs: parse_or(
                "TIMESHEET_STORE_TIMEOUT_SECS",
                non_empty("TIMESHEET_STORE_TIMEOUT_SECS"),
                defaults.store_timeout_secs,
            ),
            tick_interval_ms: parse_or(
                "TIMESHEET_TICK_MS",
                non_empty("TIMESHEET_TICK_MS"),
                defaults.tick_interval_ms,
            ),
            stats_window_days: parse_or(
                "TIMESHEET_STATS_WINDOW_DAYS",
                non_empty("TIMESHEET_STATS_WINDOW_DAYS"),
                defaults.stats_window_days,
            ),
            app_version: defaults.app_version,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(
                "[CONFIG] Invalid value for {}: {:?}, using default {}",
                key, value, default
            );
            default
        }),
        None => default,
    }
}
