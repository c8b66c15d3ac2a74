use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
mod clock;
pub mod commands;
mod config;
mod engine;
mod error;
mod models;
mod stats;
pub mod store;
mod view;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::TimesheetConfig;
pub use crate::engine::{
    ElapsedClock, FallbackTimer, StartOutcome, StopOutcome, TimerController, TimerMode,
    TimerSnapshot, TimerState,
};
pub use crate::error::{StoreError, TimerError};
pub use crate::models::{
    duration_minutes, format_elapsed, format_minutes, Category, NewSession, Session,
    SessionStatus, TimesheetStats, WindowTotals,
};
pub use crate::stats::StatsAggregator;
pub use crate::store::{HttpSessionStore, SessionStore, SqliteSessionStore};
pub use crate::view::TimesheetView;
use crate::commands::{execute, render_error, Command, HELP};


/// Pick the backend: REST when an API URL is configured, local SQLite otherwise.
fn open_store(config: &TimesheetConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn SessionStore>> {
    match &config.api_base_url {
        Some(url) => {
            info!("[STORE] Using REST session store at {}", url);
            Ok(Arc::new(HttpSessionStore::new(url, config)))
        }
        None => {
            info!("[STORE] Using local session store at {}", config.db_path);
            let store = SqliteSessionStore::new(&config.db_path, &config.user_id, clock)
                .map_err(|e| anyhow::anyhow!("Failed to open session database: {}", e))?;
            Ok(Arc::new(store))
        }
    }
}

/// Console host for the timer view: load, then read commands until `quit`, EOF or Ctrl-C.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Default to info when RUST_LOG is unset; logs go to stderr, console output to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = TimesheetConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = open_store(&config, clock.clone())?;
    let view = TimesheetView::new(store, clock, &config);

    match view.load().await {
        Ok(snapshot) => {
            if snapshot.mode != TimerMode::Idle {
                info!("[VIEW] Resumed running timer");
            }
        }
        Err(e) => warn!("[VIEW] Load failed: {}", e),
    }
    println!("{}", HELP);
    println!("{}", view.render_status());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                info!("[VIEW] Interrupted");
                break;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("[VIEW] Failed to read input: {}", e);
                break;
            }
        };

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", render_error(&e));
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        match execute(&view, command).await {
            Ok(output) => println!("{}", output),
            Err(e) => println!("{}", render_error(&e)),
        }
    }

    let snapshot = view.snapshot();
    match snapshot.mode {
        TimerMode::Persisted => info!("[VIEW] Saved timer keeps running; it resumes on next start"),
        TimerMode::Local => warn!(
            "[VIEW] Exiting with an offline timer running; {} of work is lost",
            snapshot.display
        ),
        TimerMode::Idle => {}
    }
    view.shutdown();
    Ok(())
}
