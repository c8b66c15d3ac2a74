use crate::engine::{StartOutcome, StopOutcome};
use crate::error::TimerError;
use crate::models::{format_minutes, Category};
use crate::view::{render_stats, TimesheetView};
use chrono::Local;
use std::str::FromStr;

pub const HELP: &str = "\
Commands:
  start <category> <description>   start a timer
  stop                             stop the running timer
  status                           show the running timer
  stats                            today / last 7 days totals
  history                          finalized sessions in the stats window
  categories                       list categories
  help                             this text
  quit                             leave (a saved timer keeps running)";

/// One line typed into the timer console
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start {
        category: Category,
        description: String,
    },
    Stop,
    Status,
    Stats,
    History,
    Categories,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = TimerError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_lowercase().as_str() {
            "start" => {
                let (category, description) = match rest.split_once(char::is_whitespace) {
                    Some((category, description)) => (category, description.trim()),
                    None => (rest, ""),
                };
                let category: Category = category.parse()?;
                if description.is_empty() {
                    return Err(TimerError::InvalidArgument(
                        "Description is required to start a timer".to_string(),
                    ));
                }
                Ok(Command::Start {
                    category,
                    description: description.to_string(),
                })
            }
            "stop" => Ok(Command::Stop),
            "status" | "" => Ok(Command::Status),
            "stats" => Ok(Command::Stats),
            "history" => Ok(Command::History),
            "categories" => Ok(Command::Categories),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(TimerError::InvalidArgument(format!(
                "Unknown command: {} (type `help`)",
                other
            ))),
        }
    }
}

/// Run one command against the view and return the text to show.
pub async fn execute(view: &TimesheetView, command: Command) -> Result<String, TimerError> {
    match command {
        Command::Start {
            category,
            description,
        } => {
            let message = match view.start(&description, category).await? {
                StartOutcome::Persisted(session) => {
                    format!("Timer started (session {})", session.id)
                }
                StartOutcome::Local => {
                    "Backend unavailable: timer started in offline mode and will NOT be saved"
                        .to_string()
                }
                StartOutcome::Ignored => "A timer is already running".to_string(),
            };
            Ok(format!("{}\n{}", message, view.render_status()))
        }
        Command::Stop => match view.stop().await? {
            StopOutcome::Finalized(session) => Ok(format!(
                "Timer stopped: {} recorded\n{}",
                format_minutes(session.duration_minutes.unwrap_or(0)),
                render_stats(&view.stats())
            )),
            StopOutcome::Discarded { elapsed_seconds } => Ok(format!(
                "Offline timer stopped; {} were not saved",
                crate::models::format_elapsed(elapsed_seconds)
            )),
            StopOutcome::AlreadyStopped { session_id } => Ok(format!(
                "Session {} had already been stopped on the server\n{}",
                session_id,
                render_stats(&view.stats())
            )),
            StopOutcome::Ignored => Ok("No timer running".to_string()),
        },
        Command::Status => Ok(view.render_status()),
        Command::Stats => Ok(render_stats(&view.refresh_stats().await)),
        Command::History => {
            let history = view.history();
            if history.is_empty() {
                return Ok("No finalized sessions".to_string());
            }
            let lines: Vec<String> = history
                .iter()
                .map(|s| {
                    format!(
                        "{}  {:>7}  [{}] {}",
                        s.start.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                        format_minutes(s.duration_minutes.unwrap_or(0)),
                        s.category.label(),
                        s.description
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }
        Command::Categories => Ok(Category::ALL
            .iter()
            .map(|c| format!("{:<15} {}", c.as_str(), c.label()))
            .collect::<Vec<_>>()
            .join("\n")),
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok(String::new()),
    }
}

pub fn render_error(error: &TimerError) -> String {
    if let TimerError::StopFailed { .. } = error {
        format!("Error: {} (the timer is still running; try `stop` again)", error)
    } else {
        format!("Error: {}", error)
    }
}
