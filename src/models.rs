use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TimerError;

/// Lifecycle status of a session as stored by the backend.
/// `Finalizado` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Ativo,
    Finalizado,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Ativo => "ativo",
            SessionStatus::Finalizado => "finalizado",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = TimerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ativo" => Ok(SessionStatus::Ativo),
            "finalizado" => Ok(SessionStatus::Finalizado),
            other => Err(TimerError::InvalidArgument(format!(
                "Unknown session status: {}",
                other
            ))),
        }
    }
}

/// Work category attached to a session at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Processual,
    Consultivo,
    Audiencia,
    Reuniao,
    Pesquisa,
    Administrativo,
    Outro,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Processual,
        Category::Consultivo,
        Category::Audiencia,
        Category::Reuniao,
        Category::Pesquisa,
        Category::Administrativo,
        Category::Outro,
    ];

    /// Wire identifier (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Processual => "processual",
            Category::Consultivo => "consultivo",
            Category::Audiencia => "audiencia",
            Category::Reuniao => "reuniao",
            Category::Pesquisa => "pesquisa",
            Category::Administrativo => "administrativo",
            Category::Outro => "outro",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Processual => "Processual",
            Category::Consultivo => "Consultivo",
            Category::Audiencia => "Audiência",
            Category::Reuniao => "Reunião",
            Category::Pesquisa => "Pesquisa",
            Category::Administrativo => "Administrativo",
            Category::Outro => "Outro",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TimerError;

    /// Case-insensitive; accepts the accented labels too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(TimerError::InvalidArgument(
                "Category is required".to_string(),
            ));
        }
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted || c.label().to_lowercase() == wanted)
            .ok_or_else(|| TimerError::InvalidArgument(format!("Unknown category: {}", s.trim())))
    }
}

/// One recorded or in-progress unit of timed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub description: String,
    pub category: Category,
    pub status: SessionStatus,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Ativo
    }
}

/// Create payload for `SessionStore::create_session`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub description: String,
    pub category: Category,
}

impl NewSession {
    /// Trims the description and rejects it when empty. Runs before any store call.
    pub fn new(description: &str, category: Category) -> Result<Self, TimerError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TimerError::InvalidArgument(
                "Description is required to start a timer".to_string(),
            ));
        }
        Ok(Self {
            description: description.to_string(),
            category,
        })
    }
}

/// Totals for one stats window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowTotals {
    pub total_minutes: i64,
    pub total_registrations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetStats {
    pub today: WindowTotals,
    pub week: WindowTotals,
    pub daily_average_minutes: i64,
    pub daily_average_display: String,
}

/// `round((end - start) / 60s)`, half away from zero. Negative spans count as zero.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds().max(0);
    (millis + 30_000) / 60_000
}

/// `HH:MM:SS`; hours keep growing past 99.
pub fn format_elapsed(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// `"2h 5m"`, `"45m"`, `"0m"`
pub fn format_minutes(total_minutes: i64) -> String {
    let total_minutes = total_minutes.max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
