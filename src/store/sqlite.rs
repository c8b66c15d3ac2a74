use crate::clock::Clock;
use crate::error::StoreError;
use crate::models::{duration_minutes, Category, NewSession, Session, SessionStatus};
use crate::store::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Error::InvalidParameterName;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Log IO-related DB errors for easier diagnosis (disk full, permission denied).
/// Does not change error propagation.
fn log_io_error_if_any(context: &str, e: &rusqlite::Error) {
    use rusqlite::ffi::ErrorCode;
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = e {
        match ffi_err.code {
            ErrorCode::DiskFull => {
                error!("[DB] {}: Disk full. Free space on drive.", context);
            }
            ErrorCode::ReadOnly | ErrorCode::CannotOpen => {
                error!(
                    "[DB] {}: Permission denied or read-only. Check the database path is writable.",
                    context
                );
            }
            ErrorCode::SystemIoFailure => {
                error!("[DB] {}: I/O error. Check disk and permissions.", context);
            }
            _ => {}
        }
    }
}

/// Raw row as read from `time_sessions`, converted to `Session` outside the rusqlite closure
type SessionRow = (i64, String, String, String, String, i64, Option<i64>, Option<i64>);

const SESSION_COLUMNS: &str = "id, user_id, description, category, status, started_at_ms, ended_at_ms, duration_minutes";

/// Local SQLite-backed `SessionStore`, scoped to one user
pub struct SqliteSessionStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
    user_id: String,
    clock: Arc<dyn Clock>,
}

impl SqliteSessionStore {
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| {
            StoreError::Db(format!(
                "Database mutex poisoned: {}. Restart the application to recover.",
                e
            ))
        })
    }

    pub fn new(db_path: &str, user_id: &str, clock: Arc<dyn Clock>) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;

        let integrity: String = conn
            .query_row("PRAGMA integrity_check", [], |r| r.get(0))
            .map_err(|e| InvalidParameterName(format!("Integrity check failed: {}", e)))?;
        if integrity.to_lowercase() != "ok" {
            return Err(InvalidParameterName(format!(
                "Database corruption detected: {}",
                integrity
            )));
        }

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| {
                warn!(
                    "[DB] Failed to enable WAL mode: {}. Continuing with default journal mode.",
                    e
                );
            })
            .ok();
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            user_id: user_id.to_string(),
            clock,
        };
        store.run_migrations()?;
        info!("[DB] Session store opened at {} for user {}", db_path, user_id);
        Ok(store)
    }

    /// Current schema version (PRAGMA user_version). Bump when adding migrations.
    const SCHEMA_VERSION: i32 = 1;

    fn run_migrations(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().map_err(|e| {
            InvalidParameterName(format!("Database mutex poisoned: {}", e))
        })?;
        let current: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

        if current < 1 {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS time_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at_ms INTEGER NOT NULL,
                ended_at_ms INTEGER,
                duration_minutes INTEGER
            )",
                [],
            )?;
            // At most one running session per user
            conn.execute(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_time_sessions_one_active
                 ON time_sessions(user_id) WHERE status = 'ativo'",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_time_sessions_started
                 ON time_sessions(user_id, started_at_ms)",
                [],
            )?;
        }

        conn.pragma_update(None, "user_version", Self::SCHEMA_VERSION)?;
        Ok(())
    }

    fn row_to_session(row: SessionRow) -> Result<Session, StoreError> {
        let (id, user_id, description, category, status, started_at_ms, ended_at_ms, duration) =
            row;
        let category: Category = category
            .parse()
            .map_err(|e| StoreError::Parse(format!("row {}: {}", id, e)))?;
        let status: SessionStatus = status
            .parse()
            .map_err(|e| StoreError::Parse(format!("row {}: {}", id, e)))?;
        let start = millis_to_utc(started_at_ms)?;
        let end = ended_at_ms.map(millis_to_utc).transpose()?;

        Ok(Session {
            id: id.to_string(),
            user_id: Some(user_id),
            description,
            category,
            status,
            start,
            end,
            duration_minutes: duration,
        })
    }

    fn read_row(row: &rusqlite::Row<'_>) -> SqliteResult<SessionRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn load_session(conn: &Connection, id: i64) -> Result<Option<Session>, StoreError> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM time_sessions WHERE id = ?1", SESSION_COLUMNS),
                params![id],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::row_to_session).transpose()
    }

    fn create_blocking(&self, new_session: &NewSession) -> Result<Session, StoreError> {
        let conn = self.lock_conn()?;

        let active: Option<i64> = conn
            .query_row(
                "SELECT id FROM time_sessions WHERE user_id = ?1 AND status = 'ativo' LIMIT 1",
                params![self.user_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(active_id) = active {
            warn!(
                "[DB] Rejecting create: user {} already has active session {}",
                self.user_id, active_id
            );
            return Err(StoreError::Conflict(format!(
                "User already has an active session ({})",
                active_id
            )));
        }

        let started_at_ms = self.clock.now().timestamp_millis();
        conn.execute(
            "INSERT INTO time_sessions (user_id, description, category, status, started_at_ms)
             VALUES (?1, ?2, ?3, 'ativo', ?4)",
            params![
                self.user_id,
                new_session.description,
                new_session.category.as_str(),
                started_at_ms
            ],
        )
        .map_err(|e| {
            log_io_error_if_any("create_session", &e);
            e
        })?;
        let id = conn.last_insert_rowid();
        debug!("[DB] Created session {} for user {}", id, self.user_id);

        Self::load_session(&conn, id)?
            .ok_or_else(|| StoreError::Db(format!("Session {} vanished after insert", id)))
    }

    fn stop_blocking(&self, id: &str) -> Result<Session, StoreError> {
        let row_id: i64 = id
            .parse()
            .map_err(|_| StoreError::NotFound(id.to_string()))?;
        let conn = self.lock_conn()?;

        let current = Self::load_session(&conn, row_id)?
            .filter(|s| s.user_id.as_deref() == Some(self.user_id.as_str()))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !current.is_active() {
            return Err(StoreError::Conflict(format!(
                "Session {} is already stopped",
                id
            )));
        }

        let end = self.clock.now().max(current.start);
        let minutes = duration_minutes(current.start, end);

        conn.execute("BEGIN IMMEDIATE TRANSACTION", []).map_err(|e| {
            log_io_error_if_any("stop_session begin", &e);
            error!("[DB] Failed to begin transaction: {}", e);
            e
        })?;

        let result = conn.execute(
            "UPDATE time_sessions
             SET status = 'finalizado', ended_at_ms = ?1, duration_minutes = ?2
             WHERE id = ?3 AND status = 'ativo'",
            params![end.timestamp_millis(), minutes, row_id],
        );

        match result {
            Ok(1) => {
                conn.execute("COMMIT", []).map_err(|e| {
                    log_io_error_if_any("stop_session commit", &e);
                    error!("[DB] Failed to commit transaction: {}", e);
                    let _ = conn.execute("ROLLBACK", []);
                    e
                })?;
            }
            Ok(_) => {
                let _ = conn.execute("ROLLBACK", []);
                return Err(StoreError::Conflict(format!(
                    "Session {} is already stopped",
                    id
                )));
            }
            Err(e) => {
                log_io_error_if_any("stop_session", &e);
                error!("[DB] Failed to stop session {}: {}. Rolling back.", id, e);
                let _ = conn.execute("ROLLBACK", []);
                return Err(e.into());
            }
        }

        debug!("[DB] Stopped session {} ({} min)", id, minutes);
        Self::load_session(&conn, row_id)?
            .ok_or_else(|| StoreError::Db(format!("Session {} vanished after stop", id)))
    }

    fn active_blocking(&self) -> Result<Option<Session>, StoreError> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM time_sessions WHERE user_id = ?1 AND status = 'ativo' LIMIT 1",
                    SESSION_COLUMNS
                ),
                params![self.user_id],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::row_to_session).transpose()
    }

    fn recent_blocking(&self, window_days: u32) -> Result<Vec<Session>, StoreError> {
        let cutoff = self.clock.now() - chrono::Duration::days(i64::from(window_days));
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM time_sessions
             WHERE user_id = ?1 AND status = 'finalizado' AND started_at_ms >= ?2
             ORDER BY started_at_ms DESC",
            SESSION_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![self.user_id, cutoff.timestamp_millis()],
            Self::read_row,
        )?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(Self::row_to_session(row?)?);
        }
        Ok(sessions)
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Parse(format!("Invalid timestamp: {}", ms)))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, new_session: &NewSession) -> Result<Session, StoreError> {
        self.create_blocking(new_session)
    }

    async fn stop_session(&self, id: &str) -> Result<Session, StoreError> {
        self.stop_blocking(id)
    }

    async fn get_active_session(&self) -> Result<Option<Session>, StoreError> {
        self.active_blocking()
    }

    async fn list_recent_sessions(&self, window_days: u32) -> Result<Vec<Session>, StoreError> {
        self.recent_blocking(window_days)
    }
}
