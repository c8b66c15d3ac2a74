use crate::error::StoreError;
use crate::models::{NewSession, Session};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub mod http;
pub mod sqlite;

pub use http::HttpSessionStore;
pub use sqlite::SqliteSessionStore;

/// Persistence port for timer sessions. Owned by the backend; the timer only consumes it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates an `ativo` session. The store assigns `id` and `start`.
    async fn create_session(&self, new_session: &NewSession) -> Result<Session, StoreError>;

    /// Finalizes the session and computes `duration_minutes`.
    /// Not guaranteed idempotent: call once per session.
    async fn stop_session(&self, id: &str) -> Result<Session, StoreError>;

    async fn get_active_session(&self) -> Result<Option<Session>, StoreError>;

    /// Finalized sessions started within the last `window_days` days.
    async fn list_recent_sessions(&self, window_days: u32) -> Result<Vec<Session>, StoreError>;
}

/// Bounds a store call; expiry becomes `StoreError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
