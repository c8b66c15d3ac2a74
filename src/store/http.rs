use crate::config::TimesheetConfig;
use crate::error::StoreError;
use crate::models::{NewSession, Session};
use crate::store::SessionStore;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

/// REST-backed `SessionStore`
#[derive(Clone)]
pub struct HttpSessionStore {
    pub(crate) api_base_url: String,
    pub(crate) client: reqwest::Client,
    pub(crate) app_version: String,
    /// Bearer token; refreshed by whoever owns authentication
    pub(crate) access_token: Arc<tokio::sync::RwLock<Option<String>>>,
}

impl HttpSessionStore {
    pub fn new(api_base_url: &str, config: &TimesheetConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.store_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            client,
            app_version: config.app_version.clone(),
            access_token: Arc::new(tokio::sync::RwLock::new(config.access_token.clone())),
        }
    }

    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/time-sessions{}", self.api_base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("Content-Type", "application/json")
            .header("X-App-Version", &self.app_version);
        if let Some(token) = self.access_token.read().await.as_deref() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            body
        };
        warn!("[HTTP] Session store answered {}: {}", status.as_u16(), message);
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth(message),
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::CONFLICT => StoreError::Conflict(message),
            _ => StoreError::Http {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn read_session(response: Response) -> Result<Session, StoreError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn create_session(&self, new_session: &NewSession) -> Result<Session, StoreError> {
        let request = self.request(Method::POST, "").await.json(new_session);
        let response = self.send(request).await?;
        let session = Self::read_session(response).await?;
        debug!("[HTTP] Created session {}", session.id);
        Ok(session)
    }

    async fn stop_session(&self, id: &str) -> Result<Session, StoreError> {
        let request = self
            .request(Method::PUT, &format!("/{}/stop", id))
            .await
            .json(&serde_json::json!({}));
        let response = self.send(request).await?;
        let session = Self::read_session(response).await?;
        debug!("[HTTP] Stopped session {}", session.id);
        Ok(session)
    }

    async fn get_active_session(&self) -> Result<Option<Session>, StoreError> {
        let request = self.request(Method::GET, "/active").await;
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Option<Session>>(&text).map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn list_recent_sessions(&self, window_days: u32) -> Result<Vec<Session>, StoreError> {
        let request = self
            .request(Method::GET, "")
            .await
            .query(&[
                ("status", "finalizado".to_string()),
                ("windowDays", window_days.to_string()),
            ]);
        let response = self.send(request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))
    }
}
