//! HTTP transport for the planner backend.
//!
//! - `PATCH {base}/sessions/{id}` with a [`SessionPatch`] body
//! - `PATCH {base}/tasks/{id}` with a [`TaskPatch`] body
//! - `POST {base}/coach/encouragement` returning `{"message": "..."}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{Backend, EncouragementService, SessionService, TaskService};
use crate::encouragement::EncouragementRequest;
use crate::error::{ConfigError, RemoteError};
use crate::session::{SessionPatch, TaskPatch};

#[derive(Debug, Deserialize)]
struct EncouragementResponse {
    message: String,
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpBackend {
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if `base_url` is not an absolute
    /// http(s) URL or the client cannot be built.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let mut base = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "backend.base_url".into(),
            message: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "backend.base_url".into(),
                message: format!("unsupported scheme '{}'", base.scheme()),
            });
        }
        // Url::join drops the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "backend".into(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, service: &'static str, path: &str) -> Result<Url, RemoteError> {
        self.base.join(path).map_err(|e| RemoteError::Unavailable {
            service,
            message: e.to_string(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, service: &'static str, request: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| RemoteError::Transport { service, source })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                service,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl SessionService for HttpBackend {
    async fn update_session(&self, session_id: i64, patch: &SessionPatch) -> Result<(), RemoteError> {
        let url = self.endpoint("sessions", &format!("sessions/{session_id}"))?;
        debug!(%url, "PATCH session");
        self.send("sessions", self.client.patch(url).json(patch)).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskService for HttpBackend {
    async fn update_task(&self, task_id: i64, patch: &TaskPatch) -> Result<(), RemoteError> {
        let url = self.endpoint("tasks", &format!("tasks/{task_id}"))?;
        debug!(%url, "PATCH task");
        self.send("tasks", self.client.patch(url).json(patch)).await?;
        Ok(())
    }
}

#[async_trait]
impl EncouragementService for HttpBackend {
    async fn fetch_encouragement(&self, request: &EncouragementRequest) -> Result<String, RemoteError> {
        let url = self.endpoint("coach", "coach/encouragement")?;
        let resp = self.send("coach", self.client.post(url).json(request)).await?;
        let body: EncouragementResponse = resp.json().await.map_err(|e| RemoteError::Decode {
            service: "coach",
            message: e.to_string(),
        })?;
        Ok(body.message)
    }
}

impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }
}
