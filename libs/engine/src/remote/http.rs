//! Production `SessionService` over HTTP
//!
//! Built on `reqwest` with a bounded client timeout and no automatic
//! redirects, the same `reqwest::Client::builder()` pattern this
//! codebase's JWKS fetcher uses for its own outbound calls.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use serde_json::json;

use crate::error::OrchestratorError;

use super::{SessionMessage, SessionService, SessionStatus};

/// `SessionService` backed by a real session-oriented HTTP service
pub struct ReqwestSessionService {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestSessionService {
    /// Build a client against `base_url` with a 30s request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, OrchestratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(Policy::none())
            .build()
            .map_err(to_network_error)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn to_network_error(err: reqwest::Error) -> OrchestratorError {
    OrchestratorError::NetworkFailure {
        consecutive_failures: 1,
        message: err.to_string(),
    }
}

#[async_trait]
impl SessionService for ReqwestSessionService {
    async fn session_create(&self, title: &str) -> Result<String, OrchestratorError> {
        #[derive(serde::Deserialize)]
        struct CreateResponse {
            id: String,
        }
        let response = self
            .client
            .post(self.url("/session"))
            .json(&json!({ "title": title }))
            .send()
            .await
            .map_err(to_network_error)?
            .error_for_status()
            .map_err(to_network_error)?
            .json::<CreateResponse>()
            .await
            .map_err(to_network_error)?;
        Ok(response.id)
    }

    async fn session_prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<(), OrchestratorError> {
        self.client
            .post(self.url(&format!("/session/{session_id}/prompt")))
            .json(&json!({
                "agent": agent,
                "parts": [{ "type": "text", "text": text }],
            }))
            .send()
            .await
            .map_err(to_network_error)?
            .error_for_status()
            .map_err(to_network_error)?;
        Ok(())
    }

    async fn session_status(&self) -> Result<HashMap<String, SessionStatus>, OrchestratorError> {
        let statuses = self
            .client
            .get(self.url("/session/status"))
            .send()
            .await
            .map_err(to_network_error)?
            .error_for_status()
            .map_err(to_network_error)?
            .json::<HashMap<String, SessionStatus>>()
            .await
            .map_err(to_network_error)?;
        Ok(statuses)
    }

    async fn session_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>, OrchestratorError> {
        let messages = self
            .client
            .get(self.url(&format!("/session/{session_id}/messages")))
            .send()
            .await
            .map_err(to_network_error)?
            .error_for_status()
            .map_err(to_network_error)?
            .json::<Vec<SessionMessage>>()
            .await
            .map_err(to_network_error)?;
        Ok(messages)
    }

    async fn session_delete(&self, session_id: &str) -> Result<(), OrchestratorError> {
        self.client
            .delete(self.url(&format!("/session/{session_id}")))
            .send()
            .await
            .map_err(to_network_error)?
            .error_for_status()
            .map_err(to_network_error)?;
        Ok(())
    }
}
