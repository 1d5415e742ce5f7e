//! Remote Agent Client (C5)
//!
//! A session-oriented RPC surface, abstracted behind [`SessionService`] so
//! the agent-lifecycle logic below is written once against the trait and
//! exercised in tests against an in-memory double instead of a live server.

mod http;
mod scripted;

pub use http::ReqwestSessionService;
pub use scripted::{ScriptedSessionService, ScriptedStatus};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use orbit_common::RemoteAgentSettings;

use crate::error::OrchestratorError;

/// One agent's static descriptor, as resolved by an [`AgentResolver`]
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// The agent name used in `session_prompt`
    pub name: String,
}

/// Maps an agent name to a concrete descriptor; the core consumes only
/// this narrow surface (glossary: Agent Resolver).
pub trait AgentResolver: Send + Sync {
    /// Resolve `name` to a descriptor, or `None` if unknown
    fn resolve(&self, name: &str) -> Option<AgentDescriptor>;
    /// Every name this resolver knows about, for "not found" diagnostics
    fn list_names(&self) -> Vec<String>;
}

/// A resolver backed by a fixed, in-memory set of agent names
#[derive(Debug, Clone, Default)]
pub struct StaticAgentResolver {
    names: Vec<String>,
}

impl StaticAgentResolver {
    /// Build a resolver that knows exactly `names`
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl AgentResolver for StaticAgentResolver {
    fn resolve(&self, name: &str) -> Option<AgentDescriptor> {
        self.names
            .iter()
            .find(|n| n.as_str() == name)
            .map(|n| AgentDescriptor { name: n.clone() })
    }

    fn list_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// A resolver that accepts any non-empty agent name, for use when agent
/// definitions live outside the core (agent-definition discovery from
/// markdown files is out-of-scope glue per SPEC_FULL.md §10.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAgentResolver;

impl AgentResolver for PassthroughAgentResolver {
    fn resolve(&self, name: &str) -> Option<AgentDescriptor> {
        (!name.trim().is_empty()).then(|| AgentDescriptor { name: name.to_string() })
    }

    fn list_names(&self) -> Vec<String> {
        vec![]
    }
}

/// A session status as reported by `session_status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionStatus {
    Busy,
    Idle,
    Retry {
        #[serde(default)]
        next: Option<u64>,
    },
    Error {
        error: SessionStatusError,
    },
}

/// The error payload nested under an `error`-type status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusError {
    pub message: String,
}

/// One message in a session's transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub info: MessageInfo,
    pub parts: Vec<MessagePart>,
}

/// The role a message was sent under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub role: String,
}

/// One part of a message's content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// The session-oriented RPC surface the core requires (§4.5)
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a fresh session, unbound to any agent
    async fn session_create(&self, title: &str) -> Result<String, OrchestratorError>;
    /// Bind an agent and send the initial prompt
    async fn session_prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<(), OrchestratorError>;
    /// Bulk status query, keyed by session id
    async fn session_status(&self) -> Result<HashMap<String, SessionStatus>, OrchestratorError>;
    /// Fetch a session's transcript
    async fn session_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>, OrchestratorError>;
    /// Delete a session
    async fn session_delete(&self, session_id: &str) -> Result<(), OrchestratorError>;
}

/// Drives the per-agent lifecycle (resolve → create → prompt → poll →
/// cleanup) against a [`SessionService`] and [`AgentResolver`].
pub struct RemoteAgentClient {
    service: Arc<dyn SessionService>,
    resolver: Arc<dyn AgentResolver>,
    settings: RemoteAgentSettings,
}

impl RemoteAgentClient {
    /// Build a client over the given transport, resolver, and tunables
    #[must_use]
    pub fn new(
        service: Arc<dyn SessionService>,
        resolver: Arc<dyn AgentResolver>,
        settings: RemoteAgentSettings,
    ) -> Self {
        Self {
            service,
            resolver,
            settings,
        }
    }

    /// Run one agent call to completion: resolve, create, prompt, poll,
    /// cleanup. Returns the agent's result value, or an `error` field
    /// inside the returned value when the service reported a non-fatal
    /// agent-side failure (per §4.5 step 4's `error` status handling).
    pub async fn run(
        &self,
        agent: &str,
        input: &Value,
        prior_steps: &serde_json::Map<String, Value>,
    ) -> Result<Value, OrchestratorError> {
        if agent.trim().is_empty() {
            return Err(OrchestratorError::MissingField {
                component: "agent step".to_string(),
                id: String::new(),
                field: "agent".to_string(),
                available_fields: vec![],
            });
        }

        let descriptor = self.resolver.resolve(agent).ok_or_else(|| OrchestratorError::NotFound {
            what: "agent".to_string(),
            name: agent.to_string(),
            available: self.resolver.list_names(),
        })?;

        // unique per call so two steps (e.g. parallel children) invoking the
        // same agent never collide on a shared session title
        let title = format!("workflow-step::{agent}::{}", Uuid::new_v4());
        let session_id = self.service.session_create(&title).await?;

        let result = self.run_prompt_and_poll(&descriptor, &session_id, input, prior_steps).await;

        self.cleanup(&session_id).await;

        result
    }

    async fn run_prompt_and_poll(
        &self,
        descriptor: &AgentDescriptor,
        session_id: &str,
        input: &Value,
        prior_steps: &serde_json::Map<String, Value>,
    ) -> Result<Value, OrchestratorError> {
        let prompt = build_prompt(input, prior_steps);
        self.service
            .session_prompt(session_id, &descriptor.name, &prompt)
            .await?;

        self.poll_until_done(session_id).await
    }

    async fn poll_until_done(&self, session_id: &str) -> Result<Value, OrchestratorError> {
        let poll_interval = self.settings.poll_interval();
        let max_duration = self.settings.max_poll_duration();
        let max_attempts = self.settings.max_poll_attempts;
        let started = Instant::now();
        let mut consecutive_failures = 0u32;
        let mut attempts = 0u32;

        loop {
            if started.elapsed() >= max_duration {
                return Err(OrchestratorError::Timeout {
                    scope: "poll-total".to_string(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    attempts: Some(attempts),
                });
            }
            if attempts >= max_attempts {
                return Err(OrchestratorError::Timeout {
                    scope: "poll-total".to_string(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    attempts: Some(attempts),
                });
            }
            attempts += 1;

            let statuses = match self.service.session_status().await {
                Ok(s) => {
                    consecutive_failures = 0;
                    s
                }
                Err(err) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.settings.max_consecutive_poll_failures {
                        return Err(OrchestratorError::NetworkFailure {
                            consecutive_failures,
                            message: err.to_string(),
                        });
                    }
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }
            };

            let Some(status) = statuses.get(session_id) else {
                tokio::time::sleep(poll_interval).await;
                continue;
            };

            match status {
                SessionStatus::Busy => {
                    tokio::time::sleep(poll_interval).await;
                }
                SessionStatus::Retry { next } => {
                    let delay = next.map_or(poll_interval, Duration::from_millis);
                    tokio::time::sleep(delay).await;
                }
                SessionStatus::Error { error } => {
                    return Ok(serde_json::json!({ "error": error.message }));
                }
                SessionStatus::Idle => {
                    let messages = self.service.session_messages(session_id).await?;
                    return Ok(extract_assistant_result(&messages));
                }
            }
        }
    }

    async fn cleanup(&self, session_id: &str) {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.settings.session_cleanup_retry_delay_ms),
            multiplier: 2.0,
            max_interval: Duration::from_millis(
                self.settings.session_cleanup_retry_delay_ms * 2u64.pow(self.settings.session_cleanup_max_retries),
            ),
            max_elapsed_time: None,
            ..Default::default()
        };

        for attempt in 0..=self.settings.session_cleanup_max_retries {
            match self.service.session_delete(session_id).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(session_id, attempt, error = %err, "session cleanup attempt failed");
                    if attempt < self.settings.session_cleanup_max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        tracing::error!(session_id, "session cleanup exhausted retries, session leaked");
    }
}

fn build_prompt(input: &Value, prior_steps: &serde_json::Map<String, Value>) -> String {
    let input_text = match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let mut prompt = format!("## Task\n{input_text}\n\n## Context from Previous Steps\n");
    for (step_id, data) in prior_steps {
        let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
        prompt.push_str(&format!("### {step_id}\n```json\n{pretty}\n```\n"));
    }
    prompt
}

fn extract_assistant_result(messages: &[SessionMessage]) -> Value {
    let text = messages
        .iter()
        .rev()
        .find(|m| m.info.role == "assistant")
        .map(|m| {
            m.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    serde_json::from_str::<Value>(&text).unwrap_or_else(|_| serde_json::json!({ "result": text }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_agent_fails_with_available_names() {
        let service = Arc::new(ScriptedSessionService::new(vec![]));
        let resolver = Arc::new(StaticAgentResolver::new(vec!["planner".to_string()]));
        let client = RemoteAgentClient::new(service, resolver, RemoteAgentSettings::default());
        let err = client.run("ghost", &json!({}), &serde_json::Map::new()).await.unwrap_err();
        match err {
            OrchestratorError::NotFound { available, .. } => {
                assert_eq!(available, vec!["planner".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn idle_with_json_body_parses_as_value() {
        let service = Arc::new(ScriptedSessionService::new(vec![
            ScriptedStatus::Idle {
                text: r#"{"answer": 42}"#.to_string(),
            },
        ]));
        let resolver = Arc::new(StaticAgentResolver::new(vec!["planner".to_string()]));
        let client = RemoteAgentClient::new(service, resolver, RemoteAgentSettings::default());
        let result = client.run("planner", &json!("do it"), &serde_json::Map::new()).await.unwrap();
        assert_eq!(result, json!({"answer": 42}));
    }

    #[tokio::test]
    async fn error_status_is_non_exceptional() {
        let service = Arc::new(ScriptedSessionService::new(vec![ScriptedStatus::Error {
            message: "boom".to_string(),
        }]));
        let resolver = Arc::new(StaticAgentResolver::new(vec!["planner".to_string()]));
        let client = RemoteAgentClient::new(service, resolver, RemoteAgentSettings::default());
        let result = client.run("planner", &json!("do it"), &serde_json::Map::new()).await.unwrap();
        assert_eq!(result, json!({"error": "boom"}));
    }

    #[tokio::test]
    async fn three_consecutive_poll_failures_aborts() {
        let service = Arc::new(ScriptedSessionService::failing_status(5));
        let resolver = Arc::new(StaticAgentResolver::new(vec!["planner".to_string()]));
        let mut settings = RemoteAgentSettings::default();
        settings.poll_interval_ms = 1;
        let client = RemoteAgentClient::new(service, resolver, settings);
        let err = client.run("planner", &json!("do it"), &serde_json::Map::new()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NetworkFailure { consecutive_failures: 3, .. }));
    }

    #[tokio::test]
    async fn max_poll_attempts_times_out_before_wall_clock_budget() {
        let service = Arc::new(ScriptedSessionService::new(vec![ScriptedStatus::Busy]));
        let resolver = Arc::new(StaticAgentResolver::new(vec!["planner".to_string()]));
        let mut settings = RemoteAgentSettings::default();
        settings.poll_interval_ms = 1;
        settings.max_poll_attempts = 3;
        settings.max_poll_duration_ms = 60_000;
        let client = RemoteAgentClient::new(service, resolver, settings);
        let err = client.run("planner", &json!("do it"), &serde_json::Map::new()).await.unwrap_err();
        match err {
            OrchestratorError::Timeout { scope, attempts, .. } => {
                assert_eq!(scope, "poll-total");
                assert_eq!(attempts, Some(3));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
