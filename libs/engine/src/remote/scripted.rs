//! Deterministic in-memory `SessionService` test double
//!
//! Scripts a fixed sequence of statuses for a single session so the
//! client's poll loop can be exercised without a live HTTP server.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::OrchestratorError;

use super::{MessageInfo, MessagePart, SessionMessage, SessionService, SessionStatus, SessionStatusError};

/// One scripted step the double will report on successive `session_status` calls
pub enum ScriptedStatus {
    Busy,
    Idle { text: String },
    Error { message: String },
}

/// A `SessionService` that replays a fixed script of statuses
pub struct ScriptedSessionService {
    script: Mutex<Vec<ScriptedStatus>>,
    fail_status_calls: Mutex<u32>,
}

impl ScriptedSessionService {
    /// Build a double that reports each of `script`'s entries in order,
    /// one per `session_status` call, then stays on the last entry.
    #[must_use]
    pub fn new(script: Vec<ScriptedStatus>) -> Self {
        Self {
            script: Mutex::new(script),
            fail_status_calls: Mutex::new(0),
        }
    }

    /// Build a double whose `session_status` always errors, `count` times
    #[must_use]
    pub fn failing_status(count: u32) -> Self {
        Self {
            script: Mutex::new(vec![]),
            fail_status_calls: Mutex::new(count),
        }
    }
}

#[async_trait]
impl SessionService for ScriptedSessionService {
    async fn session_create(&self, _title: &str) -> Result<String, OrchestratorError> {
        Ok("scripted-session".to_string())
    }

    async fn session_prompt(&self, _session_id: &str, _agent: &str, _text: &str) -> Result<(), OrchestratorError> {
        Ok(())
    }

    async fn session_status(&self) -> Result<HashMap<String, SessionStatus>, OrchestratorError> {
        {
            let mut remaining = self.fail_status_calls.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(OrchestratorError::NetworkFailure {
                    consecutive_failures: 1,
                    message: "scripted failure".to_string(),
                });
            }
        }

        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.remove(0)
        } else if let Some(only) = script.first() {
            match only {
                ScriptedStatus::Busy => ScriptedStatus::Busy,
                ScriptedStatus::Idle { text } => ScriptedStatus::Idle { text: text.clone() },
                ScriptedStatus::Error { message } => ScriptedStatus::Error {
                    message: message.clone(),
                },
            }
        } else {
            ScriptedStatus::Idle { text: "{}".to_string() }
        };

        let status = match next {
            ScriptedStatus::Busy => SessionStatus::Busy,
            ScriptedStatus::Idle { .. } => SessionStatus::Idle,
            ScriptedStatus::Error { message } => SessionStatus::Error {
                error: SessionStatusError { message },
            },
        };

        let mut map = HashMap::new();
        map.insert("scripted-session".to_string(), status);
        Ok(map)
    }

    async fn session_messages(&self, _session_id: &str) -> Result<Vec<SessionMessage>, OrchestratorError> {
        let script = self.script.lock().unwrap();
        let text = script
            .first()
            .map(|s| match s {
                ScriptedStatus::Idle { text } => text.clone(),
                _ => String::new(),
            })
            .unwrap_or_default();

        Ok(vec![SessionMessage {
            info: MessageInfo {
                role: "assistant".to_string(),
            },
            parts: vec![MessagePart {
                kind: "text".to_string(),
                text: Some(text),
            }],
        }])
    }

    async fn session_delete(&self, _session_id: &str) -> Result<(), OrchestratorError> {
        Ok(())
    }
}
