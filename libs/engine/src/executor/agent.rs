//! Agent step executor (C4.1)

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use serde_json::json;

use crate::config::WorkflowStep;
use crate::context::WorkflowContext;
use crate::error::OrchestratorError;
use crate::remote::RemoteAgentClient;

use super::{expr_scope, StepExecutor};

/// Delegates to the Remote Agent Client (C5)
pub struct AgentExecutor {
    client: Arc<RemoteAgentClient>,
}

impl AgentExecutor {
    /// Build an executor over a shared remote agent client
    #[must_use]
    pub fn new(client: Arc<RemoteAgentClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StepExecutor for AgentExecutor {
    async fn execute_once(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> Result<serde_json::Value, OrchestratorError> {
        let WorkflowStep::Agent { common, agent } = step else {
            return Err(OrchestratorError::InvalidValue {
                where_: format!("step '{}'", step.id()),
                what: "executor kind mismatch".to_string(),
                why: "AgentExecutor invoked on a non-agent step".to_string(),
            });
        };

        if agent.trim().is_empty() {
            return Err(OrchestratorError::MissingField {
                component: "agent step".to_string(),
                id: common.id.clone(),
                field: "agent".to_string(),
                available_fields: vec!["agent".to_string()],
            });
        }

        let prior_steps = context.build_context_object();
        let mut scope = expr_scope(context);
        if let Some(input_ref) = &common.input {
            if let Some(value) = context.get_value(input_ref) {
                scope.insert(input_ref.clone(), value);
            }
        }

        self.client
            .run(agent, &context.input, &prior_steps)
            .await
            .map_err(|err| OrchestratorError::AgentError(format!(
                "step '{}' agent '{agent}': {err} (input keys: {})",
                common.id,
                scope.keys().cloned().collect::<Vec<_>>().join(", "),
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepCommon;
    use crate::remote::{ScriptedSessionService, ScriptedStatus, StaticAgentResolver};
    use orbit_common::RemoteAgentSettings;
    use serde_json::json as j;

    fn step(agent: &str) -> WorkflowStep {
        WorkflowStep::Agent {
            common: StepCommon {
                id: "plan".into(),
                next: None,
                on_error: None,
                input: None,
                max_retries: 0,
                retry_delay_ms: 1,
                timeout_ms: 5_000,
            },
            agent: agent.to_string(),
        }
    }

    #[tokio::test]
    async fn delegates_to_remote_client_and_returns_parsed_result() {
        let service = Arc::new(ScriptedSessionService::new(vec![ScriptedStatus::Idle {
            text: r#"{"plan": "go"}"#.to_string(),
        }]));
        let resolver = Arc::new(StaticAgentResolver::new(vec!["planner".to_string()]));
        let client = Arc::new(RemoteAgentClient::new(service, resolver, RemoteAgentSettings::default()));
        let executor = AgentExecutor::new(client);
        let ctx = WorkflowContext::create("wf", j!({"topic": "rust"}));
        let result = executor.execute_once(&step("planner"), &ctx).await.unwrap();
        assert_eq!(result, json!({"plan": "go"}));
    }

    #[tokio::test]
    async fn empty_agent_name_is_missing_field() {
        let service = Arc::new(ScriptedSessionService::new(vec![]));
        let resolver = Arc::new(StaticAgentResolver::new(vec![]));
        let client = Arc::new(RemoteAgentClient::new(service, resolver, RemoteAgentSettings::default()));
        let executor = AgentExecutor::new(client);
        let ctx = WorkflowContext::create("wf", j!(null));
        let err = executor.execute_once(&step(""), &ctx).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingField { .. }));
    }
}
