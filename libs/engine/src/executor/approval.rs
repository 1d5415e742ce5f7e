//! Approval step executor (C4.4)

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::WorkflowStep;
use crate::context::{StepResult, WorkflowContext};
use crate::error::OrchestratorError;
use crate::ui::{ApprovalDecision, UiSurface};

use super::StepExecutor;

/// Asks the UI surface for a human decision
pub struct ApprovalExecutor {
    ui: Arc<dyn UiSurface>,
}

impl ApprovalExecutor {
    /// Build an executor over a shared UI surface
    #[must_use]
    pub fn new(ui: Arc<dyn UiSurface>) -> Self {
        Self { ui }
    }
}

#[async_trait]
impl StepExecutor for ApprovalExecutor {
    async fn execute_once(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> Result<serde_json::Value, OrchestratorError> {
        let WorkflowStep::Approval {
            common,
            message,
            approval_timeout_ms,
            ..
        } = step
        else {
            return Err(OrchestratorError::InvalidValue {
                where_: format!("step '{}'", step.id()),
                what: "executor kind mismatch".to_string(),
                why: "ApprovalExecutor invoked on a non-approval step".to_string(),
            });
        };

        if message.trim().is_empty() {
            return Err(OrchestratorError::MissingField {
                component: "approval step".to_string(),
                id: common.id.clone(),
                field: "message".to_string(),
                available_fields: vec!["message".to_string()],
            });
        }

        let snapshot = json!(context.build_context_object());
        let decision = self
            .ui
            .request_approval(message, &snapshot, *approval_timeout_ms)
            .await;

        match decision {
            ApprovalDecision::Approved => Ok(json!({ "approved": true })),
            ApprovalDecision::Rejected => Ok(json!({ "approved": false })),
            ApprovalDecision::TimedOut => Err(OrchestratorError::Timeout {
                scope: "step".to_string(),
                elapsed_ms: approval_timeout_ms.unwrap_or(0),
                attempts: None,
            }),
        }
    }

    fn route(&self, step: &WorkflowStep, result: &StepResult, _context: &WorkflowContext) -> Option<String> {
        let WorkflowStep::Approval {
            common,
            on_approve,
            on_reject,
            ..
        } = step
        else {
            return None;
        };
        if !result.success {
            return common.on_error.clone();
        }
        if result.data.get("approved").and_then(serde_json::Value::as_bool) == Some(true) {
            Some(on_approve.clone())
        } else {
            Some(on_reject.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepCommon;
    use serde_json::json;

    struct FixedUi(ApprovalDecision);

    #[async_trait]
    impl UiSurface for FixedUi {
        async fn notify_start(&self, _workflow_id: &str) {}
        async fn notify_progress(&self, _workflow_id: &str, _step_id: &str) {}
        async fn notify_complete(&self, _workflow_id: &str, _elapsed_ms: u64) {}
        async fn notify_error(&self, _workflow_id: &str, _error: &str) {}
        async fn request_approval(
            &self,
            _message: &str,
            _context_snapshot: &serde_json::Value,
            _timeout_ms: Option<u64>,
        ) -> ApprovalDecision {
            self.0
        }
    }

    fn step() -> WorkflowStep {
        WorkflowStep::Approval {
            common: StepCommon {
                id: "gate".into(),
                next: None,
                on_error: Some("error_handler".into()),
                input: None,
                max_retries: 0,
                retry_delay_ms: 1,
                timeout_ms: 5_000,
            },
            message: "proceed?".to_string(),
            on_approve: "continue".to_string(),
            on_reject: "halt".to_string(),
            approval_timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn approved_routes_to_on_approve() {
        let executor = ApprovalExecutor::new(Arc::new(FixedUi(ApprovalDecision::Approved)));
        let ctx = WorkflowContext::create("wf", json!(null));
        let s = step();
        let result = executor.execute(&s, &ctx).await;
        assert!(result.success);
        assert_eq!(executor.route(&s, &result, &ctx), Some("continue".to_string()));
    }

    #[tokio::test]
    async fn rejected_routes_to_on_reject() {
        let executor = ApprovalExecutor::new(Arc::new(FixedUi(ApprovalDecision::Rejected)));
        let ctx = WorkflowContext::create("wf", json!(null));
        let s = step();
        let result = executor.execute(&s, &ctx).await;
        assert_eq!(executor.route(&s, &result, &ctx), Some("halt".to_string()));
    }

    #[tokio::test]
    async fn timed_out_routes_to_on_error() {
        let executor = ApprovalExecutor::new(Arc::new(FixedUi(ApprovalDecision::TimedOut)));
        let ctx = WorkflowContext::create("wf", json!(null));
        let s = step();
        let result = executor.execute(&s, &ctx).await;
        assert!(!result.success);
        assert_eq!(executor.route(&s, &result, &ctx), Some("error_handler".to_string()));
    }
}
