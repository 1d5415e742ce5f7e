//! Transform step executor (C4.2)

use async_trait::async_trait;

use crate::config::WorkflowStep;
use crate::context::WorkflowContext;
use crate::error::OrchestratorError;

use super::{expr_scope, StepExecutor};

/// Evaluates a restricted pure expression and stores its result
pub struct TransformExecutor;

#[async_trait]
impl StepExecutor for TransformExecutor {
    async fn execute_once(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> Result<serde_json::Value, OrchestratorError> {
        let WorkflowStep::Transform { common, transform } = step else {
            return Err(OrchestratorError::InvalidValue {
                where_: format!("step '{}'", step.id()),
                what: "executor kind mismatch".to_string(),
                why: "TransformExecutor invoked on a non-transform step".to_string(),
            });
        };

        let scope = expr_scope(context);
        crate::expr::evaluate(transform, &scope).map_err(|err| OrchestratorError::InvalidValue {
            where_: format!("transform on step '{}'", common.id),
            what: transform.clone(),
            why: format!("{err} (available scope: {})", scope.keys().cloned().collect::<Vec<_>>().join(", ")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepCommon;
    use serde_json::json;

    fn step(transform: &str) -> WorkflowStep {
        WorkflowStep::Transform {
            common: StepCommon {
                id: "t".into(),
                next: None,
                on_error: None,
                input: None,
                max_retries: 0,
                retry_delay_ms: 1,
                timeout_ms: 5_000,
            },
            transform: transform.to_string(),
        }
    }

    #[tokio::test]
    async fn evaluates_against_context() {
        let ctx = WorkflowContext::create("wf", json!({"x": 2}));
        let executor = TransformExecutor;
        let result = executor.execute_once(&step("input.x + 1"), &ctx).await.unwrap();
        assert_eq!(result, json!(3.0));
    }

    #[tokio::test]
    async fn invalid_expression_reports_available_scope() {
        let ctx = WorkflowContext::create("wf", json!({"x": 2}));
        let executor = TransformExecutor;
        let err = executor.execute_once(&step("input.__proto__"), &ctx).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidValue { .. }));
    }
}
