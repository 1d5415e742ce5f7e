//! Condition step executor (C4.3)

use async_trait::async_trait;
use serde_json::json;

use crate::config::WorkflowStep;
use crate::context::{StepResult, WorkflowContext};
use crate::error::OrchestratorError;

use super::{expr_scope, StepExecutor};

/// Evaluates a boolean expression and routes on its truthiness
pub struct ConditionExecutor;

#[async_trait]
impl StepExecutor for ConditionExecutor {
    async fn execute_once(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> Result<serde_json::Value, OrchestratorError> {
        let WorkflowStep::Condition { common, condition, .. } = step else {
            return Err(OrchestratorError::InvalidValue {
                where_: format!("step '{}'", step.id()),
                what: "executor kind mismatch".to_string(),
                why: "ConditionExecutor invoked on a non-condition step".to_string(),
            });
        };

        let scope = expr_scope(context);
        let truth = crate::expr::evaluate_bool(condition, &scope).map_err(|err| {
            OrchestratorError::InvalidValue {
                where_: format!("condition on step '{}'", common.id),
                what: condition.clone(),
                why: format!("{err} (available scope: {})", scope.keys().cloned().collect::<Vec<_>>().join(", ")),
            }
        })?;
        Ok(json!({ "condition": truth }))
    }

    fn route(&self, step: &WorkflowStep, result: &StepResult, _context: &WorkflowContext) -> Option<String> {
        let WorkflowStep::Condition { common, then, r#else, .. } = step else {
            return None;
        };
        if !result.success {
            return common.on_error.clone();
        }
        if result.data.get("condition").and_then(serde_json::Value::as_bool) == Some(true) {
            Some(then.clone())
        } else {
            r#else.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepCommon;
    use serde_json::json;

    fn step(condition: &str, then: &str, r#else: Option<&str>) -> WorkflowStep {
        WorkflowStep::Condition {
            common: StepCommon {
                id: "c".into(),
                next: None,
                on_error: Some("error_handler".into()),
                input: None,
                max_retries: 0,
                retry_delay_ms: 1,
                timeout_ms: 5_000,
            },
            condition: condition.to_string(),
            then: then.to_string(),
            r#else: r#else.map(String::from),
        }
    }

    #[tokio::test]
    async fn routes_to_then_when_true() {
        let ctx = WorkflowContext::create("wf", json!({"x": 5}));
        let executor = ConditionExecutor;
        let s = step("input.x > 3", "then_step", Some("else_step"));
        let result = executor.execute(&s, &ctx).await;
        assert!(result.success);
        assert_eq!(executor.route(&s, &result, &ctx), Some("then_step".to_string()));
    }

    #[tokio::test]
    async fn routes_to_else_when_false() {
        let ctx = WorkflowContext::create("wf", json!({"x": 1}));
        let executor = ConditionExecutor;
        let s = step("input.x > 3", "then_step", Some("else_step"));
        let result = executor.execute(&s, &ctx).await;
        assert_eq!(executor.route(&s, &result, &ctx), Some("else_step".to_string()));
    }

    #[tokio::test]
    async fn invalid_condition_fails_and_routes_on_error() {
        let ctx = WorkflowContext::create("wf", json!({}));
        let executor = ConditionExecutor;
        let s = step("input.__proto__", "then_step", None);
        let result = executor.execute(&s, &ctx).await;
        assert!(!result.success);
        assert_eq!(executor.route(&s, &result, &ctx), Some("error_handler".to_string()));
    }
}
