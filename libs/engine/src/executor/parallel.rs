//! Parallel step executor (C4.5)
//!
//! Children run as `tokio::spawn`ed tasks against a read-only snapshot of
//! the parent context, fanned in with `futures::future::join_all`; a slow
//! or failing child never blocks or cancels its siblings.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::json;

use crate::config::WorkflowStep;
use crate::context::WorkflowContext;
use crate::error::OrchestratorError;
use crate::registry::ExecutorRegistry;

use super::StepExecutor;

/// Executes nested steps concurrently against a shared read-only snapshot
pub struct ParallelExecutor {
    registry: Arc<ExecutorRegistry>,
}

impl ParallelExecutor {
    /// Build an executor that dispatches children through `registry`
    #[must_use]
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepExecutor for ParallelExecutor {
    async fn execute_once(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> Result<serde_json::Value, OrchestratorError> {
        let WorkflowStep::Parallel {
            common,
            steps,
            min_success,
        } = step
        else {
            return Err(OrchestratorError::InvalidValue {
                where_: format!("step '{}'", step.id()),
                what: "executor kind mismatch".to_string(),
                why: "ParallelExecutor invoked on a non-parallel step".to_string(),
            });
        };

        if steps.is_empty() {
            return Err(OrchestratorError::MissingField {
                component: "parallel step".to_string(),
                id: common.id.clone(),
                field: "steps".to_string(),
                available_fields: vec![],
            });
        }

        let snapshot = context.clone();
        let tasks = steps.iter().cloned().map(|child| {
            let registry = Arc::clone(&self.registry);
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                let executor = registry.get(child.kind());
                let result = match executor {
                    Some(executor) => executor.execute(&child, &snapshot).await,
                    None => crate::context::StepResult::failure(
                        child.id(),
                        format!("no executor registered for kind '{}'", child.kind()),
                        chrono::Utc::now(),
                        chrono::Utc::now(),
                        0,
                    ),
                };
                (child.id().to_string(), result)
            })
        });

        let joined = join_all(tasks).await;

        let mut results: IndexMap<String, crate::context::StepResult> = IndexMap::new();
        for outcome in joined {
            match outcome {
                Ok((id, result)) => {
                    results.insert(id, result);
                }
                Err(join_err) => {
                    // a panicking child still counts as a failed child, not a
                    // fatal workflow error, per the "never cancel siblings" rule
                    tracing::error!(error = %join_err, "parallel child task panicked");
                }
            }
        }

        let success_count = results.values().filter(|r| r.success).count();
        let threshold = min_success.unwrap_or(steps.len());
        let success = success_count >= threshold;

        if !success {
            return Err(OrchestratorError::AgentError(format!(
                "parallel step '{}': {success_count}/{} children succeeded, needed {threshold}",
                common.id,
                steps.len(),
            )));
        }

        Ok(json!(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepCommon;
    use crate::executor::transform::TransformExecutor;
    use serde_json::json as j;

    fn transform_child(id: &str, expr: &str) -> WorkflowStep {
        WorkflowStep::Transform {
            common: StepCommon {
                id: id.into(),
                next: None,
                on_error: None,
                input: None,
                max_retries: 0,
                retry_delay_ms: 1,
                timeout_ms: 5_000,
            },
            transform: expr.to_string(),
        }
    }

    fn parallel_step(children: Vec<WorkflowStep>, min_success: Option<usize>) -> WorkflowStep {
        WorkflowStep::Parallel {
            common: StepCommon {
                id: "fanout".into(),
                next: None,
                on_error: None,
                input: None,
                max_retries: 0,
                retry_delay_ms: 1,
                timeout_ms: 5_000,
            },
            steps: children,
            min_success,
        }
    }

    fn registry() -> Arc<ExecutorRegistry> {
        let mut r = ExecutorRegistry::new();
        r.register("transform", Arc::new(TransformExecutor));
        Arc::new(r)
    }

    #[tokio::test]
    async fn all_children_succeed_by_default() {
        let executor = ParallelExecutor::new(registry());
        let ctx = WorkflowContext::create("wf", j!({"x": 1}));
        let step = parallel_step(
            vec![
                transform_child("a", "input.x + 1"),
                transform_child("b", "input.x + 2"),
            ],
            None,
        );
        let result = executor.execute(&step, &ctx).await;
        assert!(result.success);
        assert!(result.data.get("a").is_some());
        assert!(result.data.get("b").is_some());
    }

    #[tokio::test]
    async fn min_success_threshold_tolerates_partial_failure() {
        let executor = ParallelExecutor::new(registry());
        let ctx = WorkflowContext::create("wf", j!({}));
        let step = parallel_step(
            vec![transform_child("a", "1 / 0"), transform_child("b", "1 + 1")],
            Some(1),
        );
        let result = executor.execute(&step, &ctx).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn below_threshold_fails_the_composite_step() {
        let executor = ParallelExecutor::new(registry());
        let ctx = WorkflowContext::create("wf", j!({}));
        let step = parallel_step(vec![transform_child("a", "1 / 0")], None);
        let result = executor.execute(&step, &ctx).await;
        assert!(!result.success);
    }
}
