//! Step executors (C4)
//!
//! Every step kind implements [`StepExecutor`] against a shared retry and
//! timeout harness (`execute_with_retry`); the kind-specific `execute_once`
//! never needs to retry or time itself — the harness does it once, uniformly.

pub mod agent;
pub mod approval;
pub mod condition;
pub mod parallel;
pub mod transform;

use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;

use crate::config::{StepCommon, WorkflowStep};
use crate::context::{StepResult, WorkflowContext};
use crate::error::OrchestratorError;

/// One step kind's execution and routing behavior
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run one attempt of this step's body. Called by [`execute`]'s retry
    /// harness, which applies the shared timeout/backoff/attempt-count
    /// policy around it — implementors do not retry or time themselves.
    async fn execute_once(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> Result<serde_json::Value, OrchestratorError>;

    /// Drive attempts with exponential-backoff retry and a per-attempt
    /// timeout, recording durations and retry count. Never raises: all
    /// attempt failures are folded into a `StepResult{success: false}`.
    async fn execute(&self, step: &WorkflowStep, context: &WorkflowContext) -> StepResult {
        let common = step.common();
        let start_time = Utc::now();
        let mut backoff = retry_backoff(common);
        let mut retries = 0u32;
        let max_attempts = common.max_retries + 1;

        let mut last_error = String::new();
        for attempt in 0..max_attempts {
            let timeout = Duration::from_millis(common.timeout_ms);
            let outcome = tokio::time::timeout(timeout, self.execute_once(step, context)).await;

            match outcome {
                Ok(Ok(data)) => {
                    let end_time = Utc::now();
                    return StepResult::success(step.id(), data, start_time, end_time, retries);
                }
                Ok(Err(err)) => {
                    last_error = err.to_string();
                }
                Err(_) => {
                    last_error = OrchestratorError::Timeout {
                        scope: "step".to_string(),
                        elapsed_ms: common.timeout_ms,
                        attempts: Some(attempt + 1),
                    }
                    .to_string();
                }
            }

            if attempt + 1 < max_attempts {
                retries += 1;
                if let Some(delay) = backoff.next_backoff() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let end_time = Utc::now();
        StepResult::failure(step.id(), last_error, start_time, end_time, retries)
    }

    /// Pick the next step id given this step, its result, and the context
    /// as of after the result was recorded. Default policy: `on_error` on
    /// failure (else none), `next` on success (else none).
    fn route(&self, step: &WorkflowStep, result: &StepResult, _context: &WorkflowContext) -> Option<String> {
        let common = step.common();
        if result.success {
            common.next.clone()
        } else {
            common.on_error.clone()
        }
    }
}

impl std::fmt::Debug for dyn StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn StepExecutor")
    }
}

/// Build the retry backoff for a step, parametrized per §4.4 defaults:
/// initial=1000ms, multiplier=2, max=30000ms, bounded to the step's
/// configured `max_retries` attempts.
fn retry_backoff(common: &StepCommon) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(common.retry_delay_ms),
        multiplier: 2.0,
        max_interval: Duration::from_millis(30_000),
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Build the scope object handed to the expression interpreter: every
/// successful prior step's data keyed by step id, plus `input`.
pub(crate) fn expr_scope(context: &WorkflowContext) -> serde_json::Map<String, serde_json::Value> {
    let mut scope = context.build_context_object();
    scope.insert("input".to_string(), context.input.clone());
    scope
}
