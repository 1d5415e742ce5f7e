//! Workflow executor (C7) — the main driver
//!
//! Owns an executor registry, a guard list, and a UI surface; `execute`
//! validates, then loops step dispatch/route until routing yields none.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::config::WorkflowDefinition;
use crate::context::WorkflowContext;
use crate::error::OrchestratorError;
use crate::guards::{DurationGuard, IterationGuard, SafetyGuard};
use crate::registry::ExecutorRegistry;
use crate::trace::{TraceEntry, WorkflowTrace};
use crate::ui::{TracingUiSurface, UiSurface};
use crate::validator::validate_workflow;

/// The outcome of running a workflow to completion
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    /// True iff the loop terminated via routing-to-none without raising
    pub success: bool,
    /// The final context, successful or not
    #[serde(skip)]
    pub context: WorkflowContext,
    /// Present when `!success`
    pub error: Option<String>,
    /// The `success` flag of the StepResult belonging to the final
    /// current step, when one exists (see SPEC_FULL.md §9)
    pub final_step_success: Option<bool>,
    /// Per-step trace, present when `workflow.trace` is enabled
    pub trace: Option<WorkflowTrace>,
    /// Total elapsed wall-clock time
    pub elapsed_ms: u64,
}

/// The C7 driver: owns the executor registry, guard list, and UI surface
pub struct WorkflowExecutor {
    registry: Arc<ExecutorRegistry>,
    guards: Vec<Arc<dyn SafetyGuard>>,
    ui: Arc<dyn UiSurface>,
}

impl WorkflowExecutor {
    /// Build an executor with the mandatory iteration/duration guards plus
    /// any additional pluggable guards, over the given registry and UI surface
    #[must_use]
    pub fn new(
        registry: Arc<ExecutorRegistry>,
        extra_guards: Vec<Arc<dyn SafetyGuard>>,
        ui: Arc<dyn UiSurface>,
    ) -> Self {
        let mut guards: Vec<Arc<dyn SafetyGuard>> = vec![Arc::new(IterationGuard), Arc::new(DurationGuard)];
        guards.extend(extra_guards);
        Self { registry, guards, ui }
    }

    /// Build an executor with just the mandatory guards and a non-interactive UI
    #[must_use]
    pub fn with_defaults(registry: Arc<ExecutorRegistry>) -> Self {
        Self::new(registry, vec![], Arc::new(TracingUiSurface))
    }

    /// Run `workflow` with `input` to completion
    pub async fn execute(&self, workflow: &WorkflowDefinition, input: serde_json::Value) -> WorkflowResult {
        let started = Instant::now();

        if let Err(err) = self.validate_structure(workflow) {
            return WorkflowResult {
                success: false,
                context: WorkflowContext::create(&workflow.id, input),
                error: Some(err.to_string()),
                final_step_success: None,
                trace: None,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
        }

        let mut context = WorkflowContext::create(&workflow.id, input);
        self.ui.notify_start(&workflow.id).await;

        let mut trace = workflow.trace.then(WorkflowTrace::new);

        match self.run_loop(workflow, &mut context, &mut trace).await {
            Ok(()) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.ui.notify_complete(&workflow.id, elapsed_ms).await;
                let final_step_success = context
                    .metadata
                    .current_step
                    .as_ref()
                    .and_then(|id| context.get_result(id))
                    .map(|r| r.success);
                WorkflowResult {
                    success: true,
                    context,
                    error: None,
                    final_step_success,
                    trace,
                    elapsed_ms,
                }
            }
            Err(err) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                context = context.increment_error();
                self.ui.notify_error(&workflow.id, &err.to_string()).await;
                let final_step_success = context
                    .metadata
                    .current_step
                    .as_ref()
                    .and_then(|id| context.get_result(id))
                    .map(|r| r.success);
                WorkflowResult {
                    success: false,
                    context,
                    error: Some(err.to_string()),
                    final_step_success,
                    trace,
                    elapsed_ms,
                }
            }
        }
    }

    fn validate_structure(&self, workflow: &WorkflowDefinition) -> Result<(), OrchestratorError> {
        let report = validate_workflow(workflow);
        if !report.valid {
            let message = report
                .errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(OrchestratorError::InvalidValue {
                where_: format!("workflow '{}'", workflow.id),
                what: "structure".to_string(),
                why: message,
            });
        }
        Ok(())
    }

    async fn run_loop(
        &self,
        workflow: &WorkflowDefinition,
        context: &mut WorkflowContext,
        trace: &mut Option<WorkflowTrace>,
    ) -> Result<(), OrchestratorError> {
        let mut current_id = entry_step_id(workflow);

        while let Some(step_id) = current_id {
            *context = context.increment_iteration();

            for guard in &self.guards {
                guard.check(context, workflow)?;
            }

            let step = workflow
                .steps
                .iter()
                .find_map(|s| find_step(s, &step_id))
                .ok_or_else(|| OrchestratorError::NotFound {
                    what: "step".to_string(),
                    name: step_id.clone(),
                    available: all_step_ids(workflow),
                })?;

            *context = context.set_current_step(step.id());
            self.ui.notify_progress(&workflow.id, step.id()).await;

            let executor = self.registry.get_or_err(step.kind())?;
            let result = executor.execute(step, context).await;

            let failed = !result.success;
            *context = context.add_result(step.id(), result.clone());
            if failed {
                *context = context.increment_error();
            }

            if let Some(trace) = trace.as_mut() {
                trace.push(TraceEntry::from_result(step.kind(), &result, context));
            }

            if context.results_len() > workflow.max_context_size {
                if matches!(workflow.context_retention, crate::config::ContextRetention::Referenced) {
                    warn_referenced_retention_unsupported();
                }
                *context = context.prune(workflow.max_context_size);
            }

            current_id = executor.route(step, &result, context);
        }

        Ok(())
    }
}

fn warn_referenced_retention_unsupported() {
    static WARNED: std::sync::Once = std::sync::Once::new();
    WARNED.call_once(|| {
        tracing::warn!("context_retention 'referenced' is not implemented, falling back to 'all'");
    });
}

fn find_step<'a>(step: &'a crate::config::WorkflowStep, id: &str) -> Option<&'a crate::config::WorkflowStep> {
    if step.id() == id {
        return Some(step);
    }
    if let crate::config::WorkflowStep::Parallel { steps, .. } = step {
        for child in steps {
            if let Some(found) = find_step(child, id) {
                return Some(found);
            }
        }
    }
    None
}

fn all_step_ids(workflow: &WorkflowDefinition) -> Vec<String> {
    fn collect(step: &crate::config::WorkflowStep, out: &mut Vec<String>) {
        out.push(step.id().to_string());
        if let crate::config::WorkflowStep::Parallel { steps, .. } = step {
            for child in steps {
                collect(child, out);
            }
        }
    }
    let mut out = Vec::new();
    for step in &workflow.steps {
        collect(step, &mut out);
    }
    out
}

fn entry_step_id(workflow: &WorkflowDefinition) -> Option<String> {
    use std::collections::HashSet;
    let all_ids = all_step_ids(workflow);
    let referenced: HashSet<&str> = workflow
        .steps
        .iter()
        .flat_map(crate::config::WorkflowStep::graph_targets)
        .collect();
    workflow
        .steps
        .iter()
        .find(|s| !referenced.contains(s.id()))
        .map(|s| s.id().to_string())
        .or_else(|| all_ids.first().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepCommon;
    use crate::executor::transform::TransformExecutor;
    use serde_json::json;

    fn common(id: &str, next: Option<&str>) -> StepCommon {
        StepCommon {
            id: id.into(),
            next: next.map(String::from),
            on_error: None,
            input: None,
            max_retries: 0,
            retry_delay_ms: 1,
            timeout_ms: 5_000,
        }
    }

    fn workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf".into(),
            description: String::new(),
            steps: vec![
                crate::config::WorkflowStep::Transform {
                    common: common("start", Some("end")),
                    transform: "input.x + 1".to_string(),
                },
                crate::config::WorkflowStep::Transform {
                    common: common("end", None),
                    transform: "start + 1".to_string(),
                },
            ],
            max_iterations: 10,
            max_duration_ms: 60_000,
            max_context_size: 100,
            context_retention: Default::default(),
            debug: false,
            trace: true,
            initial_context: json!(null),
        }
    }

    fn registry() -> Arc<ExecutorRegistry> {
        let mut r = ExecutorRegistry::new();
        r.register("transform", Arc::new(TransformExecutor));
        Arc::new(r)
    }

    #[tokio::test]
    async fn runs_to_completion_and_records_trace() {
        let executor = WorkflowExecutor::with_defaults(registry());
        let result = executor.execute(&workflow(), json!({"x": 1})).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.context.get_result("end").unwrap().data, json!(3.0));
        assert_eq!(result.trace.unwrap().entries().len(), 2);
    }

    #[tokio::test]
    async fn invalid_workflow_fails_fast() {
        let mut wf = workflow();
        wf.steps.clear();
        let executor = WorkflowExecutor::with_defaults(registry());
        let result = executor.execute(&wf, json!(null)).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
