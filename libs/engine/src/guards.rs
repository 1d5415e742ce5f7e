//! Safety guards (C3)
//!
//! A guard is consulted once per loop iteration, before executor dispatch;
//! raising terminates the workflow with the guard's error annotated with
//! workflow id, current step, and iteration count.

use crate::config::WorkflowDefinition;
use crate::context::WorkflowContext;
use crate::error::OrchestratorError;

/// A predicate consulted before every step dispatch
pub trait SafetyGuard: Send + Sync {
    /// The guard's name, used in [`OrchestratorError::GuardFailure`]
    fn name(&self) -> &str;

    /// Check the guard; return `Err` to terminate the workflow
    fn check(
        &self,
        context: &WorkflowContext,
        workflow: &WorkflowDefinition,
    ) -> Result<(), OrchestratorError>;
}

fn guard_failure(guard: &str, context: &WorkflowContext) -> OrchestratorError {
    OrchestratorError::GuardFailure {
        guard: guard.to_string(),
        workflow_id: context.workflow_id.clone(),
        current_step: context
            .metadata
            .current_step
            .clone()
            .unwrap_or_else(|| "<none>".to_string()),
        iteration: context.metadata.iteration_count,
    }
}

/// Mandatory guard: allows exactly `max_iterations` dispatches, then fails
pub struct IterationGuard;

impl SafetyGuard for IterationGuard {
    fn name(&self) -> &str {
        "iteration_limit"
    }

    fn check(
        &self,
        context: &WorkflowContext,
        workflow: &WorkflowDefinition,
    ) -> Result<(), OrchestratorError> {
        // `iteration_count` is bumped before this check runs, so `> max_iterations`
        // (not `>=`) lets exactly `max_iterations` dispatches complete before the
        // guard terminates the (max_iterations + 1)-th attempt.
        if context.metadata.iteration_count > workflow.max_iterations {
            return Err(guard_failure(
                &format!(
                    "{} exceeded maximum iterations ({})",
                    self.name(),
                    workflow.max_iterations
                ),
                context,
            ));
        }
        Ok(())
    }
}

/// Mandatory guard: fails once elapsed time reaches `max_duration_ms`
pub struct DurationGuard;

impl SafetyGuard for DurationGuard {
    fn name(&self) -> &str {
        "duration_limit"
    }

    fn check(
        &self,
        context: &WorkflowContext,
        workflow: &WorkflowDefinition,
    ) -> Result<(), OrchestratorError> {
        let elapsed_ms = (chrono::Utc::now() - context.start_time)
            .num_milliseconds()
            .max(0) as u64;
        if elapsed_ms >= workflow.max_duration_ms {
            return Err(guard_failure(
                &format!(
                    "{} exceeded maximum duration ({}ms)",
                    self.name(),
                    workflow.max_duration_ms
                ),
                context,
            ));
        }
        Ok(())
    }
}

/// Pluggable guard: fails once `error_count` reaches a configured ceiling
pub struct MaxErrorGuard {
    max_errors: u32,
}

impl MaxErrorGuard {
    /// Create a guard that fails once `error_count >= max_errors`
    #[must_use]
    pub fn new(max_errors: u32) -> Self {
        Self { max_errors }
    }
}

impl SafetyGuard for MaxErrorGuard {
    fn name(&self) -> &str {
        "max_error"
    }

    fn check(
        &self,
        context: &WorkflowContext,
        _workflow: &WorkflowDefinition,
    ) -> Result<(), OrchestratorError> {
        if context.metadata.error_count >= self.max_errors {
            return Err(guard_failure(
                &format!(
                    "{} exceeded maximum errors ({})",
                    self.name(),
                    self.max_errors
                ),
                context,
            ));
        }
        Ok(())
    }
}

/// Pluggable guard: heuristic cycle detector — fails when the current step
/// has occurred 3 or more times in the last 5 entries of `previous_steps`.
///
/// This is a fixed-window heuristic and cannot detect all cycles. It is, by
/// design, the mechanism that actually bounds a looping workflow at runtime;
/// [`crate::validator::validate_workflow`] only warns about routing cycles
/// at validation time, since a cycle may be an intentional bounded loop
/// guarded by `max_iterations`/`max_duration_ms` rather than a mistake.
pub struct CircularDependencyGuard;

impl SafetyGuard for CircularDependencyGuard {
    fn name(&self) -> &str {
        "circular_dependency"
    }

    fn check(
        &self,
        context: &WorkflowContext,
        _workflow: &WorkflowDefinition,
    ) -> Result<(), OrchestratorError> {
        if let Some(current) = &context.metadata.current_step {
            if context.recent_occurrences(current, 5) >= 3 {
                return Err(guard_failure(
                    &format!(
                        "{} detected step '{}' repeating within the last 5 iterations",
                        self.name(),
                        current
                    ),
                    context,
                ));
            }
        }
        Ok(())
    }
}
