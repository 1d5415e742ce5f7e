//! Tagged error taxonomy for the orchestrator core
//!
//! Errors are tagged, not textual: every variant carries the structured
//! fields a caller needs to react programmatically, with `Display` messages
//! reserved for humans reading logs.

use thiserror::Error;

/// Errors raised by the orchestrator core
///
/// Per SPEC_FULL.md §7, fatal structural problems raise this type out of
/// `execute()`; expected step-level failures are instead normalized into a
/// `StepResult { success: false, .. }` and never raise.
#[derive(Debug, Error, Clone)]
pub enum OrchestratorError {
    /// A named entity (agent, step id, executor kind) could not be found
    #[error("{what} not found: '{name}' (available: {})", available.join(", "))]
    NotFound {
        /// What kind of thing was being looked up
        what: String,
        /// The name that failed to resolve
        name: String,
        /// The names that were actually available
        available: Vec<String>,
    },

    /// A required field was missing from a component's configuration
    #[error("missing field '{field}' on {component} '{id}' (available fields: {})", available_fields.join(", "))]
    MissingField {
        /// The component kind (e.g. "agent step")
        component: String,
        /// The id of the offending step
        id: String,
        /// The field that was required but absent
        field: String,
        /// Fields that were present
        available_fields: Vec<String>,
    },

    /// A field held a value outside its allowed domain
    #[error("invalid value at {where_}: {what} ({why})")]
    InvalidValue {
        /// Where the bad value was found
        where_: String,
        /// What the bad value was
        what: String,
        /// Why it is invalid
        why: String,
    },

    /// A routing field closed a cycle in the step graph
    #[error("circular dependency: {0}")]
    CircularDependency(String),

    /// A scoped operation exceeded its time budget
    #[error("timeout in {scope} after {elapsed_ms}ms{}", attempts.map(|a| format!(" ({a} attempts)")).unwrap_or_default())]
    Timeout {
        /// Which scope timed out: "step", "poll-total", or "workflow"
        scope: String,
        /// Elapsed time in milliseconds
        elapsed_ms: u64,
        /// Number of attempts made, if relevant
        attempts: Option<u32>,
    },

    /// A network operation failed during polling
    #[error("network failure during poll (consecutive failures: {consecutive_failures}): {message}")]
    NetworkFailure {
        /// How many consecutive poll failures preceded this error
        consecutive_failures: u32,
        /// Underlying failure description
        message: String,
    },

    /// A safety guard raised
    #[error("guard '{guard}' failed for workflow '{workflow_id}' at step '{current_step}' (iteration {iteration})")]
    GuardFailure {
        /// The guard's name
        guard: String,
        /// The workflow being executed
        workflow_id: String,
        /// The step current at the time of failure
        current_step: String,
        /// The iteration count at the time of failure
        iteration: u32,
    },

    /// The session service reported an error status for an agent call
    #[error("agent error: {0}")]
    AgentError(String),

    /// A non-fatal cleanup failure; observed but does not fail the step
    #[error("cleanup failed, session leaked: {session_id}")]
    Cleanup {
        /// The session id that could not be deleted
        session_id: String,
    },
}

impl OrchestratorError {
    /// True for the fatal/structural variants that must raise out of
    /// `execute()` rather than flow through `StepResult`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::MissingField { .. }
                | Self::CircularDependency(_)
                | Self::GuardFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_and_lookup_failures_are_fatal() {
        assert!(OrchestratorError::GuardFailure {
            guard: "iteration_limit".into(),
            workflow_id: "wf".into(),
            current_step: "a".into(),
            iteration: 3,
        }
        .is_fatal());
        assert!(OrchestratorError::NotFound {
            what: "step".into(),
            name: "missing".into(),
            available: vec!["a".into()],
        }
        .is_fatal());
    }

    #[test]
    fn step_level_failures_are_not_fatal() {
        assert!(!OrchestratorError::AgentError("boom".into()).is_fatal());
        assert!(!OrchestratorError::Timeout {
            scope: "step".into(),
            elapsed_ms: 5_000,
            attempts: Some(1),
        }
        .is_fatal());
    }
}
