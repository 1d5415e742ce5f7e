//! Immutable workflow context (C1)
//!
//! Every mutator returns a new [`WorkflowContext`] that structurally shares
//! unchanged portions with the receiver: the ordered results map is an
//! `Arc<IndexMap<..>>` whose values are themselves `Arc<StepResult>`, so a
//! write clones the map's spine (cheap relative to the payloads it holds)
//! while sharing every payload that did not change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// The outcome of executing a single step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    /// The step this result belongs to
    pub step_id: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Opaque result payload (present when `success`)
    pub data: serde_json::Value,
    /// Tagged error (present when `!success`; see [`OrchestratorError`])
    pub error: Option<String>,
    /// When the step started
    pub start_time: DateTime<Utc>,
    /// When the step ended
    pub end_time: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Attempts actually used beyond the first (0 on first-try success)
    pub retries: u32,
}

impl StepResult {
    /// Build a successful result
    #[must_use]
    pub fn success(
        step_id: impl Into<String>,
        data: serde_json::Value,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        retries: u32,
    ) -> Self {
        let duration_ms = (end_time - start_time).num_milliseconds().max(0) as u64;
        Self {
            step_id: step_id.into(),
            success: true,
            data,
            error: None,
            start_time,
            end_time,
            duration_ms,
            retries,
        }
    }

    /// Build a failed result
    #[must_use]
    pub fn failure(
        step_id: impl Into<String>,
        error: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        retries: u32,
    ) -> Self {
        let duration_ms = (end_time - start_time).num_milliseconds().max(0) as u64;
        Self {
            step_id: step_id.into(),
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
            start_time,
            end_time,
            duration_ms,
            retries,
        }
    }
}

/// Metadata tracked alongside the results map
#[derive(Debug, Clone, Default)]
pub struct ContextMetadata {
    /// The step most recently dispatched
    pub current_step: Option<String>,
    /// Every step id dispatched so far, in order (append-only, I5)
    pub previous_steps: Arc<Vec<String>>,
    /// Monotonically non-decreasing loop-iteration counter (I4)
    pub iteration_count: u32,
    /// Count of steps that completed with `success = false`
    pub error_count: u32,
}

/// Aggregate statistics over a context's results, from [`WorkflowContext::stats`]
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ContextStats {
    /// Total results recorded
    pub total: usize,
    /// Results with `success = true`
    pub successful: usize,
    /// Results with `success = false`
    pub failed: usize,
    /// Mean `duration_ms` across all results (0.0 when empty)
    pub avg_duration_ms: f64,
    /// Current iteration count
    pub iteration_count: u32,
    /// Current error count
    pub error_count: u32,
    /// Sum of all `duration_ms` values
    pub total_duration_ms: u64,
}

/// The immutable, structurally-shared accumulation of step results (C1)
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    /// The workflow this context belongs to
    pub workflow_id: String,
    /// When the context was created
    pub start_time: DateTime<Utc>,
    /// The original input handed to the workflow
    pub input: serde_json::Value,
    results: Arc<IndexMap<String, Arc<StepResult>>>,
    /// Execution metadata
    pub metadata: ContextMetadata,
}

impl WorkflowContext {
    /// Create a fresh context with empty results and zeroed metadata
    #[must_use]
    pub fn create(workflow_id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            start_time: Utc::now(),
            input,
            results: Arc::new(IndexMap::new()),
            metadata: ContextMetadata::default(),
        }
    }

    /// Insert a result, returning a new context with the clone inserted.
    ///
    /// `result` is deep-cloned before storage (value types in Rust own their
    /// data, so a plain `Clone` already satisfies the no-aliasing guarantee
    /// SPEC_FULL.md §4.1 asks for). The original context is untouched.
    #[must_use]
    pub fn add_result(&self, step_id: impl Into<String>, result: StepResult) -> Self {
        let step_id = step_id.into();
        let mut results = (*self.results).clone();
        results.insert(step_id.clone(), Arc::new(result));

        let mut previous_steps = (*self.metadata.previous_steps).clone();
        previous_steps.push(step_id.clone());

        Self {
            results: Arc::new(results),
            metadata: ContextMetadata {
                current_step: Some(step_id),
                previous_steps: Arc::new(previous_steps),
                ..self.metadata.clone()
            },
            ..self.clone()
        }
    }

    /// O(1) lookup of a previously stored result
    #[must_use]
    pub fn get_result(&self, step_id: &str) -> Option<Arc<StepResult>> {
        self.results.get(step_id).cloned()
    }

    /// Functional update: bump the iteration counter
    #[must_use]
    pub fn increment_iteration(&self) -> Self {
        Self {
            metadata: ContextMetadata {
                iteration_count: self.metadata.iteration_count + 1,
                ..self.metadata.clone()
            },
            ..self.clone()
        }
    }

    /// Functional update: bump the error counter
    #[must_use]
    pub fn increment_error(&self) -> Self {
        Self {
            metadata: ContextMetadata {
                error_count: self.metadata.error_count + 1,
                ..self.metadata.clone()
            },
            ..self.clone()
        }
    }

    /// Functional update: set the current step id without appending a result
    #[must_use]
    pub fn set_current_step(&self, id: impl Into<String>) -> Self {
        Self {
            metadata: ContextMetadata {
                current_step: Some(id.into()),
                ..self.metadata.clone()
            },
            ..self.clone()
        }
    }

    /// A `{step_id: data}` mapping containing only successful results, in
    /// insertion order. Used to build agent inputs and expression scopes.
    #[must_use]
    pub fn build_context_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.results
            .iter()
            .filter(|(_, r)| r.success)
            .map(|(id, r)| (id.clone(), r.data.clone()))
            .collect()
    }

    /// Dotted-path lookup ("step_id.field.sub…") on successful results
    #[must_use]
    pub fn get_value(&self, path: &str) -> Option<serde_json::Value> {
        let mut parts = path.split('.');
        let step_id = parts.next()?;
        let result = self.results.get(step_id)?;
        if !result.success {
            return None;
        }
        let mut current = &result.data;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    /// Keep only the most recent `max_size` entries (by insertion order);
    /// a no-op when already within budget. Idempotent: `prune(n)` applied
    /// twice yields the same context as applying it once.
    #[must_use]
    pub fn prune(&self, max_size: usize) -> Self {
        if self.results.len() <= max_size {
            return self.clone();
        }
        let drop_count = self.results.len() - max_size;
        let pruned: IndexMap<String, Arc<StepResult>> = self
            .results
            .iter()
            .skip(drop_count)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            results: Arc::new(pruned),
            ..self.clone()
        }
    }

    /// Number of results currently held
    #[must_use]
    pub fn results_len(&self) -> usize {
        self.results.len()
    }

    /// Aggregate statistics over the current results
    #[must_use]
    pub fn stats(&self) -> ContextStats {
        let total = self.results.len();
        let successful = self.results.values().filter(|r| r.success).count();
        let failed = total - successful;
        let total_duration_ms: u64 = self.results.values().map(|r| r.duration_ms).sum();
        let avg_duration_ms = if total == 0 {
            0.0
        } else {
            total_duration_ms as f64 / total as f64
        };
        ContextStats {
            total,
            successful,
            failed,
            avg_duration_ms,
            iteration_count: self.metadata.iteration_count,
            error_count: self.metadata.error_count,
            total_duration_ms,
        }
    }

    /// How many times `step_id` occurs in the last `window` entries of
    /// `previous_steps`; used by [`crate::guards::CircularDependencyGuard`].
    #[must_use]
    pub fn recent_occurrences(&self, step_id: &str, window: usize) -> usize {
        let steps = &self.metadata.previous_steps;
        let start = steps.len().saturating_sub(window);
        steps[start..].iter().filter(|s| s.as_str() == step_id).count()
    }

    /// A serializable point-in-time snapshot of this context, for attaching
    /// to a [`crate::trace::TraceEntry`]. Includes the original input and
    /// every result recorded so far (successful or not), not just the
    /// successful subset `build_context_object` exposes to expressions.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        let results: serde_json::Map<String, serde_json::Value> = self
            .results
            .iter()
            .map(|(id, r)| (id.clone(), serde_json::to_value(r.as_ref()).unwrap_or(serde_json::Value::Null)))
            .collect();
        serde_json::json!({
            "input": self.input,
            "results": results,
            "iteration_count": self.metadata.iteration_count,
            "error_count": self.metadata.error_count,
        })
    }
}

/// Convert an [`OrchestratorError`] into the string stored on a failed
/// [`StepResult`]; kept as a free function since `StepResult.error` is a
/// plain string (it must remain `Clone`/`PartialEq`-trivial and
/// serializable without leaking `OrchestratorError`'s internal shape).
#[must_use]
pub fn describe_error(err: &OrchestratorError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn add_result_does_not_mutate_original() {
        let ctx1 = WorkflowContext::create("wf", json!({"x": 1}));
        let r = StepResult::success("a", json!({"ok": true}), now(), now(), 0);
        let ctx2 = ctx1.add_result("a", r.clone());

        assert_eq!(ctx1.results_len(), 0);
        assert_eq!(ctx2.results_len(), 1);
        assert_eq!(*ctx2.get_result("a").unwrap(), r);
    }

    #[test]
    fn mutating_inserted_data_after_the_fact_does_not_alias() {
        let ctx1 = WorkflowContext::create("wf", json!(null));
        let mut data = json!({"count": 1});
        let r = StepResult::success("a", data.clone(), now(), now(), 0);
        let ctx2 = ctx1.add_result("a", r);

        data["count"] = json!(999);
        assert_eq!(ctx2.get_result("a").unwrap().data["count"], json!(1));
    }

    #[test]
    fn previous_steps_is_append_only() {
        let ctx = WorkflowContext::create("wf", json!(null));
        let ctx = ctx.add_result("a", StepResult::success("a", json!(1), now(), now(), 0));
        let ctx = ctx.add_result("b", StepResult::success("b", json!(2), now(), now(), 0));
        assert_eq!(*ctx.metadata.previous_steps, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn build_context_object_excludes_failures() {
        let ctx = WorkflowContext::create("wf", json!(null));
        let ctx = ctx.add_result("a", StepResult::success("a", json!({"v": 1}), now(), now(), 0));
        let ctx = ctx.add_result("b", StepResult::failure("b", "boom", now(), now(), 0));
        let obj = ctx.build_context_object();
        assert!(obj.contains_key("a"));
        assert!(!obj.contains_key("b"));
    }

    #[test]
    fn get_value_does_dotted_lookup() {
        let ctx = WorkflowContext::create("wf", json!(null));
        let ctx = ctx.add_result(
            "plan",
            StepResult::success("plan", json!({"nested": {"field": "hi"}}), now(), now(), 0),
        );
        assert_eq!(ctx.get_value("plan.nested.field"), Some(json!("hi")));
        assert_eq!(ctx.get_value("plan.missing"), None);
    }

    #[test]
    fn prune_keeps_most_recent_and_is_idempotent() {
        let mut ctx = WorkflowContext::create("wf", json!(null));
        for i in 0..5 {
            ctx = ctx.add_result(
                format!("s{i}"),
                StepResult::success(format!("s{i}"), json!(i), now(), now(), 0),
            );
        }
        let pruned = ctx.prune(2);
        assert_eq!(pruned.results_len(), 2);
        assert!(pruned.get_result("s3").is_some());
        assert!(pruned.get_result("s4").is_some());
        assert!(pruned.get_result("s0").is_none());

        let pruned_again = pruned.prune(2);
        assert_eq!(pruned_again.results_len(), 2);
        assert!(pruned_again.get_result("s3").is_some());
    }

    #[test]
    fn recent_occurrences_counts_within_window() {
        let mut ctx = WorkflowContext::create("wf", json!(null));
        for _ in 0..4 {
            ctx = ctx.add_result("x", StepResult::success("x", json!(null), now(), now(), 0));
        }
        assert_eq!(ctx.recent_occurrences("x", 5), 4);
        assert_eq!(ctx.recent_occurrences("x", 2), 2);
    }
}
