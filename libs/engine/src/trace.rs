//! Per-step execution trace, recorded when `workflow.trace` is enabled

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::{StepResult, WorkflowContext};

/// One recorded dispatch: the step id, timestamp, full result, and a
/// snapshot of the context as of just after the result was recorded
/// (SPEC_FULL §3).
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub step_id: String,
    pub kind: String,
    pub recorded_at: DateTime<Utc>,
    pub result: StepResult,
    pub context_snapshot: serde_json::Value,
}

impl TraceEntry {
    /// Build a trace entry from a dispatched step's kind, its result, and
    /// the context as it stood once that result was recorded.
    #[must_use]
    pub fn from_result(kind: &str, result: &StepResult, context: &WorkflowContext) -> Self {
        Self {
            step_id: result.step_id.clone(),
            kind: kind.to_string(),
            recorded_at: Utc::now(),
            result: result.clone(),
            context_snapshot: context.snapshot(),
        }
    }
}

/// An ordered, append-only record of every step dispatched during a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowTrace {
    entries: Vec<TraceEntry>,
}

impl WorkflowTrace {
    /// An empty trace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    /// The recorded entries, in dispatch order
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_preserve_dispatch_order() {
        let mut trace = WorkflowTrace::new();
        let now = Utc::now();
        let ctx = WorkflowContext::create("wf", json!({"x": 1}));
        let ctx_a = ctx.add_result("a", StepResult::success("a", json!(1), now, now, 0));
        trace.push(TraceEntry::from_result("transform", ctx_a.get_result("a").unwrap().as_ref(), &ctx_a));
        let ctx_b = ctx_a.add_result("b", StepResult::success("b", json!(2), now, now, 0));
        trace.push(TraceEntry::from_result("transform", ctx_b.get_result("b").unwrap().as_ref(), &ctx_b));
        assert_eq!(trace.entries().len(), 2);
        assert_eq!(trace.entries()[0].step_id, "a");
        assert_eq!(trace.entries()[1].step_id, "b");
    }

    #[test]
    fn entry_carries_full_result_and_context_snapshot() {
        let now = Utc::now();
        let ctx = WorkflowContext::create("wf", json!({"x": 1}));
        let ctx = ctx.add_result("a", StepResult::failure("a", "boom", now, now, 1));
        let result = ctx.get_result("a").unwrap();
        let entry = TraceEntry::from_result("transform", &result, &ctx);
        assert_eq!(entry.result.error.as_deref(), Some("boom"));
        assert_eq!(entry.context_snapshot["input"], json!({"x": 1}));
        assert_eq!(entry.context_snapshot["results"]["a"]["error"], json!("boom"));
    }
}
