//! UI Surface (C8)
//!
//! A narrow trait so C7 and the Approval executor can be exercised without
//! a real UI attached. The non-interactive default logs every notification
//! via `tracing` and auto-approves rather than blocking.

use async_trait::async_trait;

/// The outcome of a human decision requested by the Approval executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    TimedOut,
}

/// Narrow notification/decision surface the engine depends on
#[async_trait]
pub trait UiSurface: Send + Sync {
    /// The workflow is about to start
    async fn notify_start(&self, workflow_id: &str);
    /// A step is about to dispatch
    async fn notify_progress(&self, workflow_id: &str, step_id: &str);
    /// The workflow finished successfully
    async fn notify_complete(&self, workflow_id: &str, elapsed_ms: u64);
    /// The workflow terminated with an error
    async fn notify_error(&self, workflow_id: &str, error: &str);
    /// Ask a human to approve or reject, with an optional decision timeout
    async fn request_approval(
        &self,
        message: &str,
        context_snapshot: &serde_json::Value,
        timeout_ms: Option<u64>,
    ) -> ApprovalDecision;
}

/// Non-interactive default: logs every notification and auto-approves.
/// Used by the CLI runner and the test suite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUiSurface;

#[async_trait]
impl UiSurface for TracingUiSurface {
    async fn notify_start(&self, workflow_id: &str) {
        tracing::info!(workflow_id, "workflow started");
    }

    async fn notify_progress(&self, workflow_id: &str, step_id: &str) {
        tracing::info!(workflow_id, step_id, "dispatching step");
    }

    async fn notify_complete(&self, workflow_id: &str, elapsed_ms: u64) {
        tracing::info!(workflow_id, elapsed_ms, "workflow completed");
    }

    async fn notify_error(&self, workflow_id: &str, error: &str) {
        tracing::error!(workflow_id, error, "workflow terminated with error");
    }

    async fn request_approval(
        &self,
        message: &str,
        _context_snapshot: &serde_json::Value,
        _timeout_ms: Option<u64>,
    ) -> ApprovalDecision {
        tracing::info!(message, "auto-approving (non-interactive UI surface)");
        ApprovalDecision::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn tracing_surface_auto_approves() {
        let ui = TracingUiSurface;
        let decision = ui.request_approval("proceed?", &json!({}), Some(1_000)).await;
        assert_eq!(decision, ApprovalDecision::Approved);
    }
}
