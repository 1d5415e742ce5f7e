//! Workflow definition types
//!
//! These types are deserialized from the canonical JSON workflow format and
//! validated before execution. They represent the user-facing workflow
//! configuration format.

use serde::{Deserialize, Serialize};

// =============================================================================
// Root Definition
// =============================================================================

/// Root workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowDefinition {
    /// Unique, non-empty workflow id
    pub id: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Step definitions (must be non-empty)
    pub steps: Vec<WorkflowStep>,

    /// Maximum loop iterations before the iteration guard fires
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Maximum wall-clock duration in milliseconds before the duration guard fires
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// Maximum number of results retained in the context before pruning
    #[serde(default = "default_max_context_size")]
    pub max_context_size: usize,

    /// Context retention policy
    #[serde(default)]
    pub context_retention: ContextRetention,

    /// Enables verbose debug logging
    #[serde(default)]
    pub debug: bool,

    /// Enables per-step trace recording
    #[serde(default)]
    pub trace: bool,

    /// Seed context values available before any step executes
    #[serde(default)]
    pub initial_context: serde_json::Value,
}

pub(crate) fn default_max_iterations() -> u32 {
    100
}

pub(crate) fn default_max_duration_ms() -> u64 {
    300_000
}

pub(crate) fn default_max_context_size() -> usize {
    100
}

/// Context retention policy (SPEC_FULL §9 open question iii)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRetention {
    /// Keep every result until `max_context_size` forces a prune
    #[default]
    All,
    /// Synonym for `All`'s pruning behavior, keyed off insertion order
    Recent,
    /// Not implemented: falls back to `All` with a one-time warning
    Referenced,
}

// =============================================================================
// Step Definition
// =============================================================================

/// Fields shared by every step kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCommon {
    /// Unique step id within the workflow (including nested parallel children)
    pub id: String,

    /// Next step id on success (default terminator)
    #[serde(default)]
    pub next: Option<String>,

    /// Next step id on failure
    #[serde(default)]
    pub on_error: Option<String>,

    /// Explicit back-reference to a prior step whose data should be surfaced
    /// under its own key in this step's input
    #[serde(default)]
    pub input: Option<String>,

    /// Number of retries beyond the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between retries, in milliseconds (doubles up to a cap)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt timeout, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

pub(crate) fn default_max_retries() -> u32 {
    1
}

pub(crate) fn default_retry_delay_ms() -> u64 {
    1_000
}

pub(crate) fn default_timeout_ms() -> u64 {
    60_000
}

/// A single node in the workflow graph, discriminated by kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Delegates to a named remote agent via the session service
    Agent {
        #[serde(flatten)]
        common: StepCommon,
        /// Non-empty agent name
        agent: String,
    },
    /// Evaluates a restricted pure expression and stores the result
    Transform {
        #[serde(flatten)]
        common: StepCommon,
        /// The expression source (see `orbit_engine::expr`)
        transform: String,
    },
    /// Evaluates a boolean expression and routes on its truthiness
    Condition {
        #[serde(flatten)]
        common: StepCommon,
        /// The boolean expression source
        condition: String,
        /// Step id to route to when the condition is truthy
        then: String,
        /// Step id to route to when the condition is falsy
        #[serde(default)]
        r#else: Option<String>,
    },
    /// Asks the UI surface for a human decision
    Approval {
        #[serde(flatten)]
        common: StepCommon,
        /// Prompt text shown to the approver
        message: String,
        /// Step id to route to on approval
        on_approve: String,
        /// Step id to route to on rejection
        on_reject: String,
        /// Optional decision timeout, in milliseconds
        #[serde(default)]
        approval_timeout_ms: Option<u64>,
    },
    /// Runs nested steps concurrently against a read-only context snapshot
    Parallel {
        #[serde(flatten)]
        common: StepCommon,
        /// Nested step list (must be non-empty)
        steps: Vec<WorkflowStep>,
        /// Minimum number of children that must succeed (defaults to all)
        #[serde(default)]
        min_success: Option<usize>,
    },
}

impl WorkflowStep {
    /// Shared fields for this step, regardless of kind
    #[must_use]
    pub fn common(&self) -> &StepCommon {
        match self {
            Self::Agent { common, .. }
            | Self::Transform { common, .. }
            | Self::Condition { common, .. }
            | Self::Approval { common, .. }
            | Self::Parallel { common, .. } => common,
        }
    }

    /// This step's id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.common().id
    }

    /// The step-kind tag used to look up an executor in the registry
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent { .. } => "agent",
            Self::Transform { .. } => "transform",
            Self::Condition { .. } => "condition",
            Self::Approval { .. } => "approval",
            Self::Parallel { .. } => "parallel",
        }
    }

    /// All step ids referenced by any id-valued field of this step,
    /// including `input` (used for I1 reference-resolution checks).
    #[must_use]
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut targets = self.graph_targets();
        if let Some(i) = &self.common().input {
            targets.push(i);
        }
        targets
    }

    /// Step ids reachable by following routing (not back-reference) edges
    /// out of this step: `next`/`on_error` plus kind-specific routing
    /// fields, and nested parallel children ids.
    #[must_use]
    pub fn graph_targets(&self) -> Vec<&str> {
        let common = self.common();
        let mut targets: Vec<&str> = Vec::new();
        if let Some(n) = &common.next {
            targets.push(n);
        }
        if let Some(e) = &common.on_error {
            targets.push(e);
        }
        match self {
            Self::Condition { then, r#else, .. } => {
                targets.push(then);
                if let Some(e) = r#else {
                    targets.push(e);
                }
            }
            Self::Approval {
                on_approve,
                on_reject,
                ..
            } => {
                targets.push(on_approve);
                targets.push(on_reject);
            }
            Self::Parallel { steps, .. } => {
                for child in steps {
                    targets.push(child.id());
                }
            }
            Self::Agent { .. } | Self::Transform { .. } => {}
        }
        targets
    }
}
