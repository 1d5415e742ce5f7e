//! The declarative workflow orchestration core
//!
//! Organized one module per component: [`config`] (C3/data model),
//! [`context`] (C1), [`guards`] (C3), [`registry`] (C2), [`executor`] (C4),
//! [`expr`] (the restricted expression interpreter used by Transform and
//! Condition steps), [`remote`] (C5), [`validator`] (C6), [`trace`], [`ui`]
//! (C8), and [`engine`] (C7, the driver tying everything together).

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expr;
pub mod guards;
pub mod registry;
pub mod remote;
pub mod trace;
pub mod ui;
pub mod validator;

pub use config::{WorkflowDefinition, WorkflowStep};
pub use context::WorkflowContext;
pub use engine::{WorkflowExecutor, WorkflowResult};
pub use error::OrchestratorError;
pub use registry::ExecutorRegistry;
pub use validator::{validate_workflow, ValidationReport};

use std::sync::Arc;

use executor::agent::AgentExecutor;
use executor::approval::ApprovalExecutor;
use executor::condition::ConditionExecutor;
use executor::parallel::ParallelExecutor;
use executor::transform::TransformExecutor;
use remote::{AgentResolver, RemoteAgentClient, SessionService};

/// Build the default executor registry, wiring all five step-kind tags
/// against a shared remote agent client.
#[must_use]
pub fn default_registry(
    session_service: Arc<dyn SessionService>,
    agent_resolver: Arc<dyn AgentResolver>,
    remote_settings: orbit_common::RemoteAgentSettings,
) -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    let client = Arc::new(RemoteAgentClient::new(session_service, agent_resolver, remote_settings));
    registry.register("agent", Arc::new(AgentExecutor::new(client)));
    registry.register("transform", Arc::new(TransformExecutor));
    registry.register("condition", Arc::new(ConditionExecutor));
    registry.register("approval", Arc::new(ApprovalExecutor::new(Arc::new(ui::TracingUiSurface))));
    // parallel children are dispatched through a snapshot of the registry as
    // of this point; nesting a parallel step inside another parallel step is
    // therefore not supported (its "parallel" tag would be absent from the
    // inner snapshot).
    let inner = Arc::new(registry.clone());
    registry.register("parallel", Arc::new(ParallelExecutor::new(inner)));
    registry
}
