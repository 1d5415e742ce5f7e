//! Orbit CLI
//!
//! Thin runner implementing the external CLI contract: load a workflow
//! definition from disk, run it to completion, print a one-line summary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orbit_engine::remote::{PassthroughAgentResolver, ReqwestSessionService};
use orbit_engine::{default_registry, WorkflowDefinition, WorkflowExecutor};

#[derive(Parser)]
#[command(name = "orbit")]
#[command(about = "Declarative multi-agent workflow orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow definition to completion
    Run {
        /// Path to the workflow definition JSON file
        workflow: PathBuf,
        /// Path to a JSON file supplying the workflow input (defaults to `null`)
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    orbit_common::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { workflow, input } => run(workflow, input).await,
    }
}

async fn run(workflow_path: PathBuf, input_path: Option<PathBuf>) -> Result<()> {
    let definition_text = std::fs::read_to_string(&workflow_path)
        .with_context(|| format!("reading workflow definition at {}", workflow_path.display()))?;
    let workflow: WorkflowDefinition = serde_json::from_str(&definition_text)
        .with_context(|| format!("parsing workflow definition at {}", workflow_path.display()))?;

    let input = match input_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading input at {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing input at {}", path.display()))?
        }
        None => serde_json::Value::Null,
    };

    let settings = orbit_common::load_settings(None).context("loading configuration")?;
    let session_service = Arc::new(
        ReqwestSessionService::new(settings.remote_agent.session_base_url.clone())
            .context("building session service client")?,
    );
    let registry = Arc::new(default_registry(
        session_service,
        Arc::new(PassthroughAgentResolver),
        settings.remote_agent,
    ));
    let executor = WorkflowExecutor::with_defaults(registry);

    let result = executor.execute(&workflow, input).await;

    if result.success {
        println!(
            "workflow '{}' completed: {} steps, {}ms",
            workflow.id,
            result.context.results_len(),
            result.elapsed_ms,
        );
        Ok(())
    } else {
        eprintln!(
            "workflow '{}' failed after {}ms: {}",
            workflow.id,
            result.elapsed_ms,
            result.error.unwrap_or_else(|| "unknown error".to_string()),
        );
        std::process::exit(1);
    }
}
