//! COBALT worker: composition root around `cobalt-core`.
//!
//! Loads configuration from the environment, reads batch files, runs them
//! through the [`WorkflowOrchestrator`] and maps results to exit codes.

pub mod batch;
pub mod cli;
pub mod config;
pub mod logging;
pub mod report;

use std::path::Path;

use cobalt_core::service_status::ServiceStatus;
use cobalt_core::{
    AsyncRunner, ExecutionOutcome, ExecutionRequest, SyncRunner, WorkflowOrchestrator,
    WorkflowState,
};

use crate::batch::Batch;
use crate::config::WorkerConfig;

/// Load `path` and run it as one workflow.
///
/// Errors only for problems before dispatch (unreadable or invalid file,
/// invalid ceiling). Faults during the run are reported in the state.
pub async fn run_batch_file(path: &Path, config: &WorkerConfig) -> anyhow::Result<WorkflowState> {
    let batch = Batch::load(path)?;
    run_batch(batch, config).await
}

pub async fn run_batch(batch: Batch, config: &WorkerConfig) -> anyhow::Result<WorkflowState> {
    let workflow_config = config.workflow_config(batch.max_concurrency)?;
    let orchestrator = WorkflowOrchestrator::with_runner(
        AsyncRunner::new(config.runner_config()),
        workflow_config,
    );

    let state = orchestrator.run_workflow(batch.requests).await;

    let health = ServiceStatus::from_workflow(&state);
    tracing::info!(
        service = %health.service_name,
        health = ?health.health_status,
        details = ?health.details,
        "Service status",
    );
    Ok(state)
}

/// Run one request on a blocking thread with the [`SyncRunner`].
pub async fn run_exec(request: ExecutionRequest, config: &WorkerConfig) -> anyhow::Result<ExecutionOutcome> {
    let runner = SyncRunner::new(config.runner_config());
    let outcome = tokio::task::spawn_blocking(move || runner.run(&request)).await?;
    Ok(outcome)
}
