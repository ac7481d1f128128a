//! COBALT host execution core.
//!
//! This crate provides the building blocks for running external commands
//! on the host and fanning batches of them out under a concurrency ceiling:
//!
//! - [`execution`] - the request/outcome contract, the blocking
//!   [`SyncRunner`](execution::SyncRunner) and the cooperative
//!   [`AsyncRunner`](execution::AsyncRunner).
//! - [`workflow`] - the bounded-concurrency
//!   [`WorkflowOrchestrator`](workflow::WorkflowOrchestrator) and the
//!   aggregate [`WorkflowState`](workflow::WorkflowState).
//! - [`service_status`] - health snapshot derived from a finished workflow.

pub mod config;
pub mod error;
pub mod execution;
pub mod service_status;
pub mod types;
pub mod workflow;

pub use config::{RunnerConfig, WorkflowConfig};
pub use error::CoreError;
pub use execution::{
    run_async, run_sync, AsyncRunner, CommandRunner, ExecutionFault, ExecutionOutcome,
    ExecutionRequest, ExecutionStatus, SyncRunner,
};
pub use workflow::{WorkflowOrchestrator, WorkflowState, WorkflowStatus};
