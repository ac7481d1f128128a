//! Batch execution under a concurrency ceiling.
//!
//! [`WorkflowOrchestrator`] fans a batch of requests out to a
//! [`CommandRunner`](crate::execution::CommandRunner) and aggregates the
//! outcomes into a [`WorkflowState`].

pub mod orchestrator;
pub mod state;

pub use orchestrator::WorkflowOrchestrator;
pub use state::{WorkflowState, WorkflowStatus};
