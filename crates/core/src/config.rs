//! Tunables for the runners and the workflow orchestrator.
//!
//! Both structs are plain data with defaults suitable for local use. The
//! worker binary fills them from environment variables.

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default ceiling on simultaneously running child processes in a workflow.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default wait between the graceful and the forceful termination signal.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_millis(100);

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated to prevent memory exhaustion
/// from extremely verbose commands.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// RunnerConfig
// ---------------------------------------------------------------------------

/// Settings shared by [`SyncRunner`](crate::execution::SyncRunner) and
/// [`AsyncRunner`](crate::execution::AsyncRunner).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// How long a child gets to exit after the graceful signal before it
    /// (and its process group) is killed.
    pub termination_grace: Duration,
    /// Per-stream capture limit in bytes.
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            termination_grace: DEFAULT_TERMINATION_GRACE,
            max_output_bytes: MAX_OUTPUT_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowConfig
// ---------------------------------------------------------------------------

/// Settings for a [`WorkflowOrchestrator`](crate::workflow::WorkflowOrchestrator).
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Ceiling on simultaneously in-flight runner invocations.
    pub max_concurrency: usize,
}

impl WorkflowConfig {
    /// Build a config with the given ceiling, rejecting zero.
    pub fn new(max_concurrency: usize) -> Result<Self, CoreError> {
        validate_max_concurrency(max_concurrency)?;
        Ok(Self { max_concurrency })
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Validate a concurrency ceiling.
///
/// A ceiling of zero would never admit any request, so it is rejected.
pub fn validate_max_concurrency(max_concurrency: usize) -> Result<(), CoreError> {
    if max_concurrency == 0 {
        return Err(CoreError::Validation(
            "max_concurrency must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
