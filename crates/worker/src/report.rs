//! Process exit codes and the JSON written to stdout.

use anyhow::Context;
use cobalt_core::{ExecutionOutcome, WorkflowStatus};
use serde::Serialize;

/// Everything resolved successfully.
pub const EXIT_SUCCESS: i32 = 0;
/// At least one request (or the single command) did not succeed.
pub const EXIT_FAILURE: i32 = 1;
/// The batch hit a fatal error, or the worker could not start.
pub const EXIT_FATAL: i32 = 2;

pub fn workflow_exit_code(status: WorkflowStatus) -> i32 {
    match status {
        WorkflowStatus::Success => EXIT_SUCCESS,
        WorkflowStatus::CompletedWithErrors => EXIT_FAILURE,
        // A returned state is always terminal; anything else is a worker bug.
        WorkflowStatus::FatalError | WorkflowStatus::Initialized | WorkflowStatus::Running => {
            EXIT_FATAL
        }
    }
}

pub fn outcome_exit_code(outcome: &ExecutionOutcome) -> i32 {
    if outcome.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Pretty-printed JSON for stdout.
pub fn render_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize report")
}
