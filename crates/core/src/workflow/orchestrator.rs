//! Bounded-concurrency fan-out of execution requests.
//!
//! Every request in a batch is spawned as its own task, and each task must
//! acquire a permit from a per-batch [`Semaphore`] before it may call the
//! runner. Waiting for a permit is a cooperative suspension, so no worker
//! thread is parked while the ceiling is full. Outcomes are recorded in
//! completion order as tasks are joined.
//!
//! One request failing or timing out never affects its siblings. Only an
//! orchestration-level fault (malformed batch, runner panic, task failure)
//! turns the workflow into `FatalError`; at that point the semaphore is
//! closed so requests still waiting for a permit are never dispatched, while
//! requests already running are left to finish and are still recorded.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{validate_max_concurrency, WorkflowConfig};
use crate::error::CoreError;
use crate::execution::{AsyncRunner, CommandRunner, ExecutionOutcome, ExecutionRequest};

use super::state::WorkflowState;

/// How one spawned request task ended.
enum StepResult {
    /// The runner produced an outcome.
    Resolved {
        context_id: String,
        outcome: ExecutionOutcome,
    },
    /// The runner panicked; `outcome` is the `Error` outcome standing in for it.
    Panicked {
        context_id: String,
        outcome: ExecutionOutcome,
        message: String,
    },
    /// The batch went fatal before this request obtained a permit.
    NotDispatched { context_id: String },
}

/// Runs batches of [`ExecutionRequest`]s through a [`CommandRunner`] under a
/// fixed concurrency ceiling.
///
/// Each call to [`run_workflow`](Self::run_workflow) owns a fresh
/// [`WorkflowState`] and permit pool; nothing is shared between batches.
pub struct WorkflowOrchestrator<R = AsyncRunner> {
    runner: Arc<R>,
    config: WorkflowConfig,
}

impl WorkflowOrchestrator<AsyncRunner> {
    /// Orchestrator dispatching through a default [`AsyncRunner`].
    pub fn new(config: WorkflowConfig) -> Self {
        Self::with_runner(AsyncRunner::default(), config)
    }
}

impl Default for WorkflowOrchestrator<AsyncRunner> {
    fn default() -> Self {
        Self::new(WorkflowConfig::default())
    }
}

impl<R: CommandRunner + 'static> WorkflowOrchestrator<R> {
    pub fn with_runner(runner: R, config: WorkflowConfig) -> Self {
        Self {
            runner: Arc::new(runner),
            config,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.config.max_concurrency
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute every request and aggregate the outcomes.
    ///
    /// Never fails: orchestration-level faults are reported through
    /// [`WorkflowStatus::FatalError`](super::WorkflowStatus::FatalError) and
    /// [`WorkflowState::fatal_error`].
    pub async fn run_workflow(&self, requests: Vec<ExecutionRequest>) -> WorkflowState {
        let max_concurrency = self.config.max_concurrency;
        let mut state = WorkflowState::new(max_concurrency);

        if let Err(e) = validate_max_concurrency(max_concurrency).and_then(|()| validate_batch(&requests)) {
            tracing::error!(error = %e, "Rejected malformed workflow batch");
            resolve_fatal(&mut state, e.to_string());
            return state;
        }
        if let Err(e) = state.start() {
            resolve_fatal(&mut state, e.to_string());
            return state;
        }

        tracing::info!(
            request_count = requests.len(),
            max_concurrency,
            "Workflow started",
        );

        let permits = Arc::new(Semaphore::new(max_concurrency.min(Semaphore::MAX_PERMITS)));
        let mut tasks = JoinSet::new();
        for request in requests {
            tasks.spawn(run_step(
                Arc::clone(&self.runner),
                Arc::clone(&permits),
                request,
            ));
        }

        let mut fatal: Option<String> = None;
        while let Some(joined) = tasks.join_next().await {
            let fault = match joined {
                Ok(StepResult::Resolved {
                    context_id,
                    outcome,
                }) => state.record(context_id, outcome).err().map(|e| e.to_string()),
                Ok(StepResult::Panicked {
                    context_id,
                    outcome,
                    message,
                }) => {
                    tracing::error!(context_id = %context_id, panic = %message, "Runner panicked");
                    let recorded = state.record(context_id.clone(), outcome);
                    Some(match recorded {
                        Ok(()) => format!("Runner panicked while executing '{context_id}': {message}"),
                        Err(e) => e.to_string(),
                    })
                }
                Ok(StepResult::NotDispatched { context_id }) => {
                    tracing::debug!(context_id = %context_id, "Request not dispatched after fatal error");
                    None
                }
                Err(join_err) => Some(format!("Workflow task failed: {join_err}")),
            };

            if let Some(message) = fault {
                if fatal.is_none() {
                    tracing::error!(error = %message, "Workflow fatal error; halting dispatch");
                    permits.close();
                    fatal = Some(message);
                }
            }
        }

        match fatal {
            Some(message) => resolve_fatal(&mut state, message),
            None => {
                if let Err(e) = state.complete() {
                    resolve_fatal(&mut state, e.to_string());
                }
            }
        }

        tracing::info!(
            status = ?state.status(),
            recorded = state.outcomes().len(),
            failed = state.failed_count(),
            "Workflow finished",
        );
        state
    }
}

/// Body of one spawned request task.
async fn run_step<R: CommandRunner>(
    runner: Arc<R>,
    permits: Arc<Semaphore>,
    request: ExecutionRequest,
) -> StepResult {
    let context_id = request.context_id().to_string();

    // Closed only when the batch has gone fatal.
    let Ok(_permit) = Arc::clone(&permits).acquire_owned().await else {
        return StepResult::NotDispatched { context_id };
    };

    tracing::debug!(context_id = %context_id, "Dispatching request");
    let dispatched = Instant::now();
    match AssertUnwindSafe(runner.execute(&request))
        .catch_unwind()
        .await
    {
        Ok(outcome) => StepResult::Resolved {
            context_id,
            outcome,
        },
        Err(payload) => {
            // Close before the permit is released so no waiting request
            // slips in ahead of the orchestrator noticing the fault.
            permits.close();
            let message = panic_message(payload.as_ref());
            let outcome = ExecutionOutcome::internal_error(
                format!("Runner panicked: {message}"),
                dispatched.elapsed(),
            );
            StepResult::Panicked {
                context_id,
                outcome,
                message,
            }
        }
    }
}

/// Reject batches with duplicate context ids.
fn validate_batch(requests: &[ExecutionRequest]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(requests.len());
    for request in requests {
        if !seen.insert(request.context_id()) {
            return Err(CoreError::Validation(format!(
                "duplicate context_id '{}' in workflow batch",
                request.context_id()
            )));
        }
    }
    Ok(())
}

fn resolve_fatal(state: &mut WorkflowState, message: String) {
    if let Err(e) = state.fail(message) {
        // Only reachable if the state is already terminal.
        tracing::error!(error = %e, "Could not mark workflow as fatal");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::workflow::WorkflowStatus;

    #[test]
    fn duplicate_context_ids_are_rejected() {
        let a = ExecutionRequest::builder("same", "echo").build().expect("a");
        let b = ExecutionRequest::builder("same", "true").build().expect("b");
        assert_matches!(validate_batch(&[a, b]), Err(CoreError::Validation(msg)) if msg.contains("same"));
    }

    #[test]
    fn unique_context_ids_are_accepted() {
        let a = ExecutionRequest::builder("a", "echo").build().expect("a");
        let b = ExecutionRequest::builder("b", "echo").build().expect("b");
        assert!(validate_batch(&[a, b]).is_ok());
    }

    #[test]
    fn panic_message_reads_common_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[tokio::test]
    async fn empty_batch_succeeds() {
        let state = WorkflowOrchestrator::default().run_workflow(Vec::new()).await;
        assert_eq!(state.status(), WorkflowStatus::Success);
        assert!(state.outcomes().is_empty());
        assert_eq!(state.max_concurrency(), 10);
    }

    #[tokio::test]
    async fn zero_ceiling_is_fatal_without_dispatch() {
        let orchestrator = WorkflowOrchestrator::new(WorkflowConfig { max_concurrency: 0 });
        let request = ExecutionRequest::builder("a", "echo").build().expect("a");
        let state = orchestrator.run_workflow(vec![request]).await;
        assert_eq!(state.status(), WorkflowStatus::FatalError);
        assert!(state.outcomes().is_empty());
        assert!(state.fatal_error().is_some_and(|m| m.contains("max_concurrency")));
    }

    #[tokio::test]
    async fn duplicate_batch_is_fatal_without_dispatch() {
        let a = ExecutionRequest::builder("dup", "echo").build().expect("a");
        let b = ExecutionRequest::builder("dup", "echo").build().expect("b");
        let state = WorkflowOrchestrator::default().run_workflow(vec![a, b]).await;
        assert_eq!(state.status(), WorkflowStatus::FatalError);
        assert!(state.outcomes().is_empty());
        assert!(state.started_at().is_none());
    }
}
