//! Aggregate result of one batch run and its lifecycle.
//!
//! ```text
//! Initialized ──▶ Running ──▶ Success
//!      │             ├──────▶ CompletedWithErrors
//!      └─────────────┴──────▶ FatalError
//! ```
//!
//! The three terminal states are absorbing.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;

use crate::error::CoreError;
use crate::execution::ExecutionOutcome;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// WorkflowStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// Batch accepted, nothing dispatched yet.
    Initialized,
    /// Requests are being dispatched and resolved.
    Running,
    /// Every request resolved with `Success`.
    Success,
    /// Every dispatched request resolved, at least one did not succeed.
    CompletedWithErrors,
    /// An orchestration-level fault stopped the batch.
    FatalError,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::CompletedWithErrors | Self::FatalError
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
        match self {
            Self::Initialized => matches!(next, Self::Running | Self::FatalError),
            Self::Running => next.is_terminal(),
            Self::Success | Self::CompletedWithErrors | Self::FatalError => false,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Aggregate state of one batch, owned by the orchestrator while it runs.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    status: WorkflowStatus,
    outcomes: BTreeMap<String, ExecutionOutcome>,
    max_concurrency: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    fatal_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<Timestamp>,
}

impl WorkflowState {
    /// Fresh state in [`WorkflowStatus::Initialized`].
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            status: WorkflowStatus::Initialized,
            outcomes: BTreeMap::new(),
            max_concurrency,
            fatal_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Outcomes keyed by context id, one per attempted request.
    pub fn outcomes(&self) -> &BTreeMap<String, ExecutionOutcome> {
        &self.outcomes
    }

    pub fn outcome(&self, context_id: &str) -> Option<&ExecutionOutcome> {
        self.outcomes.get(context_id)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Orchestration-level fault, recorded apart from per-request outcomes.
    pub fn fatal_error(&self) -> Option<&str> {
        self.fatal_error.as_deref()
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// Number of recorded outcomes whose status is not `Success`.
    pub fn failed_count(&self) -> usize {
        self.outcomes.values().filter(|o| !o.is_success()).count()
    }

    pub(crate) fn start(&mut self) -> Result<(), CoreError> {
        self.transition(WorkflowStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Record the outcome for `context_id`.
    ///
    /// Only legal while running; a second outcome for the same id is a conflict.
    pub(crate) fn record(
        &mut self,
        context_id: String,
        outcome: ExecutionOutcome,
    ) -> Result<(), CoreError> {
        if self.status != WorkflowStatus::Running {
            return Err(CoreError::Conflict(format!(
                "cannot record outcome for '{context_id}' while workflow is {:?}",
                self.status
            )));
        }
        if self.outcomes.contains_key(&context_id) {
            return Err(CoreError::Conflict(format!(
                "outcome for '{context_id}' already recorded"
            )));
        }
        self.outcomes.insert(context_id, outcome);
        Ok(())
    }

    /// Resolve a running workflow from its recorded outcomes.
    pub(crate) fn complete(&mut self) -> Result<(), CoreError> {
        let next = if self.outcomes.values().all(ExecutionOutcome::is_success) {
            WorkflowStatus::Success
        } else {
            WorkflowStatus::CompletedWithErrors
        };
        self.transition(next)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Resolve the workflow as `FatalError`, keeping recorded outcomes.
    pub(crate) fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(WorkflowStatus::FatalError)?;
        self.fatal_error = Some(message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, next: WorkflowStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "invalid workflow transition {:?} -> {next:?}",
                self.status
            )));
        }
        self.status = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
