//! Health snapshot of the execution core, derived from a workflow result.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;
use crate::workflow::{WorkflowState, WorkflowStatus};

/// Name reported by [`ServiceStatus::from_workflow`].
pub const SERVICE_NAME: &str = "cobalt-host-execution";

// ---------------------------------------------------------------------------
// HealthStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Everything resolved successfully, or nothing has failed yet.
    Ok,
    /// Some requests did not succeed.
    Degraded,
    /// Orchestration itself failed.
    Critical,
}

/// Map a workflow status to a health status.
///
/// Non-terminal states have not observed any failure and report `Ok`.
pub fn assess_health(status: WorkflowStatus) -> HealthStatus {
    match status {
        WorkflowStatus::Initialized | WorkflowStatus::Running | WorkflowStatus::Success => {
            HealthStatus::Ok
        }
        WorkflowStatus::CompletedWithErrors => HealthStatus::Degraded,
        WorkflowStatus::FatalError => HealthStatus::Critical,
    }
}

// ---------------------------------------------------------------------------
// ServiceStatus
// ---------------------------------------------------------------------------

/// Standardized health record for monitoring consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service_name: String,
    pub health_status: HealthStatus,
    pub last_check: Timestamp,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl ServiceStatus {
    /// Snapshot the health of a workflow run.
    ///
    /// `details` carries the workflow status, outcome counts and, when
    /// present, the fatal error message.
    pub fn from_workflow(state: &WorkflowState) -> Self {
        let mut details = BTreeMap::new();
        details.insert(
            "workflow_status".to_string(),
            status_label(state.status()).to_string(),
        );
        details.insert(
            "max_concurrency".to_string(),
            state.max_concurrency().to_string(),
        );
        details.insert(
            "outcomes_recorded".to_string(),
            state.outcomes().len().to_string(),
        );
        details.insert("outcomes_failed".to_string(), state.failed_count().to_string());
        if let Some(message) = state.fatal_error() {
            details.insert("fatal_error".to_string(), message.to_string());
        }

        Self {
            service_name: SERVICE_NAME.to_string(),
            health_status: assess_health(state.status()),
            last_check: state.finished_at().unwrap_or_else(Utc::now),
            details,
        }
    }
}

fn status_label(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Initialized => "INITIALIZED",
        WorkflowStatus::Running => "RUNNING",
        WorkflowStatus::Success => "SUCCESS",
        WorkflowStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
        WorkflowStatus::FatalError => "FATAL_ERROR",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
