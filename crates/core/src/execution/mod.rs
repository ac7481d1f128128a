//! Host execution: request/outcome contract and the two runners.
//!
//! [`SyncRunner`] blocks the calling thread; [`AsyncRunner`] suspends on a
//! tokio runtime and is what the workflow orchestrator dispatches through.
//! Both share the same contract: they take an [`ExecutionRequest`], never
//! fail, and return an [`ExecutionOutcome`] only once the child is gone.

pub mod async_runner;
pub mod environment;
pub mod fault;
pub mod outcome;
pub mod request;
pub mod sync_runner;
pub mod terminate;

use std::future::Future;

pub use async_runner::AsyncRunner;
pub use environment::BaseEnvironment;
pub use fault::ExecutionFault;
pub use outcome::{ExecutionOutcome, ExecutionStatus, NO_EXIT_CODE};
pub use request::{ExecutionRequest, ExecutionRequestBuilder, ExecutionRequestSpec};
pub use sync_runner::SyncRunner;

/// Maximum characters of stdout/stderr included in log events.
const LOG_PREVIEW_CHARS: usize = 200;

/// Seam between the workflow orchestrator and whatever executes a request.
///
/// Implementations must resolve every request to an outcome (no panics, no
/// errors) and must not leave the child running when the future completes.
pub trait CommandRunner: Send + Sync {
    fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> impl Future<Output = ExecutionOutcome> + Send;
}

/// Run `request` on the calling thread with a default [`SyncRunner`].
pub fn run_sync(request: &ExecutionRequest) -> ExecutionOutcome {
    SyncRunner::default().run(request)
}

/// Run `request` cooperatively with a default [`AsyncRunner`].
pub async fn run_async(request: &ExecutionRequest) -> ExecutionOutcome {
    AsyncRunner::default().run(request).await
}

/// Emit one structured event describing a resolved request.
pub(crate) fn log_outcome(request: &ExecutionRequest, outcome: &ExecutionOutcome) {
    let stdout_preview = outcome::preview(outcome.stdout(), LOG_PREVIEW_CHARS);
    let stderr_preview = outcome::preview(outcome.stderr(), LOG_PREVIEW_CHARS);

    if outcome.is_success() {
        tracing::info!(
            context_id = %request.context_id(),
            command = %request.command(),
            exit_code = outcome.exit_code(),
            duration_secs = outcome.duration_secs(),
            stdout_preview,
            "Command executed successfully",
        );
    } else {
        tracing::warn!(
            context_id = %request.context_id(),
            command = %request.command(),
            status = ?outcome.status(),
            exit_code = outcome.exit_code(),
            duration_secs = outcome.duration_secs(),
            error = outcome.error_message().unwrap_or_default(),
            stdout_preview,
            stderr_preview,
            "Command did not succeed",
        );
    }
}

/// Shared test helpers for runner tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use super::ExecutionRequest;

    /// Build a request for `command` with explicit arguments.
    pub fn command<const N: usize>(
        context_id: &str,
        command: &str,
        args: [&str; N],
        timeout_secs: f64,
    ) -> ExecutionRequest {
        ExecutionRequest::builder(context_id, command)
            .args(args)
            .timeout_secs(timeout_secs)
            .build()
            .expect("valid test request")
    }

    /// Build a request that runs `script` through `sh -c`.
    pub fn shell(context_id: &str, script: &str, timeout_secs: f64) -> ExecutionRequest {
        command(context_id, "sh", ["-c", script], timeout_secs)
    }

    /// Whether `pid` is a live (non-zombie) process.
    #[cfg(unix)]
    pub fn process_is_running(pid: u32) -> bool {
        #[cfg(target_os = "linux")]
        {
            match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Ok(stat) => {
                    let state = stat
                        .rfind(')')
                        .and_then(|i| stat[i + 1..].split_whitespace().next());
                    !matches!(state, Some("Z") | Some("X") | None)
                }
                Err(_) => false,
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            // SAFETY: kill with signal 0 only checks for existence.
            unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
