//! Cooperative runner built on `tokio::process`.
//!
//! Reading stdout, reading stderr and waiting for exit are joined into one
//! future, and that single future is what the deadline applies to. A child
//! that fills a pipe buffer before exiting therefore keeps being drained
//! while we wait on it.
//!
//! # Output on timeout
//!
//! When the deadline fires the joined future is dropped mid-read. Bytes that
//! were already appended to the capture buffers are kept, everything else is
//! lost. Timeout outcomes may carry full, partial or empty output; callers
//! must not rely on it.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::RunnerConfig;

use super::environment::BaseEnvironment;
use super::fault::ExecutionFault;
use super::log_outcome;
use super::outcome::{ExecutionOutcome, NO_EXIT_CODE};
use super::request::ExecutionRequest;
use super::terminate::{terminate_async, GroupGuard};
use super::CommandRunner;

/// Executes requests without blocking the calling thread.
#[derive(Debug, Clone)]
pub struct AsyncRunner {
    base_env: BaseEnvironment,
    config: RunnerConfig,
}

/// Inherits the current process environment, default [`RunnerConfig`].
impl Default for AsyncRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl AsyncRunner {
    /// Runner that inherits the current process environment.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            base_env: BaseEnvironment::inherited(),
            config,
        }
    }

    /// Runner with an explicit base environment.
    pub fn with_environment(base_env: BaseEnvironment, config: RunnerConfig) -> Self {
        Self { base_env, config }
    }

    /// Execute `request`, suspending while the child runs.
    ///
    /// Never fails: every fault is folded into the returned outcome, and the
    /// child is no longer running when this returns.
    pub async fn run(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let start = Instant::now();
        let outcome = self.drive(request, start).await;
        log_outcome(request, &outcome);
        outcome
    }

    async fn drive(&self, request: &ExecutionRequest, start: Instant) -> ExecutionOutcome {
        if let Some(path) = missing_working_directory(request).await {
            let fault = ExecutionFault::WorkingDirectoryNotFound { path };
            return ExecutionOutcome::faulted(&fault, NO_EXIT_CODE, start.elapsed(), b"", b"");
        }

        let mut cmd = Command::new(request.command());
        cmd.args(request.args())
            .env_clear()
            .envs(self.base_env.with_overrides(request.env_overrides()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = request.working_directory() {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let fault = ExecutionFault::from_spawn_error(request.command(), e);
                return ExecutionOutcome::faulted(&fault, NO_EXIT_CODE, start.elapsed(), b"", b"");
            }
        };
        let pid = child.id();
        let mut guard = GroupGuard::new(pid);
        tracing::debug!(context_id = %request.context_id(), pid, "Spawned child process");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.max_output_bytes as u64;
        let mut out = Vec::new();
        let mut err = Vec::new();

        let waited = tokio::time::timeout(request.timeout(), async {
            let ((), (), status) = tokio::join!(
                read_capped(stdout, &mut out, limit),
                read_capped(stderr, &mut err, limit),
                child.wait(),
            );
            status
        })
        .await;

        let outcome = match waited {
            Ok(Ok(status)) => {
                ExecutionOutcome::from_exit_status(status, start.elapsed(), &out, &err)
            }
            Ok(Err(e)) => {
                terminate_async(&mut child, pid, self.config.termination_grace).await;
                let fault = ExecutionFault::unexpected(e);
                ExecutionOutcome::faulted(&fault, NO_EXIT_CODE, start.elapsed(), &out, &err)
            }
            Err(_elapsed) => {
                let status = terminate_async(&mut child, pid, self.config.termination_grace).await;
                let fault = ExecutionFault::Timeout {
                    timeout: request.timeout(),
                };
                let code = status.and_then(|s| s.code()).unwrap_or(NO_EXIT_CODE);
                ExecutionOutcome::faulted(&fault, code, start.elapsed(), &out, &err)
            }
        };
        guard.disarm();
        outcome
    }
}

impl CommandRunner for AsyncRunner {
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        self.run(request).await
    }
}

/// Returns the configured working directory if it is not an existing directory.
async fn missing_working_directory(request: &ExecutionRequest) -> Option<PathBuf> {
    let dir = request.working_directory()?;
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => None,
        _ => Some(dir.to_path_buf()),
    }
}

/// Read a pipe to EOF into `buf`, keeping at most `limit` bytes.
///
/// Bytes past the limit are still read and discarded so the child never
/// blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>, buf: &mut Vec<u8>, limit: u64) {
    let Some(h) = handle else {
        return;
    };
    let mut capped = h.take(limit);
    if let Err(e) = capped.read_to_end(buf).await {
        tracing::debug!(error = %e, "Output stream read failed");
    }
    let _ = tokio::io::copy(&mut capped.into_inner(), &mut tokio::io::sink()).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
