//! Blocking runner.
//!
//! [`SyncRunner::run`] parks the calling thread until the child exits, the
//! deadline passes, or the spawn fails. Output is drained by two helper
//! threads while the calling thread polls for exit, so a child that fills a
//! pipe buffer cannot stall. Do not call this from inside an async batch;
//! use [`AsyncRunner`](super::AsyncRunner) there.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::RunnerConfig;

use super::environment::BaseEnvironment;
use super::fault::ExecutionFault;
use super::outcome::{ExecutionOutcome, NO_EXIT_CODE};
use super::request::ExecutionRequest;
use super::terminate::{isolate_process_group, terminate_blocking};
use super::log_outcome;

/// How often the calling thread checks for child exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for the reader threads after the child has been killed.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Bytes collected from each pipe so far.
#[derive(Default)]
struct Captured {
    stdout: Option<Vec<u8>>,
    stderr: Option<Vec<u8>>,
}

impl Captured {
    fn store(&mut self, stream: Stream, bytes: Vec<u8>) {
        match stream {
            Stream::Stdout => self.stdout = Some(bytes),
            Stream::Stderr => self.stderr = Some(bytes),
        }
    }

    fn complete(&self) -> bool {
        self.stdout.is_some() && self.stderr.is_some()
    }

    fn stdout(&self) -> &[u8] {
        self.stdout.as_deref().unwrap_or_default()
    }

    fn stderr(&self) -> &[u8] {
        self.stderr.as_deref().unwrap_or_default()
    }
}

/// How the wait loop ended.
enum WaitEnd {
    Exited(ExitStatus),
    DeadlineExceeded,
    Failed(std::io::Error),
}

/// Executes requests on the calling thread.
#[derive(Debug, Clone)]
pub struct SyncRunner {
    base_env: BaseEnvironment,
    config: RunnerConfig,
}

/// Inherits the current process environment, default [`RunnerConfig`].
impl Default for SyncRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl SyncRunner {
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

    /// Execute `request` and block until it resolves.
    ///
    /// Never fails: every fault is folded into the returned outcome.
    pub fn run(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let start = Instant::now();
        let outcome = self.execute(request, start);
        log_outcome(request, &outcome);
        outcome
    }

    fn execute(&self, request: &ExecutionRequest, start: Instant) -> ExecutionOutcome {
        if let Some(path) = missing_working_directory(request) {
            let fault = ExecutionFault::WorkingDirectoryNotFound { path };
            return ExecutionOutcome::faulted(&fault, NO_EXIT_CODE, start.elapsed(), b"", b"");
        }

        let mut cmd = Command::new(request.command());
        cmd.args(request.args())
            .env_clear()
            .envs(self.base_env.with_overrides(request.env_overrides()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = request.working_directory() {
            cmd.current_dir(dir);
        }
        isolate_process_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let fault = ExecutionFault::from_spawn_error(request.command(), e);
                return ExecutionOutcome::faulted(&fault, NO_EXIT_CODE, start.elapsed(), b"", b"");
            }
        };
        tracing::debug!(
            context_id = %request.context_id(),
            pid = child.id(),
            "Spawned child process",
        );

        let readers = match self.spawn_readers(&mut child) {
            Ok(rx) => rx,
            Err(e) => {
                terminate_blocking(&mut child, self.config.termination_grace);
                let fault = ExecutionFault::unexpected(e);
                return ExecutionOutcome::faulted(&fault, NO_EXIT_CODE, start.elapsed(), b"", b"");
            }
        };

        // `None` when the timeout is too large to represent as an instant.
        let deadline = start.checked_add(request.timeout());
        let mut captured = Captured::default();
        let end = wait_until(&mut child, &readers, &mut captured, deadline);

        match end {
            WaitEnd::Exited(status) => ExecutionOutcome::from_exit_status(
                status,
                start.elapsed(),
                captured.stdout(),
                captured.stderr(),
            ),
            WaitEnd::DeadlineExceeded => {
                let status = terminate_blocking(&mut child, self.config.termination_grace);
                drain_remaining(&readers, &mut captured, Instant::now() + OUTPUT_DRAIN_GRACE);
                let fault = ExecutionFault::Timeout {
                    timeout: request.timeout(),
                };
                let code = status.and_then(|s| s.code()).unwrap_or(NO_EXIT_CODE);
                ExecutionOutcome::faulted(
                    &fault,
                    code,
                    start.elapsed(),
                    captured.stdout(),
                    captured.stderr(),
                )
            }
            WaitEnd::Failed(e) => {
                terminate_blocking(&mut child, self.config.termination_grace);
                drain_remaining(&readers, &mut captured, Instant::now() + OUTPUT_DRAIN_GRACE);
                let fault = ExecutionFault::unexpected(e);
                ExecutionOutcome::faulted(
                    &fault,
                    NO_EXIT_CODE,
                    start.elapsed(),
                    captured.stdout(),
                    captured.stderr(),
                )
            }
        }
    }

    /// Start one reader thread per pipe; each sends its bytes once EOF is hit.
    fn spawn_readers(&self, child: &mut Child) -> std::io::Result<Receiver<(Stream, Vec<u8>)>> {
        let (tx, rx) = mpsc::channel();
        let limit = self.config.max_output_bytes as u64;

        let stdout: Option<ChildStdout> = child.stdout.take();
        let stdout_tx = tx.clone();
        thread::Builder::new()
            .name("cobalt-stdout".to_string())
            .spawn(move || {
                let _ = stdout_tx.send((Stream::Stdout, read_capped(stdout, limit)));
            })?;

        let stderr: Option<ChildStderr> = child.stderr.take();
        thread::Builder::new()
            .name("cobalt-stderr".to_string())
            .spawn(move || {
                let _ = tx.send((Stream::Stderr, read_capped(stderr, limit)));
            })?;

        Ok(rx)
    }
}

/// Returns the configured working directory if it is not an existing directory.
fn missing_working_directory(request: &ExecutionRequest) -> Option<PathBuf> {
    let dir = request.working_directory()?;
    if dir.is_dir() {
        None
    } else {
        Some(dir.to_path_buf())
    }
}

/// Wait for both exit and EOF on both pipes, or for the deadline.
///
/// A `None` deadline never expires.
fn wait_until(
    child: &mut Child,
    readers: &Receiver<(Stream, Vec<u8>)>,
    captured: &mut Captured,
    deadline: Option<Instant>,
) -> WaitEnd {
    let mut exit = None;
    loop {
        if exit.is_none() {
            match child.try_wait() {
                Ok(status) => exit = status,
                Err(e) => return WaitEnd::Failed(e),
            }
        }
        if let Some(status) = exit {
            if captured.complete() {
                return WaitEnd::Exited(status);
            }
        }

        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return WaitEnd::DeadlineExceeded;
                }
                POLL_INTERVAL.min(deadline - now)
            }
            None => POLL_INTERVAL,
        };
        match readers.recv_timeout(wait) {
            Ok((stream, bytes)) => captured.store(stream, bytes),
            Err(RecvTimeoutError::Timeout) => {}
            // Both senders gone means both pipes were delivered already.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(wait),
        }
    }
}

/// Collect whatever the reader threads deliver before `until`.
fn drain_remaining(
    readers: &Receiver<(Stream, Vec<u8>)>,
    captured: &mut Captured,
    until: Instant,
) {
    while !captured.complete() {
        let now = Instant::now();
        if now >= until {
            break;
        }
        match readers.recv_timeout(until - now) {
            Ok((stream, bytes)) => captured.store(stream, bytes),
            Err(_) => break,
        }
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes.
fn read_capped<R: Read>(handle: Option<R>, limit: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let mut capped = h.take(limit);
        let _ = capped.read_to_end(&mut buf);
        // Keep draining past the cap so the child never blocks on a full pipe.
        let _ = std::io::copy(&mut capped.into_inner(), &mut std::io::sink());
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
