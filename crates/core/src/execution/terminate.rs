//! Termination ladder: graceful signal, grace period, forceful kill.
//!
//! On Unix every child is started as the leader of its own process group
//! (see [`isolate_process_group`]), so signals are delivered with `killpg`
//! and reach grandchildren too. Other platforms have no graceful signal;
//! there the ladder starts at the forceful kill.

use std::io;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

/// Interval between exit checks while a blocking caller waits out the grace.
const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Which rung of the ladder to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM: ask the process group to exit.
    Graceful,
    /// SIGKILL: stop the process group unconditionally.
    Forceful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// Nothing in the group was alive to receive the signal.
    NotRunning,
    /// The signal was delivered.
    Signalled,
    /// The platform cannot deliver this signal to a group.
    Unsupported,
}

/// Put a child in a fresh process group whose id equals its pid.
#[cfg(unix)]
pub fn isolate_process_group(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
pub fn isolate_process_group(_cmd: &mut std::process::Command) {}

/// Deliver `signal` to the process group led by `pid`.
#[cfg(unix)]
pub fn signal_process_group(pid: u32, signal: Signal) -> io::Result<KillOutcome> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let signo = match signal {
        Signal::Graceful => libc::SIGTERM,
        Signal::Forceful => libc::SIGKILL,
    };
    // SAFETY: killpg takes plain integers and has no memory-safety preconditions.
    if unsafe { libc::killpg(pgid, signo) } == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(KillOutcome::NotRunning);
        }
        return Err(err);
    }
    Ok(KillOutcome::Signalled)
}

#[cfg(not(unix))]
pub fn signal_process_group(_pid: u32, _signal: Signal) -> io::Result<KillOutcome> {
    Ok(KillOutcome::Unsupported)
}

fn deliver(pid: u32, signal: Signal) -> KillOutcome {
    match signal_process_group(pid, signal) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(pid, ?signal, error = %e, "Failed to signal process group");
            KillOutcome::Unsupported
        }
    }
}

// ---------------------------------------------------------------------------
// GroupGuard
// ---------------------------------------------------------------------------

/// Kills a child's process group on drop unless disarmed.
///
/// Held by the async runner for the lifetime of a child so that a caller
/// dropping the run future mid-flight does not leak grandchildren; tokio's
/// `kill_on_drop` only reaches the group leader.
#[derive(Debug)]
pub struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    #[must_use]
    pub fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// Call once the child has been reaped and its group swept.
    pub fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            deliver(pid, Signal::Forceful);
        }
    }
}

// ---------------------------------------------------------------------------
// Async ladder
// ---------------------------------------------------------------------------

/// Terminate a child owned by the async runner and reap it.
///
/// `pid` is the id captured right after spawn; tokio forgets it once the
/// leader has been reaped, but the group may still hold stragglers.
/// Returns the exit status if one could be collected.
pub async fn terminate_async(
    child: &mut tokio::process::Child,
    pid: Option<u32>,
    grace: Duration,
) -> Option<ExitStatus> {
    let mut status = child.try_wait().ok().flatten();

    if status.is_none() {
        let graceful = pid.map_or(KillOutcome::Unsupported, |pid| deliver(pid, Signal::Graceful));
        if graceful == KillOutcome::Signalled {
            if let Ok(Ok(exited)) = tokio::time::timeout(grace, child.wait()).await {
                status = Some(exited);
            }
        }
    }

    // Sweep the group even if the leader already exited: stragglers may remain.
    if let Some(pid) = pid {
        deliver(pid, Signal::Forceful);
    }

    if status.is_none() {
        if let Err(e) = child.start_kill() {
            tracing::debug!(error = %e, "start_kill after group kill");
        }
        status = child.wait().await.ok();
    }
    status
}

// ---------------------------------------------------------------------------
// Blocking ladder
// ---------------------------------------------------------------------------

/// Terminate a child owned by the sync runner and reap it.
pub fn terminate_blocking(child: &mut std::process::Child, grace: Duration) -> Option<ExitStatus> {
    let pid = child.id();
    let mut status = child.try_wait().ok().flatten();

    if status.is_none() && deliver(pid, Signal::Graceful) == KillOutcome::Signalled {
        let deadline = Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(exited)) => {
                    status = Some(exited);
                    break;
                }
                Ok(None) if Instant::now() < deadline => std::thread::sleep(BLOCKING_POLL_INTERVAL),
                _ => break,
            }
        }
    }

    deliver(pid, Signal::Forceful);

    if status.is_none() {
        if let Err(e) = child.kill() {
            tracing::debug!(error = %e, "kill after group kill");
        }
        status = child.wait().ok();
    }
    status
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
