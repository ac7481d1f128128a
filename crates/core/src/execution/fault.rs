//! Closed set of per-request faults a runner can encounter.
//!
//! Runners classify every failure into an [`ExecutionFault`] and immediately
//! fold it into an [`ExecutionOutcome`](super::ExecutionOutcome); a fault
//! never propagates past the runner boundary.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use super::outcome::ExecutionStatus;

/// Everything that can go wrong while executing one request.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionFault {
    /// The executable could not be located on `PATH` or at the given path.
    #[error("Executable not found: {command}. Check PATH or working directory.")]
    ExecutableNotFound { command: String },

    /// The executable exists but may not be run by this user.
    #[error("Executable is not runnable: {command} (permission denied).")]
    PermissionDenied { command: String },

    /// The requested working directory does not exist or is not a directory.
    #[error("Working directory not found: {}.", path.display())]
    WorkingDirectoryNotFound { path: PathBuf },

    /// The process ran to completion and exited with a non-zero code.
    #[error("Command exited with non-zero code {code}.")]
    NonZeroExit { code: i32 },

    /// The process was stopped by a signal before it could exit.
    #[error("Command was terminated by signal {}.", signal.map_or_else(|| "unknown".to_string(), |s| s.to_string()))]
    Signalled { signal: Option<i32> },

    /// The process exceeded its deadline and was terminated.
    #[error("Command timed out after {} seconds. Process was terminated.", format_secs(*timeout))]
    Timeout { timeout: Duration },

    /// Any other failure while creating the process.
    #[error("Failed to start process: {kind:?}: {source}")]
    Spawn {
        kind: io::ErrorKind,
        #[source]
        source: io::Error,
    },

    /// Any other failure after the process was created.
    #[error("Unexpected system error during execution: {kind:?}: {source}")]
    Unexpected {
        kind: io::ErrorKind,
        #[source]
        source: io::Error,
    },
}

impl ExecutionFault {
    /// Classify an error returned by a spawn call.
    pub fn from_spawn_error(command: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::ExecutableNotFound {
                command: command.to_string(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                command: command.to_string(),
            },
            kind => Self::Spawn { kind, source: err },
        }
    }

    /// Wrap an error raised while waiting on or talking to a live process.
    pub fn unexpected(err: io::Error) -> Self {
        Self::Unexpected {
            kind: err.kind(),
            source: err,
        }
    }

    /// Terminal status this fault resolves to.
    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Timeout { .. } => ExecutionStatus::Timeout,
            Self::ExecutableNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::WorkingDirectoryNotFound { .. }
            | Self::NonZeroExit { .. }
            | Self::Signalled { .. }
            | Self::Spawn { .. }
            | Self::Unexpected { .. } => ExecutionStatus::Failure,
        }
    }
}

/// Render a duration as seconds without a trailing `.0` for whole values.
pub(crate) fn format_secs(duration: Duration) -> String {
    format!("{}", duration.as_secs_f64())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
