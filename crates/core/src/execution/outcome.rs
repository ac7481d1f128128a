//! The output half of the execution contract.

use std::process::ExitStatus;
use std::time::Duration;

use serde::Serialize;

use super::fault::ExecutionFault;

/// Exit code recorded when no exit code could be obtained (spawn failure or
/// a process killed by a signal).
pub const NO_EXIT_CODE: i32 = -1;

/// Terminal state of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The process exited with code 0.
    Success,
    /// The process could not be started, exited non-zero, or hit a system error.
    Failure,
    /// The process exceeded its deadline and was terminated.
    Timeout,
    /// The runner itself faulted (e.g. panicked) before producing an outcome.
    Error,
}

impl ExecutionStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Terminal, fully-resolved result of one request.
///
/// Only runners construct outcomes. Every constructor keeps the pairing
/// `status != Success` ⇔ `error_message.is_some()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    status: ExecutionStatus,
    exit_code: i32,
    duration_secs: f64,
    stdout: String,
    stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl ExecutionOutcome {
    /// Outcome for a process that ran and exited with `exit_code`.
    ///
    /// A zero code yields [`ExecutionStatus::Success`]; anything else is a
    /// [`ExecutionStatus::Failure`] naming the code.
    pub(crate) fn exited(exit_code: i32, duration: Duration, stdout: &[u8], stderr: &[u8]) -> Self {
        if exit_code == 0 {
            Self {
                status: ExecutionStatus::Success,
                exit_code,
                duration_secs: duration.as_secs_f64(),
                stdout: decode_output(stdout),
                stderr: decode_output(stderr),
                error_message: None,
            }
        } else {
            Self::faulted(
                &ExecutionFault::NonZeroExit { code: exit_code },
                exit_code,
                duration,
                stdout,
                stderr,
            )
        }
    }

    /// Outcome for a reaped process, telling an exit code apart from a
    /// terminating signal.
    pub(crate) fn from_exit_status(
        status: ExitStatus,
        duration: Duration,
        stdout: &[u8],
        stderr: &[u8],
    ) -> Self {
        match status.code() {
            Some(code) => Self::exited(code, duration, stdout, stderr),
            None => Self::faulted(
                &ExecutionFault::Signalled {
                    signal: terminating_signal(status),
                },
                NO_EXIT_CODE,
                duration,
                stdout,
                stderr,
            ),
        }
    }

    /// Outcome for a fault, with whatever output was captured.
    pub(crate) fn faulted(
        fault: &ExecutionFault,
        exit_code: i32,
        duration: Duration,
        stdout: &[u8],
        stderr: &[u8],
    ) -> Self {
        Self {
            status: fault.status(),
            exit_code,
            duration_secs: duration.as_secs_f64(),
            stdout: decode_output(stdout),
            stderr: decode_output(stderr),
            error_message: Some(fault.to_string()),
        }
    }

    /// Outcome for a request whose runner faulted without resolving.
    pub(crate) fn internal_error(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: ExecutionStatus::Error,
            exit_code: NO_EXIT_CODE,
            duration_secs: duration.as_secs_f64(),
            stdout: String::new(),
            stderr: String::new(),
            error_message: Some(message.into()),
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Process exit code, or [`NO_EXIT_CODE`] when none was obtained.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Wall-clock time from dispatch to resolution.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Captured stdout, trimmed. On a timeout this may be partial or empty.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured stderr, trimmed. On a timeout this may be partial or empty.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Diagnostic, present exactly when the status is not `Success`.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(unix)]
fn terminating_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Decode captured bytes lossily and trim surrounding whitespace.
fn decode_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// First `max_chars` characters of `text`, for log previews.
pub(crate) fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_exit_is_success_without_message() {
        let outcome = ExecutionOutcome::exited(0, Duration::from_millis(5), b" hello\n", b"");
        assert_eq!(outcome.status(), ExecutionStatus::Success);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.stdout(), "hello");
        assert!(outcome.error_message().is_none());
        assert!(outcome.duration_secs() >= 0.0);
    }

    #[test]
    fn non_zero_exit_is_failure_naming_the_code() {
        let outcome = ExecutionOutcome::exited(3, Duration::ZERO, b"", b"boom\n");
        assert_eq!(outcome.status(), ExecutionStatus::Failure);
        assert_eq!(outcome.exit_code(), 3);
        assert_eq!(outcome.stderr(), "boom");
        assert_eq!(
            outcome.error_message(),
            Some("Command exited with non-zero code 3.")
        );
    }

    #[cfg(unix)]
    #[test]
    fn signal_termination_names_the_signal() {
        use std::os::unix::process::ExitStatusExt;

        // Raw wait status 9: terminated by SIGKILL.
        let status = ExitStatus::from_raw(9);
        let outcome = ExecutionOutcome::from_exit_status(status, Duration::ZERO, b"", b"");
        assert_eq!(outcome.status(), ExecutionStatus::Failure);
        assert_eq!(outcome.exit_code(), NO_EXIT_CODE);
        assert_eq!(
            outcome.error_message(),
            Some("Command was terminated by signal 9.")
        );
    }

    #[cfg(unix)]
    #[test]
    fn normal_exit_status_keeps_the_code() {
        use std::os::unix::process::ExitStatusExt;

        // Raw wait status for exit code 2.
        let status = ExitStatus::from_raw(2 << 8);
        let outcome = ExecutionOutcome::from_exit_status(status, Duration::ZERO, b"", b"");
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(
            outcome.error_message(),
            Some("Command exited with non-zero code 2.")
        );
    }

    #[test]
    fn faulted_outcome_takes_status_from_fault() {
        let fault = ExecutionFault::Timeout {
            timeout: Duration::from_secs(2),
        };
        let outcome =
            ExecutionOutcome::faulted(&fault, NO_EXIT_CODE, Duration::from_secs(2), b"par", b"");
        assert_eq!(outcome.status(), ExecutionStatus::Timeout);
        assert_eq!(outcome.exit_code(), -1);
        assert_eq!(outcome.stdout(), "par");
        assert!(outcome.error_message().is_some_and(|m| m.contains('2')));
    }

    #[test]
    fn internal_error_has_message_and_sentinel_code() {
        let outcome = ExecutionOutcome::internal_error("runner panicked", Duration::ZERO);
        assert_eq!(outcome.status(), ExecutionStatus::Error);
        assert_eq!(outcome.exit_code(), NO_EXIT_CODE);
        assert_eq!(outcome.error_message(), Some("runner panicked"));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let outcome = ExecutionOutcome::exited(0, Duration::ZERO, &[0x66, 0xff, 0x6f], b"");
        assert_eq!(outcome.stdout(), "f\u{fffd}o");
    }

    #[test]
    fn serializes_status_in_screaming_case() {
        let outcome = ExecutionOutcome::exited(0, Duration::ZERO, b"ok", b"");
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["stdout"], "ok");
        assert!(json.get("error_message").is_none());
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("hi", 200), "hi");
    }
}
