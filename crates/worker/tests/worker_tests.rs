//! Integration tests for the worker library and the `cobalt-worker` binary.

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output};

use cobalt_core::{ExecutionStatus, WorkflowStatus};
use cobalt_worker::batch::Batch;
use cobalt_worker::config::WorkerConfig;
use cobalt_worker::{run_batch, run_batch_file, run_exec};

fn write_batch(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("batch.json");
    std::fs::write(&path, body).expect("write batch file");
    path
}

/// Run the worker binary from an empty directory with a clean environment.
fn worker(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cobalt-worker"))
        .args(args)
        .current_dir(dir)
        .env_remove("COBALT_MAX_CONCURRENCY")
        .env_remove("COBALT_TERMINATION_GRACE_MS")
        .env_remove("COBALT_LOG_FORMAT")
        .env("RUST_LOG", "off")
        .output()
        .expect("run cobalt-worker")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ---------------------------------------------------------------------------
// Test: library entry points
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_file_runs_through_orchestrator() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_batch(
        dir.path(),
        r#"{"max_concurrency": 2, "requests": [
            {"context_id": "one", "command": "echo", "args": ["1"]},
            {"context_id": "two", "command": "echo", "args": ["2"]},
            {"context_id": "three", "command": "sh", "args": ["-c", "exit 7"]}
        ]}"#,
    );

    let state = run_batch_file(&path, &WorkerConfig::default())
        .await
        .expect("batch runs");

    assert_eq!(state.status(), WorkflowStatus::CompletedWithErrors);
    assert_eq!(state.max_concurrency(), 2);
    assert_eq!(state.outcome("one").map(|o| o.stdout()), Some("1"));
    assert_eq!(state.outcome("three").map(|o| o.exit_code()), Some(7));
}

#[tokio::test]
async fn zero_ceiling_override_is_rejected_before_dispatch() {
    let batch = Batch::from_json(r#"{"max_concurrency": 0, "requests": []}"#).expect("parse");
    assert!(run_batch(batch, &WorkerConfig::default()).await.is_err());
}

#[tokio::test]
async fn missing_batch_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = run_batch_file(&dir.path().join("absent.json"), &WorkerConfig::default())
        .await
        .expect_err("missing file");
    assert!(format!("{err:#}").contains("absent.json"));
}

#[tokio::test]
async fn exec_uses_blocking_runner() {
    let request = cobalt_core::ExecutionRequest::builder("exec", "echo")
        .arg("blocking")
        .build()
        .expect("valid request");
    let outcome = run_exec(request, &WorkerConfig::default())
        .await
        .expect("exec runs");
    assert_eq!(outcome.status(), ExecutionStatus::Success);
    assert_eq!(outcome.stdout(), "blocking");
}

// ---------------------------------------------------------------------------
// Test: binary exit codes and output
// ---------------------------------------------------------------------------

#[test]
fn successful_batch_exits_zero_and_prints_state() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_batch(
        dir.path(),
        r#"[{"context_id": "a", "command": "echo", "args": ["alpha"]}]"#,
    );

    let output = worker(dir.path(), &[path.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(0));
    let json = stdout_json(&output);
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["outcomes"]["a"]["stdout"], "alpha");
}

#[test]
fn batch_with_failure_exits_one() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_batch(
        dir.path(),
        r#"[{"context_id": "ok", "command": "true"},
            {"context_id": "bad", "command": "false"}]"#,
    );

    let output = worker(dir.path(), &[path.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["status"], "COMPLETED_WITH_ERRORS");
}

#[test]
fn duplicate_ids_exit_two() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_batch(
        dir.path(),
        r#"[{"context_id": "x", "command": "true"},
            {"context_id": "x", "command": "true"}]"#,
    );

    let output = worker(dir.path(), &[path.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["status"], "FATAL_ERROR");
    assert!(json["fatal_error"].as_str().is_some_and(|m| m.contains('x')));
}

#[test]
fn invalid_batch_file_exits_two_without_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_batch(dir.path(), r#"[{"context_id": "a", "command": ""}]"#);

    let output = worker(dir.path(), &[path.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn exec_reports_outcome_and_exit_code() {
    let dir = tempfile::tempdir().expect("temp dir");

    let ok = worker(dir.path(), &["exec", "echo", "hi"]);
    assert_eq!(ok.status.code(), Some(0));
    assert_eq!(stdout_json(&ok)["stdout"], "hi");

    let failed = worker(dir.path(), &["exec", "sh", "-c", "exit 3"]);
    assert_eq!(failed.status.code(), Some(1));
    let json = stdout_json(&failed);
    assert_eq!(json["status"], "FAILURE");
    assert_eq!(json["exit_code"], 3);
}

#[test]
fn exec_timeout_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = worker(dir.path(), &["exec", "--timeout", "0.5", "sleep", "10"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["status"], "TIMEOUT");
}

#[test]
fn usage_error_exits_two() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = worker(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn invalid_configuration_exits_two() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = Command::new(env!("CARGO_BIN_EXE_cobalt-worker"))
        .args(["exec", "true"])
        .current_dir(dir.path())
        .env("COBALT_MAX_CONCURRENCY", "0")
        .env("RUST_LOG", "off")
        .output()
        .expect("run cobalt-worker");
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}
