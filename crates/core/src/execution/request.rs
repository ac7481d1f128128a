//! The input half of the execution contract.
//!
//! An [`ExecutionRequest`] can only be obtained through
//! [`ExecutionRequestBuilder::build`] or by deserializing an
//! [`ExecutionRequestSpec`]; both paths run the same validation, so a request
//! that reaches a runner always has a non-empty command and a positive
//! timeout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Timeout applied when the caller does not specify one.
pub const DEFAULT_TIMEOUT_SECS: f64 = 300.0;

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

// ---------------------------------------------------------------------------
// ExecutionRequest
// ---------------------------------------------------------------------------

/// One external-command invocation to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExecutionRequestSpec", into = "ExecutionRequestSpec")]
pub struct ExecutionRequest {
    command: String,
    args: Vec<String>,
    working_directory: Option<PathBuf>,
    timeout: Duration,
    env_overrides: BTreeMap<String, String>,
    context_id: String,
}

impl ExecutionRequest {
    /// Start building a request for `command`, correlated by `context_id`.
    pub fn builder(
        context_id: impl Into<String>,
        command: impl Into<String>,
    ) -> ExecutionRequestBuilder {
        ExecutionRequestBuilder {
            spec: ExecutionRequestSpec {
                command: command.into(),
                args: Vec::new(),
                working_directory: None,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                env: BTreeMap::new(),
                context_id: context_id.into(),
            },
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Starting directory override; `None` inherits the caller's.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Variables merged on top of the inherited environment.
    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env_overrides
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }
}

// ---------------------------------------------------------------------------
// ExecutionRequestSpec (wire shape)
// ---------------------------------------------------------------------------

/// Unvalidated, serializable shape of an [`ExecutionRequest`].
///
/// ```json
/// {
///   "context_id": "build-1",
///   "command": "cargo",
///   "args": ["build", "--release"],
///   "working_directory": "/srv/component",
///   "timeout_secs": 120,
///   "env": {"RUST_LOG": "info"}
/// }
/// ```
///
/// Only `context_id` and `command` are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequestSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub context_id: String,
}

impl TryFrom<ExecutionRequestSpec> for ExecutionRequest {
    type Error = CoreError;

    fn try_from(spec: ExecutionRequestSpec) -> Result<Self, Self::Error> {
        validate_context_id(&spec.context_id)?;
        validate_command(&spec.command)?;
        let timeout = validate_timeout_secs(spec.timeout_secs)?;
        validate_env(&spec.env)?;

        Ok(Self {
            command: spec.command,
            args: spec.args,
            working_directory: spec.working_directory,
            timeout,
            env_overrides: spec.env,
            context_id: spec.context_id,
        })
    }
}

impl From<ExecutionRequest> for ExecutionRequestSpec {
    fn from(request: ExecutionRequest) -> Self {
        Self {
            command: request.command,
            args: request.args,
            working_directory: request.working_directory,
            timeout_secs: request.timeout.as_secs_f64(),
            env: request.env_overrides,
            context_id: request.context_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder returned by [`ExecutionRequest::builder`].
#[derive(Debug, Clone)]
pub struct ExecutionRequestBuilder {
    spec: ExecutionRequestSpec,
}

impl ExecutionRequestBuilder {
    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    /// Append several arguments, preserving their order.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.working_directory = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.spec.timeout_secs = secs;
        self
    }

    /// Set one environment override. A later call with the same key wins.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), value.into());
        self
    }

    /// Validate and produce the request.
    pub fn build(self) -> Result<ExecutionRequest, CoreError> {
        ExecutionRequest::try_from(self.spec)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a context id: must not be empty or whitespace only.
pub fn validate_context_id(context_id: &str) -> Result<(), CoreError> {
    if context_id.trim().is_empty() {
        return Err(CoreError::Validation(
            "context_id must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate a command: must not be empty and must not contain NUL bytes.
pub fn validate_command(command: &str) -> Result<(), CoreError> {
    if command.trim().is_empty() {
        return Err(CoreError::Validation(
            "command must not be empty".to_string(),
        ));
    }
    if command.contains('\0') {
        return Err(CoreError::Validation(
            "command must not contain NUL bytes".to_string(),
        ));
    }
    Ok(())
}

/// Validate a timeout in seconds and convert it to a [`Duration`].
///
/// Rejects zero, negative, NaN, infinite, and unrepresentable values.
pub fn validate_timeout_secs(secs: f64) -> Result<Duration, CoreError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(CoreError::Validation(format!(
            "timeout must be a positive number of seconds, got {secs}"
        )));
    }
    let timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
        CoreError::Validation(format!("timeout of {secs} seconds is out of range: {e}"))
    })?;
    if timeout.is_zero() {
        return Err(CoreError::Validation(format!(
            "timeout of {secs} seconds rounds down to zero"
        )));
    }
    Ok(timeout)
}

/// Validate environment overrides.
///
/// Rules:
/// - Keys must not be empty.
/// - Keys must not contain `=` or NUL.
/// - Values must not contain NUL.
pub fn validate_env(env: &BTreeMap<String, String>) -> Result<(), CoreError> {
    for (key, value) in env {
        if key.is_empty() {
            return Err(CoreError::Validation(
                "environment variable names must not be empty".to_string(),
            ));
        }
        if key.contains('=') || key.contains('\0') {
            return Err(CoreError::Validation(format!(
                "environment variable name '{key}' must not contain '=' or NUL"
            )));
        }
        if value.contains('\0') {
            return Err(CoreError::Validation(format!(
                "value of environment variable '{key}' must not contain NUL"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
