use std::time::Duration;

use anyhow::{bail, Context};
use cobalt_core::config::{DEFAULT_MAX_CONCURRENCY, DEFAULT_TERMINATION_GRACE};
use cobalt_core::{RunnerConfig, WorkflowConfig};

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable `fmt` output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format '{other}', expected 'pretty' or 'json'"),
        }
    }
}

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for local use.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Orchestrator permit ceiling (default: `10`).
    pub max_concurrency: usize,
    /// Wait between graceful and forceful termination (default: `100ms`).
    pub termination_grace: Duration,
    /// Log output format (default: `pretty`).
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            log_format: LogFormat::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default  |
    /// |-------------------------------|----------|
    /// | `COBALT_MAX_CONCURRENCY`      | `10`     |
    /// | `COBALT_TERMINATION_GRACE_MS` | `100`    |
    /// | `COBALT_LOG_FORMAT`           | `pretty` |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrency = match lookup("COBALT_MAX_CONCURRENCY") {
            Some(raw) => {
                let value: usize = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("COBALT_MAX_CONCURRENCY must be a positive integer, got '{raw}'"))?;
                if value == 0 {
                    bail!("COBALT_MAX_CONCURRENCY must be at least 1");
                }
                value
            }
            None => defaults.max_concurrency,
        };

        let termination_grace = match lookup("COBALT_TERMINATION_GRACE_MS") {
            Some(raw) => {
                let millis: u64 = raw.trim().parse().with_context(|| {
                    format!("COBALT_TERMINATION_GRACE_MS must be a whole number of milliseconds, got '{raw}'")
                })?;
                Duration::from_millis(millis)
            }
            None => defaults.termination_grace,
        };

        let log_format = match lookup("COBALT_LOG_FORMAT") {
            Some(raw) => raw.parse().context("invalid COBALT_LOG_FORMAT")?,
            None => defaults.log_format,
        };

        Ok(Self {
            max_concurrency,
            termination_grace,
            log_format,
        })
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            termination_grace: self.termination_grace,
            ..RunnerConfig::default()
        }
    }

    /// Workflow settings, letting a batch file override the ceiling.
    pub fn workflow_config(&self, batch_override: Option<usize>) -> anyhow::Result<WorkflowConfig> {
        let max_concurrency = batch_override.unwrap_or(self.max_concurrency);
        WorkflowConfig::new(max_concurrency).context("invalid max_concurrency")
    }
}
