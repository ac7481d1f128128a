//! Command-line parsing for `cobalt-worker`.

use std::path::PathBuf;

use anyhow::{bail, Context};
use cobalt_core::ExecutionRequest;

/// Context id given to requests run with `exec`.
pub const EXEC_CONTEXT_ID: &str = "exec";

pub const USAGE: &str = "\
Usage:
  cobalt-worker <batch.json>
  cobalt-worker exec [--timeout <secs>] [--cwd <dir>] <command> [args...]
  cobalt-worker --help

Runs a batch of execution requests under a concurrency ceiling, or a single
command, and prints the result as JSON on stdout.";

#[derive(Debug)]
pub enum Invocation {
    /// Run every request in a batch file through the orchestrator.
    Batch { path: PathBuf },
    /// Run one command through the blocking runner.
    Exec { request: ExecutionRequest },
    Help,
}

/// Parse arguments, excluding the program name.
pub fn parse_args<I>(args: I) -> anyhow::Result<Invocation>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(first) = args.next() else {
        bail!("missing batch file or subcommand");
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Invocation::Help),
        "exec" => parse_exec(args),
        flag if flag.starts_with('-') => bail!("unknown option '{flag}'"),
        _ => {
            if let Some(extra) = args.next() {
                bail!("unexpected argument '{extra}' after batch file");
            }
            Ok(Invocation::Batch {
                path: PathBuf::from(first),
            })
        }
    }
}

fn parse_exec(mut args: impl Iterator<Item = String>) -> anyhow::Result<Invocation> {
    let mut timeout_secs: Option<f64> = None;
    let mut cwd: Option<PathBuf> = None;

    let command = loop {
        let Some(arg) = args.next() else {
            bail!("exec requires a command");
        };
        match arg.as_str() {
            "--timeout" => {
                let raw = args.next().context("--timeout requires a value")?;
                let secs = raw
                    .parse::<f64>()
                    .with_context(|| format!("--timeout must be a number of seconds, got '{raw}'"))?;
                timeout_secs = Some(secs);
            }
            "--cwd" => {
                let dir = args.next().context("--cwd requires a directory")?;
                cwd = Some(PathBuf::from(dir));
            }
            // Everything after `--` belongs to the command.
            "--" => break args.next().context("exec requires a command")?,
            flag if flag.starts_with("--") => bail!("unknown exec option '{flag}'"),
            _ => break arg,
        }
    };

    let mut builder = ExecutionRequest::builder(EXEC_CONTEXT_ID, command).args(args);
    if let Some(secs) = timeout_secs {
        builder = builder.timeout_secs(secs);
    }
    if let Some(dir) = cwd {
        builder = builder.working_directory(dir);
    }
    let request = builder.build().context("invalid exec request")?;
    Ok(Invocation::Exec { request })
}
