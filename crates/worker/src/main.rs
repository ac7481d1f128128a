//! `cobalt-worker` -- runs execution requests on this host.
//!
//! Reads a batch file and fans its requests out under a concurrency
//! ceiling, or runs a single command with `exec`. The result is printed as
//! JSON on stdout; logs go to stderr.
//!
//! # Environment variables
//!
//! | Variable                      | Default  | Description                               |
//! |-------------------------------|----------|-------------------------------------------|
//! | `COBALT_MAX_CONCURRENCY`      | `10`     | Max simultaneously running commands       |
//! | `COBALT_TERMINATION_GRACE_MS` | `100`    | SIGTERM-to-SIGKILL wait on timeout        |
//! | `COBALT_LOG_FORMAT`           | `pretty` | `pretty` or `json`                        |
//! | `RUST_LOG`                    | `cobalt_worker=info,cobalt_core=info` | Log filter   |
//!
//! # Exit codes
//!
//! `0` success, `1` completed with errors (or the command failed), `2` fatal
//! error, usage error or invalid configuration.

use cobalt_worker::cli::{self, Invocation};
use cobalt_worker::config::{LogFormat, WorkerConfig};
use cobalt_worker::report::{self, EXIT_FATAL, EXIT_SUCCESS};
use cobalt_worker::{logging, run_batch_file, run_exec};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init(LogFormat::default());
            tracing::error!(error = %format!("{e:#}"), "Invalid configuration");
            return EXIT_FATAL;
        }
    };
    logging::init(config.log_format);

    let invocation = match cli::parse_args(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("error: {e:#}\n\n{}", cli::USAGE);
            return EXIT_FATAL;
        }
    };

    match invocation {
        Invocation::Help => {
            println!("{}", cli::USAGE);
            EXIT_SUCCESS
        }
        Invocation::Batch { path } => {
            tracing::info!(
                path = %path.display(),
                max_concurrency = config.max_concurrency,
                "Starting cobalt-worker batch",
            );
            match run_batch_file(&path, &config).await {
                Ok(state) => emit(&state, report::workflow_exit_code(state.status())),
                Err(e) => {
                    tracing::error!(error = %format!("{e:#}"), "Batch could not be run");
                    EXIT_FATAL
                }
            }
        }
        Invocation::Exec { request } => match run_exec(request, &config).await {
            Ok(outcome) => emit(&outcome, report::outcome_exit_code(&outcome)),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Command could not be run");
                EXIT_FATAL
            }
        },
    }
}

/// Print `value` as JSON and return `code`, or `EXIT_FATAL` if it cannot be
/// serialized.
fn emit<T: serde::Serialize>(value: &T, code: i32) -> i32 {
    match report::render_json(value) {
        Ok(json) => {
            println!("{json}");
            code
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Failed to write report");
            EXIT_FATAL
        }
    }
}
