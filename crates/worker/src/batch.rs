//! Batch files consumed by `cobalt-worker <batch.json>`.
//!
//! Two shapes are accepted:
//!
//! ```json
//! [{"context_id": "build", "command": "make"}]
//! ```
//!
//! ```json
//! {"max_concurrency": 4, "requests": [{"context_id": "build", "command": "make"}]}
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use cobalt_core::ExecutionRequest;

/// A parsed batch: the requests plus an optional ceiling override.
#[derive(Debug, Clone)]
pub struct Batch {
    pub max_concurrency: Option<usize>,
    pub requests: Vec<ExecutionRequest>,
}

impl Batch {
    /// Parse a batch from JSON text.
    ///
    /// Every request is validated while parsing; the first invalid one fails
    /// the whole batch with its index in the error.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).context("batch is not valid JSON")?;

        match value {
            serde_json::Value::Array(items) => Ok(Self {
                max_concurrency: None,
                requests: parse_requests(items)?,
            }),
            serde_json::Value::Object(mut fields) => {
                let max_concurrency = match fields.remove("max_concurrency") {
                    None | Some(serde_json::Value::Null) => None,
                    Some(raw) => Some(
                        serde_json::from_value::<usize>(raw)
                            .context("max_concurrency must be a non-negative integer")?,
                    ),
                };
                let requests = match fields.remove("requests") {
                    Some(serde_json::Value::Array(items)) => parse_requests(items)?,
                    Some(_) => bail!("'requests' must be an array"),
                    None => bail!("batch object is missing 'requests'"),
                };
                Ok(Self {
                    max_concurrency,
                    requests,
                })
            }
            _ => bail!("batch must be an array of requests or an object with 'requests'"),
        }
    }

    /// Read and parse a batch file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read batch file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid batch file {}", path.display()))
    }
}

fn parse_requests(items: Vec<serde_json::Value>) -> anyhow::Result<Vec<ExecutionRequest>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item).with_context(|| format!("invalid request at index {i}"))
        })
        .collect()
}
