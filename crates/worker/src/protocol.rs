//! Newline-delimited JSON protocol between the engine and a worker process.
//!
//! Each line is one tagged JSON object. The engine writes [`WorkerCommand`]s
//! to the worker's stdin; the worker writes [`WorkerEvent`]s to stdout. Logs
//! never go to stdout.

use relax_core::job::Job;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Engine to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Relax this PENDING job.
    Run { job: Box<Job> },
}

/// Worker to engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// The relaxer is built; the worker accepts tasks from now on.
    Ready,
    /// Full job state after a change.
    Snapshot { job: Box<Job> },
}

/// Transport failures on either side of the pipe.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed worker message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("worker protocol violation: {0}")]
    Protocol(String),
}

/// Serialize `message` as one line, including the trailing newline.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, WorkerError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line, ignoring surrounding whitespace.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, WorkerError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(WorkerError::Protocol("empty line".into()));
    }
    Ok(serde_json::from_str(trimmed)?)
}
