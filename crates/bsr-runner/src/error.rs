//! Runner errors

use bsr_core::BsrError;
use thiserror::Error;

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors surfaced by the batch runner
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Invalid construction parameters; raised before any unit runs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Checkpoint state addressed with the wrong key form, or a store opened
    /// with a different addressing mode than it was created with
    #[error("Resume integrity error: {0}")]
    ResumeIntegrity(String),

    /// The execution primitive kept failing after every retry
    #[error("Execution failed after {attempts} attempt(s): {source}")]
    Execution {
        attempts: u32,
        #[source]
        source: BsrError,
    },

    /// A persisted log line could not be parsed back into an entry
    #[error("Malformed log line {line_number}: {reason}: [{line}]")]
    LogParse {
        line_number: usize,
        line: String,
        reason: String,
    },

    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RunnerError {
    fn from(err: rusqlite::Error) -> Self {
        RunnerError::Storage(err.to_string())
    }
}
