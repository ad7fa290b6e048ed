use thiserror::Error;

/// Errors raised by drivers and connections.
///
/// Driver messages are kept as plain strings so a failure can be logged and
/// retried without holding onto driver-specific error values.
#[derive(Error, Debug)]
pub enum BsrError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// The database rejected the SQL text
    #[error("Query error: {0}")]
    Query(String),

    /// Malformed or unknown connection target
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

impl BsrError {
    /// The connection itself failed, as opposed to the SQL it was given
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BsrError>;
