//! Error types for tidemark-core

use thiserror::Error;

/// Result type alias using tidemark-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tidemark-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote service unreachable or returned a failure. Retryable; never
    /// corrupts local state.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Local store failure (disk, schema, connection)
    #[error("Local store error: {0}")]
    LocalStore(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Malformed stored or transmitted JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blob upload/download failure
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record or object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
