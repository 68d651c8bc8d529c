//! Metadata index error types.

use thiserror::Error;

/// Metadata index operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    /// The backing store could not be reached. Not retried here.
    #[error("backing store unavailable: {0}")]
    Transient(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadataError::NotFound(_))
    }
}

impl From<redis::RedisError> for MetadataError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
        {
            MetadataError::Transient(err.to_string())
        } else {
            MetadataError::Backend(err.to_string())
        }
    }
}

impl From<ibed_core::Error> for MetadataError {
    fn from(err: ibed_core::Error) -> Self {
        match err {
            ibed_core::Error::Io(e) => MetadataError::Internal(e.to_string()),
            other => MetadataError::Invalid(other.to_string()),
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
