//! Engine error types.

use ibed_metadata::MetadataError;
use ibed_storage::StorageError;

/// Coarse error classification for callers mapping errors to responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    /// Backing store unreachable; the caller may retry.
    Transient,
    /// The request itself was rejected.
    Invalid,
    Internal,
}

/// Engine error type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("core error: {0}")]
    Core(#[from] ibed_core::Error),
}

impl EngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PayloadTooLarge { .. } => ErrorKind::Invalid,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => ErrorKind::NotFound,
                StorageError::InvalidKey(_) => ErrorKind::Invalid,
                _ => ErrorKind::Internal,
            },
            Self::Metadata(e) => match e {
                MetadataError::NotFound(_) => ErrorKind::NotFound,
                MetadataError::Conflict(_) => ErrorKind::Conflict,
                MetadataError::Invalid(_) => ErrorKind::Invalid,
                MetadataError::Transient(_) => ErrorKind::Transient,
                _ => ErrorKind::Internal,
            },
            Self::Core(e) => match e {
                ibed_core::Error::Io(_) => ErrorKind::Internal,
                _ => ErrorKind::Invalid,
            },
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Storage(_) => "storage_error",
            Self::Metadata(MetadataError::Conflict(_)) => "conflict",
            Self::Metadata(MetadataError::Transient(_)) => "unavailable",
            Self::Metadata(_) => "metadata_error",
            Self::Core(ibed_core::Error::UnsupportedMedia) => "unsupported_media",
            Self::Core(_) => "core_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
