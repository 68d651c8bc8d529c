//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid content key: {0}")]
    InvalidContentKey(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("expiry out of range: {0}")]
    ExpiryOutOfRange(String),

    #[error("unsupported media type")]
    UnsupportedMedia,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
