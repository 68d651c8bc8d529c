//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use ibed_core::ContentKey;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Payload store addressed by content keys.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Check if a payload exists.
    async fn exists(&self, key: &ContentKey) -> StorageResult<bool>;

    /// Get a payload's content.
    async fn get(&self, key: &ContentKey) -> StorageResult<Bytes>;

    /// Get a payload as a byte stream.
    async fn get_stream(&self, key: &ContentKey) -> StorageResult<ByteStream>;

    /// Write a payload atomically, creating parent directories as needed.
    /// Overwriting an existing payload is not an error.
    async fn put(&self, key: &ContentKey, data: Bytes) -> StorageResult<()>;

    /// Start a streaming write. Nothing is visible under `key` until `finish`.
    async fn put_stream(&self, key: &ContentKey) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Remove a payload. Returns `NotFound` if it is absent.
    async fn delete(&self, key: &ContentKey) -> StorageResult<()>;

    /// Get the name of this storage backend.
    ///
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and properly configured.
    ///
    /// Called at startup before any traffic is served.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Trait for streaming uploads.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Finish the upload and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Abort the upload.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
