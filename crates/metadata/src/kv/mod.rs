//! Key-value backend abstraction.
//!
//! The capability set mirrors what the metadata index needs from a
//! Redis-like store: string values, sets, sorted sets with incrementable
//! scores, key enumeration, absolute expiry, and an all-or-nothing batch.

pub mod memory;
pub mod redis_backend;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

use crate::error::MetadataResult;
use async_trait::async_trait;
use time::OffsetDateTime;

/// One command inside an atomic batch.
#[derive(Clone, Debug, PartialEq)]
pub enum KvOp {
    /// Store a value. Clears any expiry previously set on the key.
    Set { key: String, value: Vec<u8> },
    /// Remove a key of any type.
    Delete { key: String },
    /// Add members to a set, creating it if needed.
    SetAdd { key: String, members: Vec<String> },
    /// Expire a key at an absolute instant.
    ExpireAt { key: String, at: OffsetDateTime },
    /// Expire a key at `at` unless it already expires later.
    ///
    /// Sets the expiry of a persistent key; never moves an expiry earlier.
    ExtendExpiry { key: String, at: OffsetDateTime },
}

/// Backing store operations.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    /// Get a string value.
    async fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>>;

    /// Set a string value without expiry.
    async fn set(&self, key: &str, value: &[u8]) -> MetadataResult<()>;

    /// Set a string value only if the key does not exist.
    /// Returns true when the value was written.
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> MetadataResult<bool>;

    /// Delete a key. Returns true when a key was removed.
    async fn delete(&self, key: &str) -> MetadataResult<bool>;

    /// Members of a set; empty when the key is absent.
    async fn set_members(&self, key: &str) -> MetadataResult<Vec<String>>;

    /// Atomically add `by` to a member's score and return the new score.
    async fn sorted_incr(&self, key: &str, member: &str, by: f64) -> MetadataResult<f64>;

    /// Remove a member. Returns true when it was present.
    async fn sorted_remove(&self, key: &str, member: &str) -> MetadataResult<bool>;

    /// Score of a member, if present.
    async fn sorted_score(&self, key: &str, member: &str) -> MetadataResult<Option<f64>>;

    /// Up to `n` members with the highest scores, in descending score order.
    async fn sorted_top(&self, key: &str, n: usize) -> MetadataResult<Vec<(String, f64)>>;

    /// Enumerate keys matching a glob pattern (`*` and `?`).
    ///
    /// O(number of keys). Each key appears once.
    async fn scan_keys(&self, pattern: &str) -> MetadataResult<Vec<String>>;

    /// Absolute expiry of a key; `None` when the key is absent or persistent.
    async fn expire_time(&self, key: &str) -> MetadataResult<Option<OffsetDateTime>>;

    /// Apply the ops as one transaction; no other client observes a partial batch.
    ///
    /// Redis queues the batch in `MULTI`/`EXEC` and does not roll back a
    /// command that fails at execution time (e.g. `WRONGTYPE`); the memory
    /// backend checks the whole batch first and applies all or nothing.
    async fn atomic(&self, ops: Vec<KvOp>) -> MetadataResult<()>;

    /// Static backend identifier for logging.
    fn backend_name(&self) -> &'static str;

    /// Check connectivity.
    async fn health_check(&self) -> MetadataResult<()>;
}
