//! Metadata index for the ibed media store.
//!
//! This crate owns everything persisted in the key-value backend:
//! - Image records, their tag sets, ownership and tag indexes
//! - User records and the unique username mapping
//! - The key layout shared with the ranking engine
//! - Backends: Redis and in-process memory

pub mod error;
pub mod index;
pub mod indexed_write;
pub mod keys;
pub mod kv;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use index::MetadataIndex;
pub use indexed_write::IndexedWrite;
pub use kv::{KvBackend, KvOp, MemoryBackend, RedisBackend};
pub use repos::{ImageRepo, UserRepo};
pub use store::MetadataStore;

use ibed_core::config::KvConfig;
use std::sync::Arc;

/// Create a key-value backend from configuration.
pub async fn from_config(config: &KvConfig) -> MetadataResult<Arc<dyn KvBackend>> {
    config.validate().map_err(MetadataError::Config)?;

    match config {
        KvConfig::Redis { .. } => {
            let url = config.redis_url().ok_or_else(|| {
                MetadataError::Config("redis config requires either 'url' or 'addr'".to_string())
            })?;
            tracing::info!("Connecting to Redis");
            let backend = RedisBackend::connect(&url).await?;
            Ok(Arc::new(backend) as Arc<dyn KvBackend>)
        }
        KvConfig::Memory => {
            tracing::warn!("Using in-memory metadata backend; data will not survive a restart");
            Ok(Arc::new(MemoryBackend::new()) as Arc<dyn KvBackend>)
        }
    }
}
