//! Combined metadata store trait.

use crate::error::MetadataResult;
use crate::repos::{ImageRepo, UserRepo};
use async_trait::async_trait;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ImageRepo + UserRepo + Send + Sync + 'static {
    /// Check backing store connectivity.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Name of the backing store, for logging.
    fn backend_name(&self) -> &'static str;
}
