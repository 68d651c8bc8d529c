//! Metadata index test utilities.

use ibed_core::{Fingerprint, ImageRecord, UserId, normalize_tags};
use ibed_metadata::{KvBackend, MemoryBackend, MetadataError, MetadataIndex, MetadataResult, RedisBackend};
use std::sync::Arc;
use testcontainers_modules::redis::{REDIS_PORT, Redis};
use testcontainers_modules::testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use time::{Duration, OffsetDateTime};

/// Retention used by every test index.
pub const TEST_RETENTION: Duration = Duration::days(30);

/// Redis test backend wrapper that manages a testcontainer.
#[allow(dead_code)]
pub struct RedisTestKv {
    pub backend: Arc<RedisBackend>,
    _container: ContainerAsync<Redis>,
}

impl RedisTestKv {
    /// Start a Redis container and connect to it.
    pub async fn new() -> MetadataResult<Self> {
        let container = Redis::default()
            .with_tag("7.2-alpine")
            .start()
            .await
            .map_err(|e| MetadataError::Internal(format!("Failed to start Redis container: {e}")))?;

        let host = container
            .get_host()
            .await
            .map_err(|e| MetadataError::Internal(format!("Failed to get host: {e}")))?;
        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .map_err(|e| MetadataError::Internal(format!("Failed to get port: {e}")))?;

        let backend = RedisBackend::connect(&format!("redis://{host}:{port}/0")).await?;
        Ok(Self {
            backend: Arc::new(backend),
            _container: container,
        })
    }
}

/// Run a test against the in-memory backend and, when Docker is available,
/// against Redis.
#[allow(dead_code)]
pub async fn run_kv_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn KvBackend>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    test_fn.clone()(Arc::new(MemoryBackend::new())).await;

    if std::env::var("SKIP_REDIS_TESTS").is_err() {
        match RedisTestKv::new().await {
            Ok(redis) => test_fn(redis.backend.clone()).await,
            Err(err) => eprintln!("Skipping Redis metadata tests: {err}"),
        }
    }
}

/// Same as [`run_kv_test_both`], handing the test a metadata index.
#[allow(dead_code)]
pub async fn run_index_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<MetadataIndex>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    run_kv_test_both(move |kv| {
        let test_fn = test_fn.clone();
        async move { test_fn(Arc::new(MetadataIndex::new(kv, TEST_RETENTION))).await }
    })
    .await;
}

/// Build an image record for `content`.
#[allow(dead_code)]
pub fn image_record(content: &[u8], owner: UserId, tags: &[&str]) -> ImageRecord {
    let id = Fingerprint::compute(content);
    ImageRecord {
        id,
        owner_id: owner,
        stored_filename: format!("{}.png", id.to_hex()),
        description: String::new(),
        tags: normalize_tags(tags),
        is_private: false,
        view_count: 0,
        created_at: OffsetDateTime::now_utc(),
    }
}
