//! Engine test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use ibed_core::UserId;
use ibed_engine::{MediaService, RankingEngine, UploadRequest};
use ibed_metadata::{
    KvBackend, KvOp, MemoryBackend, MetadataError, MetadataIndex, MetadataResult,
};
use ibed_storage::FilesystemBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

/// Upload limit used by test services.
pub const TEST_MAX_UPLOAD: u64 = 64 * 1024;

/// Media service over a temporary directory and an in-memory backend.
#[allow(dead_code)]
pub struct TestService {
    pub service: Arc<MediaService>,
    pub kv: Arc<dyn KvBackend>,
    pub index: Arc<MetadataIndex>,
    pub ranking: Arc<RankingEngine>,
    pub content: Arc<FilesystemBackend>,
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestService {
    pub async fn new() -> Self {
        Self::with_kv(Arc::new(MemoryBackend::new())).await
    }

    pub async fn with_kv(kv: Arc<dyn KvBackend>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let content = Arc::new(
            FilesystemBackend::new(temp_dir.path())
                .await
                .expect("Failed to create filesystem backend"),
        );
        let index = Arc::new(MetadataIndex::new(kv.clone(), Duration::days(30)));
        let ranking = Arc::new(RankingEngine::new(kv.clone()));
        let service = Arc::new(MediaService::new(
            content.clone(),
            index.clone(),
            ranking.clone(),
            TEST_MAX_UPLOAD,
        ));
        Self {
            service,
            kv,
            index,
            ranking,
            content,
            temp_dir,
        }
    }
}

/// A payload that sniffs as PNG; `seed` makes its fingerprint unique.
#[allow(dead_code)]
pub fn png_bytes(seed: &str) -> Bytes {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend_from_slice(seed.as_bytes());
    Bytes::from(data)
}

/// Upload request for `data` with the given tags.
#[allow(dead_code)]
pub fn upload_request(owner: UserId, data: Bytes, description: &str, tags: &[&str]) -> UploadRequest {
    UploadRequest {
        owner_id: owner,
        filename: "picture.png".to_string(),
        description: description.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        is_private: false,
        data,
    }
}

/// Memory backend whose next `sorted_top` calls fail with `Transient`.
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyKv {
    inner: MemoryBackend,
    top_failures: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyKv {
    pub fn failing_top(times: usize) -> Self {
        Self {
            inner: MemoryBackend::new(),
            top_failures: AtomicUsize::new(times),
        }
    }

    /// Failures still to be injected.
    pub fn remaining(&self) -> usize {
        self.top_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvBackend for FlakyKv {
    async fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> MetadataResult<()> {
        self.inner.set(key, value).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> MetadataResult<bool> {
        self.inner.set_if_absent(key, value).await
    }

    async fn delete(&self, key: &str) -> MetadataResult<bool> {
        self.inner.delete(key).await
    }

    async fn set_members(&self, key: &str) -> MetadataResult<Vec<String>> {
        self.inner.set_members(key).await
    }

    async fn sorted_incr(&self, key: &str, member: &str, by: f64) -> MetadataResult<f64> {
        self.inner.sorted_incr(key, member, by).await
    }

    async fn sorted_remove(&self, key: &str, member: &str) -> MetadataResult<bool> {
        self.inner.sorted_remove(key, member).await
    }

    async fn sorted_score(&self, key: &str, member: &str) -> MetadataResult<Option<f64>> {
        self.inner.sorted_score(key, member).await
    }

    async fn sorted_top(&self, key: &str, n: usize) -> MetadataResult<Vec<(String, f64)>> {
        let injected = self
            .top_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(MetadataError::Transient("injected failure".to_string()));
        }
        self.inner.sorted_top(key, n).await
    }

    async fn scan_keys(&self, pattern: &str) -> MetadataResult<Vec<String>> {
        self.inner.scan_keys(pattern).await
    }

    async fn expire_time(&self, key: &str) -> MetadataResult<Option<OffsetDateTime>> {
        self.inner.expire_time(key).await
    }

    async fn atomic(&self, ops: Vec<KvOp>) -> MetadataResult<()> {
        self.inner.atomic(ops).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky-memory"
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}
