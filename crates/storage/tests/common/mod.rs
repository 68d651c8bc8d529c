pub mod fixtures;

use ibed_storage::{ContentStore, FilesystemBackend, StorageResult};
use std::sync::Arc;
use tempfile::TempDir;

#[allow(unused_imports)]
pub use fixtures::{key_for, seeded_bytes};

/// A filesystem-backed store that removes its directory on drop.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestStore {
    pub backend: Arc<dyn ContentStore>,
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStore {
    pub async fn new() -> StorageResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(temp_dir.path()).await?;

        Ok(Self {
            backend: Arc::new(backend),
            temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn ContentStore> {
        self.backend.clone()
    }
}
