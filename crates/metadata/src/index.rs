//! Metadata index over a key-value backend.

use crate::error::{MetadataError, MetadataResult};
use crate::indexed_write::IndexedWrite;
use crate::keys;
use crate::kv::{KvBackend, KvOp};
use crate::repos::{ImageRepo, UserRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use ibed_core::{
    ADMIN_USERNAME, Fingerprint, ImageRecord, UserId, UserRecord, validate_username,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, instrument, warn};

/// Image and user metadata stored in a [`KvBackend`].
///
/// Holds no locks of its own. Multi-key writes go through a single atomic
/// batch; concurrent writers of the same record race and the last commit wins.
pub struct MetadataIndex {
    kv: Arc<dyn KvBackend>,
    retention: Duration,
}

impl MetadataIndex {
    /// Create an index whose image entries expire `retention` after creation.
    pub fn new(kv: Arc<dyn KvBackend>, retention: Duration) -> Self {
        Self { kv, retention }
    }

    /// The underlying backend.
    pub fn kv(&self) -> Arc<dyn KvBackend> {
        self.kv.clone()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Apply an indexed write atomically.
    pub async fn commit(&self, write: IndexedWrite) -> MetadataResult<()> {
        self.kv.atomic(write.into_ops()).await
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> MetadataResult<Option<T>> {
        match self.kv.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Best-effort removal of a claim key after a failed write.
    async fn release(&self, key: &str) {
        if let Err(e) = self.kv.delete(key).await {
            warn!(key = %key, error = %e, "Failed to release claim");
        }
    }
}

fn parse_ids(ids: Vec<String>) -> Vec<Fingerprint> {
    ids.into_iter()
        .filter_map(|hex| match Fingerprint::from_hex(&hex) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(member = %hex, error = %e, "Skipping malformed image id in index");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ImageRepo for MetadataIndex {
    #[instrument(skip(self, record), fields(id = %record.id, tags = record.tags.len()))]
    async fn save_image(&self, record: &ImageRecord) -> MetadataResult<()> {
        let expires_at = record.expires_at(self.retention)?;
        if expires_at <= OffsetDateTime::now_utc() {
            return Err(MetadataError::Invalid(format!(
                "image {} expired at {expires_at}",
                record.id
            )));
        }

        let id_hex = record.id.to_hex();
        let mut write = IndexedWrite::new(keys::image(&record.id), serde_json::to_vec(record)?)
            .replace_set(keys::image_tags(&record.id), record.tags.iter().cloned())
            .add_to_set(keys::owner_images(&record.owner_id), [id_hex.clone()]);
        for tag in &record.tags {
            write = write.add_to_set(keys::tag_index(tag), [id_hex.clone()]);
        }
        self.commit(write.expire_at(expires_at)).await
    }

    async fn get_image(&self, id: &Fingerprint) -> MetadataResult<ImageRecord> {
        let mut record: ImageRecord = self
            .read_json(&keys::image(id))
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("image {id}")))?;
        record.tags = self.image_tags(id).await?;
        Ok(record)
    }

    async fn image_exists(&self, id: &Fingerprint) -> MetadataResult<bool> {
        Ok(self.kv.get(&keys::image(id)).await?.is_some())
    }

    #[instrument(skip(self))]
    async fn delete_image(&self, id: &Fingerprint) -> MetadataResult<()> {
        if !self.kv.delete(&keys::image(id)).await? {
            debug!(id = %id, "Image record already absent");
        }
        Ok(())
    }

    async fn image_tags(&self, id: &Fingerprint) -> MetadataResult<BTreeSet<String>> {
        Ok(self
            .kv
            .set_members(&keys::image_tags(id))
            .await?
            .into_iter()
            .collect())
    }

    async fn list_image_ids(&self) -> MetadataResult<Vec<Fingerprint>> {
        let found = self.kv.scan_keys(&keys::image_pattern()).await?;
        Ok(parse_ids(
            found
                .into_iter()
                .filter_map(|k| k.strip_prefix(keys::IMAGE_PREFIX).map(str::to_string))
                .collect(),
        ))
    }

    async fn owner_image_ids(&self, owner: &UserId) -> MetadataResult<Vec<Fingerprint>> {
        let members = self.kv.set_members(&keys::owner_images(owner)).await?;
        Ok(parse_ids(members))
    }

    async fn tag_image_ids(&self, tag: &str) -> MetadataResult<Vec<Fingerprint>> {
        let members = self.kv.set_members(&keys::tag_index(tag.trim())).await?;
        Ok(parse_ids(members))
    }

    async fn resolve_images(&self, ids: &[Fingerprint]) -> MetadataResult<Vec<ImageRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_image(id).await {
                Ok(record) => records.push(record),
                Err(MetadataError::NotFound(_)) => {
                    debug!(id = %id, "Skipping dangling index entry");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl UserRepo for MetadataIndex {
    async fn save_user(&self, user: &UserRecord) -> MetadataResult<()> {
        self.kv
            .set(&keys::user(&user.id), &serde_json::to_vec(user)?)
            .await
    }

    async fn get_user(&self, id: &UserId) -> MetadataResult<UserRecord> {
        self.read_json(&keys::user(id))
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("user {id}")))
    }

    async fn get_user_by_username(&self, username: &str) -> MetadataResult<UserRecord> {
        let raw = self
            .kv
            .get(&keys::username(username))
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("username {username}")))?;
        let raw = String::from_utf8(raw)
            .map_err(|e| MetadataError::Internal(format!("corrupt username mapping: {e}")))?;
        let id = UserId::parse(&raw)
            .map_err(|e| MetadataError::Internal(format!("corrupt username mapping: {e}")))?;
        self.get_user(&id).await
    }

    #[instrument(skip(self, password_hash))]
    async fn create_user(&self, username: &str, password_hash: &str) -> MetadataResult<UserRecord> {
        validate_username(username)?;

        let id = UserId::new();
        let id_str = id.to_string();
        let name_key = keys::username(username);
        if !self.kv.set_if_absent(&name_key, id_str.as_bytes()).await? {
            return Err(MetadataError::Conflict(format!(
                "username already taken: {username}"
            )));
        }

        let mut is_admin = false;
        let result: MetadataResult<UserRecord> = async {
            if username == ADMIN_USERNAME {
                is_admin = self
                    .kv
                    .set_if_absent(keys::ADMIN_CLAIM, id_str.as_bytes())
                    .await?;
            }
            let user = UserRecord {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                is_admin,
                created_at: OffsetDateTime::now_utc(),
            };
            self.save_user(&user).await?;
            Ok(user)
        }
        .await;

        if result.is_err() {
            self.release(&name_key).await;
            if is_admin {
                self.release(keys::ADMIN_CLAIM).await;
            }
        }
        result
    }

    async fn change_password(&self, id: &UserId, password_hash: &str) -> MetadataResult<()> {
        let mut user = self.get_user(id).await?;
        user.password_hash = password_hash.to_string();
        self.save_user(&user).await
    }

    #[instrument(skip(self))]
    async fn rename_user(&self, id: &UserId, new_username: &str) -> MetadataResult<UserRecord> {
        validate_username(new_username)?;

        let mut user = self.get_user(id).await?;
        if user.username == new_username {
            return Ok(user);
        }
        let old_key = keys::username(&user.username);
        user.username = new_username.to_string();
        let payload = serde_json::to_vec(&user)?;

        let new_key = keys::username(new_username);
        if !self
            .kv
            .set_if_absent(&new_key, id.to_string().as_bytes())
            .await?
        {
            return Err(MetadataError::Conflict(format!(
                "username already taken: {new_username}"
            )));
        }

        let write = IndexedWrite::new(keys::user(id), payload).delete(old_key);
        if let Err(e) = self.commit(write).await {
            self.release(&new_key).await;
            return Err(e);
        }
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: &UserId) -> MetadataResult<()> {
        let user = self.get_user(id).await?;
        self.kv
            .atomic(vec![
                KvOp::Delete {
                    key: keys::user(id),
                },
                KvOp::Delete {
                    key: keys::username(&user.username),
                },
            ])
            .await
    }

    async fn list_user_ids(&self) -> MetadataResult<Vec<UserId>> {
        let found = self.kv.scan_keys(&keys::user_pattern()).await?;
        Ok(found
            .into_iter()
            .filter_map(|key| {
                let raw = key.strip_prefix(keys::USER_PREFIX)?;
                match UserId::parse(raw) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping malformed user key");
                        None
                    }
                }
            })
            .collect())
    }

    async fn list_users(&self) -> MetadataResult<Vec<UserRecord>> {
        let mut users = Vec::new();
        for id in self.list_user_ids().await? {
            match self.get_user(&id).await {
                Ok(user) => users.push(user),
                Err(MetadataError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(users)
    }
}

#[async_trait]
impl MetadataStore for MetadataIndex {
    async fn health_check(&self) -> MetadataResult<()> {
        self.kv.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        self.kv.backend_name()
    }
}
