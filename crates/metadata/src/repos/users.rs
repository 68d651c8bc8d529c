//! User record repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use ibed_core::{UserId, UserRecord};

/// Repository for user records and the username mapping.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Write a user record as-is. Does not touch the username mapping.
    async fn save_user(&self, user: &UserRecord) -> MetadataResult<()>;

    async fn get_user(&self, id: &UserId) -> MetadataResult<UserRecord>;

    async fn get_user_by_username(&self, username: &str) -> MetadataResult<UserRecord>;

    /// Register a new user. Returns `Conflict` when the username is taken.
    /// The first registration under the reserved admin name is the administrator.
    async fn create_user(&self, username: &str, password_hash: &str) -> MetadataResult<UserRecord>;

    async fn change_password(&self, id: &UserId, password_hash: &str) -> MetadataResult<()>;

    /// Move a user to a new username. Returns `Conflict` when it is taken.
    async fn rename_user(&self, id: &UserId, new_username: &str) -> MetadataResult<UserRecord>;

    /// Remove the record and its username mapping together.
    async fn delete_user(&self, id: &UserId) -> MetadataResult<()>;

    /// Enumerate every user id. O(n); administrative use only.
    async fn list_user_ids(&self) -> MetadataResult<Vec<UserId>>;

    /// Every user record, skipping ids that vanish mid-listing.
    async fn list_users(&self) -> MetadataResult<Vec<UserRecord>>;
}
