//! Key layout in the backing store.
//!
//! | key                      | type       | expiry            |
//! |--------------------------|------------|-------------------|
//! | `image:<hex>`            | JSON       | retention         |
//! | `image_tags:<hex>`       | set        | retention         |
//! | `user_images:<user id>`  | set        | retention         |
//! | `tag:<lowercased tag>`   | set        | retention         |
//! | `user:<user id>`         | JSON       | none              |
//! | `username:<name>`        | user id    | none              |
//! | `admin:claimed`          | user id    | none              |
//! | `ranking:views`          | sorted set | none              |
//! | `ranking:snapshot`       | JSON       | none              |

use ibed_core::{Fingerprint, UserId};

pub const IMAGE_PREFIX: &str = "image:";
pub const USER_PREFIX: &str = "user:";
pub const ADMIN_CLAIM: &str = "admin:claimed";
pub const RANKING_VIEWS: &str = "ranking:views";
pub const RANKING_SNAPSHOT: &str = "ranking:snapshot";

pub fn image(id: &Fingerprint) -> String {
    format!("{IMAGE_PREFIX}{}", id.to_hex())
}

pub fn image_tags(id: &Fingerprint) -> String {
    format!("image_tags:{}", id.to_hex())
}

pub fn owner_images(owner: &UserId) -> String {
    format!("user_images:{owner}")
}

/// Inverted index entry. Tags are matched case-insensitively.
pub fn tag_index(tag: &str) -> String {
    format!("tag:{}", tag.to_lowercase())
}

pub fn user(id: &UserId) -> String {
    format!("{USER_PREFIX}{id}")
}

pub fn username(name: &str) -> String {
    format!("username:{name}")
}

/// Pattern matching every image record key.
pub fn image_pattern() -> String {
    format!("{IMAGE_PREFIX}*")
}

/// Pattern matching every user record key.
pub fn user_pattern() -> String {
    format!("{USER_PREFIX}*")
}
