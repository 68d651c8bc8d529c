//! User record types.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Reserved username whose first registration becomes the administrator.
pub const ADMIN_USERNAME: &str = "admin";

/// Maximum username length in bytes.
pub const MAX_USERNAME_LEN: usize = 64;

/// Opaque, immutable user identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidUserId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    /// Password hash produced by the authentication layer.
    #[serde(rename = "password")]
    pub password_hash: String,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Validate a username: non-empty, bounded, and free of whitespace and control characters.
pub fn validate_username(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidUsername("empty".to_string()));
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(crate::Error::InvalidUsername(format!(
            "longer than {MAX_USERNAME_LEN} bytes"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(crate::Error::InvalidUsername(format!(
            "contains whitespace or control characters: {name:?}"
        )));
    }
    Ok(())
}
