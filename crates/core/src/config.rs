//! Configuration types shared across crates.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Content store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for payloads.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/images"),
        }
    }
}

/// Key-value backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KvConfig {
    /// Redis (or a protocol-compatible server).
    Redis {
        /// Connection URL (e.g., "redis://127.0.0.1:6379/0").
        /// Takes precedence over the individual fields if both are provided.
        url: Option<String>,
        /// Host and port (e.g., "127.0.0.1:6379").
        addr: Option<String>,
        /// Password.
        /// WARNING: Prefer IBED_KV__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Logical database index.
        #[serde(default)]
        db: i64,
    },
    /// Process-local store. Data is lost on restart; for tests and development only.
    Memory,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self::Redis {
            url: None,
            addr: Some("127.0.0.1:6379".to_string()),
            password: None,
            db: 0,
        }
    }
}

impl KvConfig {
    /// Validate backend configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            KvConfig::Redis { url, addr, db, .. } => {
                if url.is_none() && addr.is_none() {
                    return Err("redis config requires either 'url' or 'addr'".to_string());
                }
                if *db < 0 {
                    return Err(format!("redis db index must be >= 0, got {db}"));
                }
                Ok(())
            }
            KvConfig::Memory => Ok(()),
        }
    }

    /// Connection URL for the Redis backend, or `None` for other backends.
    pub fn redis_url(&self) -> Option<String> {
        match self {
            KvConfig::Redis {
                url: Some(url), ..
            } => Some(url.clone()),
            KvConfig::Redis {
                url: None,
                addr: Some(addr),
                password,
                db,
            } => Some(match password {
                Some(password) => {
                    let password = utf8_percent_encode(password, NON_ALPHANUMERIC);
                    format!("redis://:{password}@{addr}/{db}")
                }
                None => format!("redis://{addr}/{db}"),
            }),
            _ => None,
        }
    }
}

/// Retention policy for image metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Lifetime of an image record and its index entries, in seconds (default: 30 days).
    #[serde(default = "default_image_ttl_secs")]
    pub image_ttl_secs: u64,
}

/// Upper bound for `retention.image_ttl_secs` (100 years).
pub const MAX_IMAGE_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn default_image_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            image_ttl_secs: default_image_ttl_secs(),
        }
    }
}

impl RetentionConfig {
    /// Get the retention window as a Duration.
    pub fn image_ttl(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.image_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }
}

/// Popularity ranking configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Seconds between snapshot refreshes (default: 60).
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Number of ids kept in the published snapshot (default: 10).
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_top_n() -> usize {
    10
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            top_n: default_top_n(),
        }
    }
}

impl RankingConfig {
    /// Get the refresh interval as a std Duration for timers.
    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_interval_secs)
    }

    /// Validate ranking configuration.
    pub fn validate(&self) -> Result<(), String> {
        // Error on zero interval (would cause tokio::time::interval to panic)
        if self.refresh_interval_secs == 0 {
            return Err("ranking.refresh_interval_secs cannot be 0".to_string());
        }
        if self.top_n == 0 {
            return Err("ranking.top_n cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Upload limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted payload size in bytes (default: 10 MiB).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// Log output configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Content store configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Key-value backend configuration.
    #[serde(default)]
    pub kv: KvConfig,
    /// Metadata retention.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Ranking refresh.
    #[serde(default)]
    pub ranking: RankingConfig,
    /// Upload limits.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** Uses the in-memory key-value backend.
    pub fn for_testing() -> Self {
        Self {
            kv: KvConfig::Memory,
            ..Self::default()
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.kv.validate()?;
        self.ranking.validate()?;
        if self.retention.image_ttl_secs == 0 {
            return Err("retention.image_ttl_secs cannot be 0".to_string());
        }
        if self.retention.image_ttl_secs > MAX_IMAGE_TTL_SECS {
            return Err(format!(
                "retention.image_ttl_secs cannot exceed {MAX_IMAGE_TTL_SECS}, got {}",
                self.retention.image_ttl_secs
            ));
        }
        if self.upload.max_upload_size == 0 {
            return Err("upload.max_upload_size cannot be 0".to_string());
        }
        Ok(())
    }
}
