//! Redis-backed key-value store.

use super::{KvBackend, KvOp};
use crate::error::{MetadataError, MetadataResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashSet;
use time::OffsetDateTime;
use tracing::instrument;

/// Keys requested per SCAN round trip.
const SCAN_COUNT: usize = 500;

/// Key-value backend talking to Redis (7.0 or newer for `EXPIRETIME`).
///
/// The connection manager reconnects on its own; a failed command surfaces
/// as `MetadataError::Transient` and is not retried.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connect to the server at `url` (e.g., `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> MetadataResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| MetadataError::Config(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn unix_to_datetime(secs: i64) -> MetadataResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| MetadataError::Backend(format!("expiry out of range: {e}")))
}

#[async_trait]
impl KvBackend for RedisBackend {
    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>> {
        let mut con = self.connection();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut con).await?;
        Ok(value)
    }

    #[instrument(skip(self, value), fields(backend = "redis", size = value.len()))]
    async fn set(&self, key: &str, value: &[u8]) -> MetadataResult<()> {
        let mut con = self.connection();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, value), fields(backend = "redis"))]
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> MetadataResult<bool> {
        let mut con = self.connection();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut con)
            .await?;
        Ok(reply.is_some())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn delete(&self, key: &str) -> MetadataResult<bool> {
        let mut con = self.connection();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut con).await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn set_members(&self, key: &str) -> MetadataResult<Vec<String>> {
        let mut con = self.connection();
        let members: Vec<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut con).await?;
        Ok(members)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn sorted_incr(&self, key: &str, member: &str, by: f64) -> MetadataResult<f64> {
        let mut con = self.connection();
        let score: f64 = redis::cmd("ZINCRBY")
            .arg(key)
            .arg(by)
            .arg(member)
            .query_async(&mut con)
            .await?;
        Ok(score)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn sorted_remove(&self, key: &str, member: &str) -> MetadataResult<bool> {
        let mut con = self.connection();
        let removed: i64 = redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async(&mut con)
            .await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn sorted_score(&self, key: &str, member: &str) -> MetadataResult<Option<f64>> {
        let mut con = self.connection();
        let score: Option<f64> = redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async(&mut con)
            .await?;
        Ok(score)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn sorted_top(&self, key: &str, n: usize) -> MetadataResult<Vec<(String, f64)>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let stop = i64::try_from(n - 1).unwrap_or(i64::MAX);
        let mut con = self.connection();
        let entries: Vec<(String, f64)> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(0)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut con)
            .await?;
        Ok(entries)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn scan_keys(&self, pattern: &str) -> MetadataResult<Vec<String>> {
        let mut con = self.connection();
        let mut cursor: u64 = 0;
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut con)
                .await?;
            // SCAN may return a key more than once
            for key in batch {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn expire_time(&self, key: &str) -> MetadataResult<Option<OffsetDateTime>> {
        let mut con = self.connection();
        let secs: i64 = redis::cmd("EXPIRETIME").arg(key).query_async(&mut con).await?;
        // -1: no expiry, -2: no such key
        if secs < 0 {
            return Ok(None);
        }
        unix_to_datetime(secs).map(Some)
    }

    #[instrument(skip(self, ops), fields(backend = "redis", ops = ops.len()))]
    async fn atomic(&self, ops: Vec<KvOp>) -> MetadataResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                KvOp::Set { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value).ignore();
                }
                KvOp::Delete { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
                KvOp::SetAdd { key, members } => {
                    if !members.is_empty() {
                        pipe.cmd("SADD").arg(key).arg(members).ignore();
                    }
                }
                KvOp::ExpireAt { key, at } => {
                    pipe.cmd("EXPIREAT")
                        .arg(key)
                        .arg(at.unix_timestamp())
                        .ignore();
                }
                KvOp::ExtendExpiry { key, at } => {
                    // GT treats a persistent key as never expiring, so NX covers that case
                    pipe.cmd("EXPIREAT")
                        .arg(&key)
                        .arg(at.unix_timestamp())
                        .arg("NX")
                        .ignore();
                    pipe.cmd("EXPIREAT")
                        .arg(key)
                        .arg(at.unix_timestamp())
                        .arg("GT")
                        .ignore();
                }
            }
        }
        let mut con = self.connection();
        let _: () = pipe.query_async(&mut con).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn health_check(&self) -> MetadataResult<()> {
        let mut con = self.connection();
        let pong: String = redis::cmd("PING").query_async(&mut con).await?;
        if pong != "PONG" {
            return Err(MetadataError::Backend(format!(
                "unexpected PING reply: {pong}"
            )));
        }
        Ok(())
    }
}
