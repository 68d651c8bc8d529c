//! In-process key-value store with Redis semantics.
//!
//! Data is lost on restart. Used by tests and single-process development
//! setups.

use super::{KvBackend, KvOp};
use crate::error::{MetadataError, MetadataResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
enum Value {
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
    Sorted(HashMap<String, f64>),
}

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

fn wrong_type(key: &str) -> MetadataError {
    MetadataError::Backend(format!(
        "WRONGTYPE operation against key holding the wrong kind of value: {key}"
    ))
}

/// Key-value backend held in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Remove `key` if it has expired.
fn purge_expired(entries: &mut BTreeMap<String, Entry>, key: &str, now: OffsetDateTime) {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
}

/// The entry for `key`, if present and not expired.
fn live<'a>(
    entries: &'a mut BTreeMap<String, Entry>,
    key: &str,
    now: OffsetDateTime,
) -> Option<&'a mut Entry> {
    purge_expired(entries, key, now);
    entries.get_mut(key)
}

fn apply(entries: &mut BTreeMap<String, Entry>, op: KvOp, now: OffsetDateTime) {
    match op {
        KvOp::Set { key, value } => {
            entries.insert(key, Entry::new(Value::Bytes(value)));
        }
        KvOp::Delete { key } => {
            entries.remove(&key);
        }
        KvOp::SetAdd { key, members } => {
            if members.is_empty() {
                return;
            }
            purge_expired(entries, &key, now);
            let entry = entries
                .entry(key)
                .or_insert_with(|| Entry::new(Value::Set(BTreeSet::new())));
            if let Value::Set(set) = &mut entry.value {
                set.extend(members);
            }
        }
        KvOp::ExpireAt { key, at } => {
            let at = whole_seconds(at);
            if at <= now {
                entries.remove(&key);
            } else if let Some(entry) = live(entries, &key, now) {
                entry.expires_at = Some(at);
            }
        }
        KvOp::ExtendExpiry { key, at } => {
            let at = whole_seconds(at);
            let current = match live(entries, &key, now) {
                Some(entry) => entry.expires_at,
                None => return,
            };
            match current {
                Some(current) if current >= at => {}
                None if at <= now => {
                    entries.remove(&key);
                }
                _ => {
                    if let Some(entry) = entries.get_mut(&key) {
                        entry.expires_at = Some(at);
                    }
                }
            }
        }
    }
}

/// Truncate to whole seconds, the resolution of EXPIREAT.
fn whole_seconds(at: OffsetDateTime) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(at.unix_timestamp()).unwrap_or(at)
}

/// Check that a batch cannot fail halfway: every `SetAdd` targets a set or
/// an absent key, taking earlier ops in the batch into account.
fn check_batch(
    entries: &BTreeMap<String, Entry>,
    ops: &[KvOp],
    now: OffsetDateTime,
) -> MetadataResult<()> {
    let mut overridden: HashMap<&str, bool> = HashMap::new();
    for op in ops {
        match op {
            KvOp::Set { key, .. } => {
                overridden.insert(key.as_str(), false);
            }
            KvOp::Delete { key } => {
                overridden.insert(key.as_str(), true);
            }
            KvOp::SetAdd { key, members } => {
                if members.is_empty() {
                    continue;
                }
                let is_set = match overridden.get(key.as_str()) {
                    Some(true) => true,
                    Some(false) => false,
                    None => match entries.get(key).filter(|e| e.is_live(now)) {
                        Some(entry) => matches!(entry.value, Value::Set(_)),
                        None => true,
                    },
                };
                if !is_set {
                    return Err(wrong_type(key));
                }
                overridden.insert(key.as_str(), true);
            }
            KvOp::ExpireAt { .. } | KvOp::ExtendExpiry { .. } => {}
        }
    }
    Ok(())
}

/// Glob match supporting `*` (any run) and `?` (any one char).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, OffsetDateTime::now_utc()) {
            None => Ok(None),
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> MetadataResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Entry::new(Value::Bytes(value.to_vec())));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> MetadataResult<bool> {
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key, OffsetDateTime::now_utc()).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(Value::Bytes(value.to_vec())));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> MetadataResult<bool> {
        let mut entries = self.entries.lock().await;
        let existed = live(&mut entries, key, OffsetDateTime::now_utc()).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn set_members(&self, key: &str) -> MetadataResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, OffsetDateTime::now_utc()) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sorted_incr(&self, key: &str, member: &str, by: f64) -> MetadataResult<f64> {
        let mut entries = self.entries.lock().await;
        let now = OffsetDateTime::now_utc();
        purge_expired(&mut entries, key, now);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Sorted(HashMap::new())));
        let Value::Sorted(scores) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let score = scores.entry(member.to_string()).or_insert(0.0);
        *score += by;
        Ok(*score)
    }

    async fn sorted_remove(&self, key: &str, member: &str) -> MetadataResult<bool> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, OffsetDateTime::now_utc()) {
            None => Ok(false),
            Some(Entry {
                value: Value::Sorted(scores),
                ..
            }) => Ok(scores.remove(member).is_some()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sorted_score(&self, key: &str, member: &str) -> MetadataResult<Option<f64>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, OffsetDateTime::now_utc()) {
            None => Ok(None),
            Some(Entry {
                value: Value::Sorted(scores),
                ..
            }) => Ok(scores.get(member).copied()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sorted_top(&self, key: &str, n: usize) -> MetadataResult<Vec<(String, f64)>> {
        let mut entries = self.entries.lock().await;
        let scores = match live(&mut entries, key, OffsetDateTime::now_utc()) {
            None => return Ok(Vec::new()),
            Some(Entry {
                value: Value::Sorted(scores),
                ..
            }) => scores,
            Some(_) => return Err(wrong_type(key)),
        };
        let mut ranked: Vec<(String, f64)> =
            scores.iter().map(|(m, s)| (m.clone(), *s)).collect();
        // Descending score; equal scores in reverse lexicographic order, as Redis does
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        ranked.truncate(n);
        Ok(ranked)
    }

    async fn scan_keys(&self, pattern: &str) -> MetadataResult<Vec<String>> {
        let entries = self.entries.lock().await;
        let now = OffsetDateTime::now_utc();
        Ok(entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn expire_time(&self, key: &str) -> MetadataResult<Option<OffsetDateTime>> {
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key, OffsetDateTime::now_utc()).and_then(|e| e.expires_at))
    }

    async fn atomic(&self, ops: Vec<KvOp>) -> MetadataResult<()> {
        let mut entries = self.entries.lock().await;
        let now = OffsetDateTime::now_utc();
        check_batch(&entries, &ops, now)?;
        for op in ops {
            apply(&mut entries, op, now);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }
}
