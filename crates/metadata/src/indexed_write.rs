//! Atomic "record plus indexes" write.
//!
//! Every multi-key metadata mutation goes through [`IndexedWrite`]: one
//! serialized record, any number of set indexes, and an optional absolute
//! expiry applied to every key the write touches.
//!
//! Sets written with [`IndexedWrite::replace_set`] belong to the record and
//! receive exactly its expiry. Sets written with [`IndexedWrite::add_to_set`]
//! are shared with other records (ownership and tag indexes), so their expiry
//! is only ever extended.

use crate::kv::KvOp;
use time::OffsetDateTime;

#[derive(Debug)]
struct SetIndex {
    key: String,
    members: Vec<String>,
    replace: bool,
}

/// Builder for one atomic batch.
#[derive(Debug)]
pub struct IndexedWrite {
    record_key: String,
    record: Vec<u8>,
    sets: Vec<SetIndex>,
    deletes: Vec<String>,
    expire_at: Option<OffsetDateTime>,
}

impl IndexedWrite {
    /// Start a write of `record` under `key`.
    pub fn new(key: impl Into<String>, record: Vec<u8>) -> Self {
        Self {
            record_key: key.into(),
            record,
            sets: Vec::new(),
            deletes: Vec::new(),
            expire_at: None,
        }
    }

    /// Add members to a set index shared with other records.
    pub fn add_to_set<I, S>(mut self, key: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets.push(SetIndex {
            key: key.into(),
            members: members.into_iter().map(Into::into).collect(),
            replace: false,
        });
        self
    }

    /// Make a set owned by this record hold exactly `members`.
    pub fn replace_set<I, S>(mut self, key: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets.push(SetIndex {
            key: key.into(),
            members: members.into_iter().map(Into::into).collect(),
            replace: true,
        });
        self
    }

    /// Remove another key in the same batch.
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.deletes.push(key.into());
        self
    }

    /// Expire every written key at `at`.
    pub fn expire_at(mut self, at: OffsetDateTime) -> Self {
        self.expire_at = Some(at);
        self
    }

    /// Keys that exist after the write is applied, record first.
    pub fn written_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.record_key.as_str()];
        for set in &self.sets {
            let present = keys.contains(&set.key.as_str());
            if !set.members.is_empty() && !present {
                keys.push(&set.key);
            } else if set.replace && set.members.is_empty() && present {
                keys.retain(|k| *k != set.key);
            }
        }
        keys
    }

    /// Whether `key` is only ever appended to by this write.
    fn is_shared(&self, key: &str) -> bool {
        key != self.record_key
            && self
                .sets
                .iter()
                .filter(|set| set.key == key)
                .all(|set| !set.replace)
    }

    fn expiry_ops(&self) -> Vec<KvOp> {
        let Some(at) = self.expire_at else {
            return Vec::new();
        };
        self.written_keys()
            .into_iter()
            .map(|key| {
                let key = key.to_string();
                if self.is_shared(&key) {
                    KvOp::ExtendExpiry { key, at }
                } else {
                    KvOp::ExpireAt { key, at }
                }
            })
            .collect()
    }

    /// Lower into backend ops.
    pub fn into_ops(self) -> Vec<KvOp> {
        let expiry = self.expiry_ops();

        let mut ops = Vec::with_capacity(2 + self.sets.len() * 2 + self.deletes.len());
        ops.push(KvOp::Set {
            key: self.record_key,
            value: self.record,
        });
        for set in self.sets {
            if set.replace {
                ops.push(KvOp::Delete {
                    key: set.key.clone(),
                });
            }
            if !set.members.is_empty() {
                ops.push(KvOp::SetAdd {
                    key: set.key,
                    members: set.members,
                });
            }
        }
        for key in self.deletes {
            ops.push(KvOp::Delete { key });
        }
        ops.extend(expiry);
        ops
    }
}
