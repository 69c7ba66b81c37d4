//! In-memory storage implementation
//!
//! A single cache member's partitions held in process. The partition registry
//! is a `DashMap` keyed by path; each partition keeps its entries in an
//! ordered map behind a `parking_lot` lock so key iteration can proceed in
//! cursor-sized batches without pinning the lock between batches.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{CacheHost, PartitionPath};
use crate::error::{ProfilerError, Result};

/// Keys fetched per lock acquisition while iterating a partition.
const KEY_BATCH: usize = 256;

/// Value types stored in a partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// String value
    String(Bytes),
    /// List value
    List(VecDeque<Bytes>),
    /// Hash value (field-value mapping)
    Hash(HashMap<Bytes, Bytes>),
    /// Set value (unordered collection of unique elements)
    Set(HashSet<Bytes>),
}

impl Value {
    /// Short type name reported in samples.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Hash(_) => "Hash",
            Value::Set(_) => "Set",
        }
    }
}

/// A single entry in a partition
#[derive(Debug, Clone, Default)]
pub struct Entry {
    /// The stored value; `None` once the entry has been invalidated
    pub value: Option<Value>,
}

impl Entry {
    /// Create a new entry with a value
    pub fn new(value: Value) -> Self {
        Self { value: Some(value) }
    }

    /// An entry whose key exists but whose value has been invalidated
    pub fn invalidated() -> Self {
        Self { value: None }
    }
}

#[derive(Debug, Default)]
struct Partition {
    entries: RwLock<BTreeMap<String, Entry>>,
    children: RwLock<BTreeSet<PartitionPath>>,
}

/// One cache member's partitions, held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    member: String,
    partitions: DashMap<PartitionPath, Arc<Partition>>,
    roots: RwLock<BTreeSet<PartitionPath>>,
    bounded_fetch: bool,
}

impl MemoryStore {
    /// Create an empty store for the named member.
    pub fn new(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            partitions: DashMap::new(),
            roots: RwLock::new(BTreeSet::new()),
            bounded_fetch: true,
        }
    }

    /// Enable or disable the engine-native bounded fetch for every partition.
    pub fn with_bounded_fetch(mut self, enabled: bool) -> Self {
        self.bounded_fetch = enabled;
        self
    }

    /// Create a partition, and any missing ancestors. Idempotent.
    pub fn create_partition(&self, path: &PartitionPath) {
        if self.partitions.contains_key(path) {
            return;
        }
        let parent = path.parent();
        if let Some(parent) = &parent {
            self.create_partition(parent);
        }
        self.partitions.entry(path.clone()).or_default();
        match parent.and_then(|p| self.partition(&p)) {
            Some(p) => {
                p.children.write().insert(path.clone());
            }
            None => {
                self.roots.write().insert(path.clone());
            }
        }
    }

    /// Insert or replace an entry, creating the partition if needed.
    pub fn put(&self, path: &PartitionPath, key: impl Into<String>, value: Value) {
        self.insert_entry(path, key.into(), Entry::new(value));
    }

    /// Keep the key but drop its value.
    pub fn invalidate(&self, path: &PartitionPath, key: impl Into<String>) {
        self.insert_entry(path, key.into(), Entry::invalidated());
    }

    /// Remove an entry entirely. Returns true if it existed.
    pub fn remove(&self, path: &PartitionPath, key: &str) -> bool {
        self.partition(path)
            .map(|p| p.entries.write().remove(key).is_some())
            .unwrap_or(false)
    }

    /// Number of partitions, nested ones included.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    fn insert_entry(&self, path: &PartitionPath, key: String, entry: Entry) {
        self.create_partition(path);
        if let Some(p) = self.partition(path) {
            p.entries.write().insert(key, entry);
        }
    }

    fn partition(&self, path: &PartitionPath) -> Option<Arc<Partition>> {
        self.partitions.get(path).map(|p| Arc::clone(p.value()))
    }

    fn require(&self, path: &PartitionPath) -> Result<Arc<Partition>> {
        self.partition(path)
            .ok_or_else(|| ProfilerError::PartitionNotFound(path.to_string()))
    }
}

impl CacheHost for MemoryStore {
    type Value = Value;

    fn member_name(&self) -> String {
        self.member.clone()
    }

    fn root_partitions(&self) -> Result<Vec<PartitionPath>> {
        Ok(self.roots.read().iter().cloned().collect())
    }

    fn subpartitions(&self, path: &PartitionPath) -> Vec<PartitionPath> {
        self.partition(path)
            .map(|p| p.children.read().iter().cloned().collect())
            .unwrap_or_default()
    }

    fn entry_count(&self, path: &PartitionPath) -> Result<u64> {
        Ok(self.require(path)?.entries.read().len() as u64)
    }

    fn iterate_keys(
        &self,
        path: &PartitionPath,
    ) -> Result<Box<dyn Iterator<Item = String> + '_>> {
        let partition = self.require(path)?;
        Ok(Box::new(KeyCursor {
            partition,
            last: None,
            buffer: VecDeque::with_capacity(KEY_BATCH),
            exhausted: false,
        }))
    }

    fn get(&self, path: &PartitionPath, key: &str) -> Option<Value> {
        let partition = self.partition(path)?;
        let entries = partition.entries.read();
        entries.get(key).and_then(|e| e.value.clone())
    }

    fn supports_bounded_fetch(&self, path: &PartitionPath) -> bool {
        self.bounded_fetch && self.partitions.contains_key(path)
    }

    fn fetch_bounded(&self, path: &PartitionPath, limit: u64) -> Result<Vec<Value>> {
        if !self.bounded_fetch {
            return Err(ProfilerError::BoundedFetchUnsupported(path.to_string()));
        }
        let partition = self.require(path)?;
        let entries = partition.entries.read();
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(Vec::new());
        }
        // Spread the picks across the whole partition rather than its head.
        let stride = (entries.len() / limit).max(1);
        Ok(entries
            .values()
            .step_by(stride)
            .filter_map(|e| e.value.clone())
            .take(limit)
            .collect())
    }
}

/// Lazy key iterator that re-acquires the partition lock once per batch.
///
/// Keys inserted or removed between batches may or may not be observed.
struct KeyCursor {
    partition: Arc<Partition>,
    last: Option<String>,
    buffer: VecDeque<String>,
    exhausted: bool,
}

impl KeyCursor {
    fn refill(&mut self) {
        let entries = self.partition.entries.read();
        let lower = match &self.last {
            Some(k) => Bound::Excluded(k.as_str()),
            None => Bound::Unbounded,
        };
        self.buffer.extend(
            entries
                .range::<str, _>((lower, Bound::Unbounded))
                .take(KEY_BATCH)
                .map(|(k, _)| k.clone()),
        );
        if self.buffer.len() < KEY_BATCH {
            self.exhausted = true;
        }
        if let Some(k) = self.buffer.back() {
            self.last = Some(k.clone());
        }
    }
}

impl Iterator for KeyCursor {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.buffer.is_empty() && !self.exhausted {
            self.refill();
        }
        self.buffer.pop_front()
    }
}
