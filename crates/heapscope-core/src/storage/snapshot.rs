//! JSON cluster snapshots
//!
//! A snapshot describes the members of a cluster, their (possibly nested)
//! partitions and the entries in each, and loads into one [`MemoryStore`]
//! per member.
//!
//! ```json
//! {
//!   "members": [{
//!     "name": "server-1",
//!     "partitions": [{
//!       "name": "orders",
//!       "entries": {
//!         "o:1": "plain string",
//!         "o:2": { "blob": 5000000 },
//!         "o:3": ["list", "items"],
//!         "o:4": { "set": ["a", "b"] },
//!         "o:5": { "field": "value" },
//!         "o:6": null
//!       },
//!       "generate": [{ "prefix": "bulk", "count": 20000, "blob_bytes": 128 }],
//!       "partitions": [{ "name": "archive" }]
//!     }]
//!   }]
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CacheHost, MemoryStore, PartitionPath, Value};
use crate::error::{ProfilerError, Result};

/// All members of a cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Member snapshots, in report order.
    pub members: Vec<MemberSnapshot>,
}

/// One member's partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSnapshot {
    /// Member name.
    pub name: String,
    /// Whether the member offers an engine-native bounded fetch.
    #[serde(default = "default_bounded_fetch")]
    pub bounded_fetch: bool,
    /// Root partitions.
    #[serde(default)]
    pub partitions: Vec<PartitionSnapshot>,
}

fn default_bounded_fetch() -> bool {
    true
}

/// A partition, its entries and nested partitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    /// Partition name (a single path segment).
    pub name: String,
    /// Literal entries.
    #[serde(default)]
    pub entries: BTreeMap<String, SnapshotValue>,
    /// Synthesized runs of same-sized entries.
    #[serde(default)]
    pub generate: Vec<GeneratedEntries>,
    /// Nested partitions.
    #[serde(default)]
    pub partitions: Vec<PartitionSnapshot>,
}

/// `count` string entries named `<prefix>:<n>`, each `blob_bytes` long.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedEntries {
    /// Key prefix.
    pub prefix: String,
    /// Number of entries.
    pub count: u64,
    /// Payload length of each entry.
    pub blob_bytes: usize,
}

/// An entry value as written in a snapshot.
///
/// Variants are tried in declaration order, so `{"blob": 10}` and
/// `{"set": [...]}` take precedence over a hash with those field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotValue {
    /// Invalidated entry: key present, value absent.
    Null,
    /// String value.
    String(String),
    /// String value of `blob` filler bytes.
    Blob {
        /// Payload length.
        blob: usize,
    },
    /// Set value.
    Set {
        /// Members.
        set: Vec<String>,
    },
    /// List value.
    List(Vec<String>),
    /// Hash value.
    Hash(BTreeMap<String, String>),
}

impl SnapshotValue {
    /// Convert into a stored value. `None` for [`SnapshotValue::Null`].
    pub fn into_value(self) -> Option<Value> {
        let value = match self {
            SnapshotValue::Null => return None,
            SnapshotValue::String(s) => Value::String(Bytes::from(s)),
            SnapshotValue::Blob { blob } => Value::String(Bytes::from(vec![0u8; blob])),
            SnapshotValue::Set { set } => {
                Value::Set(set.into_iter().map(Bytes::from).collect::<HashSet<_>>())
            }
            SnapshotValue::List(items) => {
                Value::List(items.into_iter().map(Bytes::from).collect::<VecDeque<_>>())
            }
            SnapshotValue::Hash(fields) => Value::Hash(
                fields
                    .into_iter()
                    .map(|(k, v)| (Bytes::from(k), Bytes::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
        };
        Some(value)
    }
}

impl ClusterSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProfilerError::Snapshot(format!("Failed to read snapshot {:?}: {}", path, e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| ProfilerError::Snapshot(format!("Failed to parse snapshot: {}", e)))
    }

    /// Find a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberSnapshot> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Build one store per member, in snapshot order.
    pub fn into_stores(self) -> Vec<MemoryStore> {
        self.members.into_iter().map(MemberSnapshot::into_store).collect()
    }
}

impl MemberSnapshot {
    /// Build the member's store.
    pub fn into_store(self) -> MemoryStore {
        let store = MemoryStore::new(self.name).with_bounded_fetch(self.bounded_fetch);
        for partition in self.partitions {
            let path = PartitionPath::new(&partition.name);
            load_partition(&store, path, partition);
        }
        debug!(
            member = %store.member_name(),
            partitions = store.partition_count(),
            "Loaded member snapshot"
        );
        store
    }
}

fn load_partition(store: &MemoryStore, path: PartitionPath, snapshot: PartitionSnapshot) {
    store.create_partition(&path);

    for (key, value) in snapshot.entries {
        match value.into_value() {
            Some(v) => store.put(&path, key, v),
            None => store.invalidate(&path, key),
        }
    }

    for run in snapshot.generate {
        // one shared buffer; each entry still reports its own length
        let payload = Bytes::from(vec![0u8; run.blob_bytes]);
        for n in 0..run.count {
            store.put(
                &path,
                format!("{}:{}", run.prefix, n),
                Value::String(payload.clone()),
            );
        }
    }

    for child in snapshot.partitions {
        let child_path = path.child(&child.name);
        load_partition(store, child_path, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "members": [{
            "name": "server-1",
            "partitions": [{
                "name": "orders",
                "entries": {
                    "o:1": "hello",
                    "o:2": { "blob": 1024 },
                    "o:3": ["a", "b"],
                    "o:4": { "set": ["x"] },
                    "o:5": { "f": "v" },
                    "o:6": null
                },
                "generate": [{ "prefix": "bulk", "count": 10, "blob_bytes": 8 }],
                "partitions": [{ "name": "archive" }]
            }]
        }, {
            "name": "server-2",
            "bounded_fetch": false
        }]
    }"#;

    #[test]
    fn test_parse_value_variants() {
        let snapshot = ClusterSnapshot::from_json_str(SNAPSHOT).unwrap();
        let orders = &snapshot.members[0].partitions[0];
        assert_eq!(orders.entries["o:1"], SnapshotValue::String("hello".to_string()));
        assert_eq!(orders.entries["o:2"], SnapshotValue::Blob { blob: 1024 });
        assert!(matches!(orders.entries["o:3"], SnapshotValue::List(_)));
        assert!(matches!(orders.entries["o:4"], SnapshotValue::Set { .. }));
        assert!(matches!(orders.entries["o:5"], SnapshotValue::Hash(_)));
        assert_eq!(orders.entries["o:6"], SnapshotValue::Null);
        assert!(snapshot.members[0].bounded_fetch);
        assert!(!snapshot.members[1].bounded_fetch);
    }

    #[test]
    fn test_into_stores() {
        let snapshot = ClusterSnapshot::from_json_str(SNAPSHOT).unwrap();
        let stores = snapshot.into_stores();
        assert_eq!(stores.len(), 2);

        let orders = PartitionPath::new("/orders");
        assert_eq!(stores[0].entry_count(&orders).unwrap(), 16);
        assert_eq!(stores[0].get(&orders, "o:6"), None);
        assert_eq!(
            stores[0].get(&orders, "o:2"),
            Some(Value::String(Bytes::from(vec![0u8; 1024])))
        );
        assert_eq!(
            stores[0].subpartitions(&orders),
            vec![PartitionPath::new("/orders/archive")]
        );
        assert!(stores[1].root_partitions().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_snapshot() {
        let err = ClusterSnapshot::from_json_str("{\"members\": 3}").unwrap_err();
        assert!(matches!(err, ProfilerError::Snapshot(_)));
    }
}
