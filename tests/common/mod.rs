//! Shared test utilities for heapscope integration tests.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use bytes::Bytes;

use heapscope::storage::{ClusterSnapshot, MemoryStore, PartitionPath, Value};

/// Bytes per MiB.
#[allow(dead_code)]
pub const MIB: u64 = 1_048_576;

/// String value of exactly `len` payload bytes.
#[allow(dead_code)]
pub fn blob(len: usize) -> Value {
    Value::String(Bytes::from(vec![0u8; len]))
}

/// Fill `path` with `count` entries sharing one payload of `len` bytes.
#[allow(dead_code)]
pub fn fill(store: &MemoryStore, path: &PartitionPath, count: usize, len: usize) {
    let payload = Bytes::from(vec![0u8; len]);
    for i in 0..count {
        store.put(path, format!("k:{i:07}"), Value::String(payload.clone()));
    }
}

/// A three-member snapshot whose largest objects are 2, 20 and 9 MiB.
#[allow(dead_code)]
pub fn three_member_snapshot() -> ClusterSnapshot {
    let json = format!(
        r#"{{
  "members": [
    {{
      "name": "server-1",
      "partitions": [{{
        "name": "orders",
        "entries": {{ "o:1": {{ "blob": {two} }}, "o:2": "small" }},
        "generate": [{{ "prefix": "bulk", "count": 500, "blob_bytes": 64 }}]
      }}]
    }},
    {{
      "name": "server-2",
      "bounded_fetch": false,
      "partitions": [{{
        "name": "media",
        "entries": {{ "m:1": {{ "blob": {twenty} }} }},
        "partitions": [{{ "name": "thumbs", "entries": {{ "t:1": {{ "blob": 4096 }} }} }}]
      }}]
    }},
    {{
      "name": "server-3",
      "partitions": [
        {{ "name": "sessions", "entries": {{ "s:1": {{ "blob": {nine} }}, "s:2": null }} }},
        {{ "name": "idle" }}
      ]
    }}
  ]
}}"#,
        two = 2 * MIB,
        twenty = 20 * MIB,
        nine = 9 * MIB,
    );
    match ClusterSnapshot::from_json_str(&json) {
        Ok(snapshot) => snapshot,
        Err(e) => panic!("fixture snapshot must parse: {e}"),
    }
}
