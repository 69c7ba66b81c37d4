//! Deep sizer for stored values
//!
//! Walks a [`Value`] and sums the header, payload and per-element
//! bookkeeping that make up its resident footprint. Each component kind is
//! put to the [`ObjectFilter`] once per value, so excluding e.g. `overhead`
//! measures payload alone.

use std::sync::Arc;

use crate::error::{ProfilerError, Result};
use crate::storage::Value;

use super::{AcceptAll, ObjectFilter, SizeEstimator};

/// Fixed cost of a string value (handle plus entry header)
const STRING_HEADER: u64 = 32;
/// Fixed cost of a collection value
const COLLECTION_HEADER: u64 = 64;
/// Per-element cost of a list node
const LIST_NODE: u64 = 16;
/// Per-pair cost of a hash bucket
const HASH_BUCKET: u64 = 48;
/// Per-member cost of a set bucket
const SET_BUCKET: u64 = 24;

/// Parts of a value the sizer accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Fixed per-value header.
    Header,
    /// String payload bytes.
    Payload,
    /// List or set member bytes.
    Element,
    /// Hash field name bytes.
    Field,
    /// Hash field value bytes.
    FieldValue,
    /// Per-element bookkeeping (nodes, buckets, handles).
    Overhead,
}

impl Component {
    const ALL: [Component; 6] = [
        Component::Header,
        Component::Payload,
        Component::Element,
        Component::Field,
        Component::FieldValue,
        Component::Overhead,
    ];

    /// Name passed to the filter as the child.
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Header => "header",
            Component::Payload => "payload",
            Component::Element => "element",
            Component::Field => "field",
            Component::FieldValue => "value",
            Component::Overhead => "overhead",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Deep size estimator for [`Value`].
#[derive(Clone)]
pub struct DeepSizer {
    filter: Arc<dyn ObjectFilter>,
}

impl DeepSizer {
    /// Sizer that counts every component.
    pub fn new() -> Self {
        Self {
            filter: Arc::new(AcceptAll),
        }
    }

    /// Sizer that consults `filter` for each component kind.
    pub fn with_filter(filter: impl ObjectFilter + 'static) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }
}

impl Default for DeepSizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeepSizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSizer").finish_non_exhaustive()
    }
}

/// Running total for one value, with the filter verdicts resolved up front.
struct Tally {
    type_name: &'static str,
    accepted: [bool; 6],
    total: u64,
}

impl Tally {
    fn new(type_name: &'static str, filter: &dyn ObjectFilter) -> Self {
        let mut accepted = [true; 6];
        for component in Component::ALL {
            accepted[component.index()] = filter.accept(type_name, component.as_str());
        }
        Self {
            type_name,
            accepted,
            total: 0,
        }
    }

    fn add(&mut self, component: Component, bytes: u64) -> Result<()> {
        if !self.accepted[component.index()] {
            return Ok(());
        }
        self.total = self.total.checked_add(bytes).ok_or_else(|| {
            ProfilerError::Estimation(format!(
                "size of {} overflowed while adding {}",
                self.type_name,
                component.as_str()
            ))
        })?;
        Ok(())
    }
}

impl SizeEstimator<Value> for DeepSizer {
    fn estimate_size(&self, value: &Value) -> Result<u64> {
        let mut tally = Tally::new(value.type_name(), self.filter.as_ref());

        match value {
            Value::String(payload) => {
                tally.add(Component::Header, STRING_HEADER)?;
                tally.add(Component::Payload, payload.len() as u64)?;
            }
            Value::List(items) => {
                tally.add(Component::Header, COLLECTION_HEADER)?;
                for item in items {
                    tally.add(Component::Overhead, LIST_NODE)?;
                    tally.add(Component::Element, item.len() as u64)?;
                }
            }
            Value::Hash(fields) => {
                tally.add(Component::Header, COLLECTION_HEADER)?;
                for (field, field_value) in fields {
                    tally.add(Component::Overhead, HASH_BUCKET)?;
                    tally.add(Component::Field, field.len() as u64)?;
                    tally.add(Component::FieldValue, field_value.len() as u64)?;
                }
            }
            Value::Set(members) => {
                tally.add(Component::Header, COLLECTION_HEADER)?;
                for member in members {
                    tally.add(Component::Overhead, SET_BUCKET)?;
                    tally.add(Component::Element, member.len() as u64)?;
                }
            }
        }

        Ok(tally.total)
    }

    fn type_name(&self, value: &Value) -> String {
        value.type_name().to_string()
    }
}
