//! Table snapshots
//!
//! A snapshot is the entire content of one table at a point in logical
//! time. Snapshots are immutable once built: writers replace a table by
//! publishing a new snapshot, never by editing an existing one.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One record: an open mapping of field name to value.
///
/// By convention a record is a JSON object carrying a unique primary key,
/// but the store itself never inspects record shape.
pub type Record = serde_json::Value;

/// Immutable, shared sequence of records
///
/// Cloning is cheap (reference-counted) and hands out a read-only view, so
/// callers can never mutate what the cache holds. Use [`Snapshot::to_vec`]
/// for an owned, editable copy.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Arc<Vec<Record>>,
}

impl Snapshot {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// An empty snapshot (how a missing table file reads)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Owned copy of the records, safe to modify
    pub fn to_vec(&self) -> Vec<Record> {
        self.records.as_ref().clone()
    }

    /// True when both snapshots are the same published instance
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }
}

impl Deref for Snapshot {
    type Target = [Record];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.records == other.records
    }
}

impl Eq for Snapshot {}

impl From<Vec<Record>> for Snapshot {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Record>::deserialize(deserializer).map(Self::new)
    }
}
