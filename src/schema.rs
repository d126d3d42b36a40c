//! Table schemas
//!
//! Per-table metadata that record-level callers need and the store itself
//! ignores. Passed explicitly to each [`Collection`](crate::Collection).

use serde::{Deserialize, Serialize};

/// Primary key used when a schema does not name one
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Describes one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name (and file stem)
    pub table: String,

    /// Field holding each record's unique key
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
        }
    }

    /// Schema keyed by `id`
    pub fn keyed_by_id(table: impl Into<String>) -> Self {
        Self::new(table, DEFAULT_PRIMARY_KEY)
    }
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}
