//! Storage Module
//!
//! Durable storage layer: one JSON file per table.
//!
//! ## Responsibilities
//! - Persist full table snapshots atomically (write temp, then rename)
//! - Report a missing table file as "not found", never as an error
//! - Persist and load secondary indexes sorted by one field
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//! ├── products.json            pretty-printed array of records
//! ├── products.json.tmp        only exists while a write is in progress
//! └── products.price.idx       records sorted by `price`
//! ```

mod file_store;
pub mod index;

pub use file_store::FileStore;

use crate::error::{Result, StoreError};

/// Check that a table or field name is safe to embed in a file name
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.chars().any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());

    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Check an indexed field name
///
/// Field names may not contain `.`: table `a.b` with field `c` and table
/// `a` with field `b.c` would otherwise share the file `a.b.c.idx`.
pub fn validate_field_name(field: &str) -> Result<()> {
    validate_name(field)?;
    if field.contains('.') {
        return Err(StoreError::InvalidName(field.to_string()));
    }
    Ok(())
}
