//! Error types for tablestore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for tablestore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Table Errors
    // -------------------------------------------------------------------------
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// A disk load failed; every caller coalesced onto that load receives
    /// the same underlying error.
    #[error("Load of table '{table}' failed: {source}")]
    Load {
        table: String,
        #[source]
        source: Arc<StoreError>,
    },

    #[error("Flush failed for tables: {}", .tables.join(", "))]
    FlushFailed { tables: Vec<String> },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Duplicate key {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    // -------------------------------------------------------------------------
    // Runtime Errors
    // -------------------------------------------------------------------------
    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// True for failures caused by unreadable or corrupt file contents,
    /// looking through a coalesced load wrapper.
    pub fn is_decode(&self) -> bool {
        match self {
            StoreError::Decode { .. } => true,
            StoreError::Load { source, .. } => source.is_decode(),
            _ => false,
        }
    }
}
