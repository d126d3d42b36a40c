//! Cache Module
//!
//! Bounded in-memory map from table name to its latest snapshot.
//!
//! ## Responsibilities
//! - Serve hot tables without touching disk
//! - Hold every write immediately (read-your-own-write)
//! - Track recency for least-recently-used eviction
//! - Keep memory bounded with high/low water mark hysteresis
//!
//! ## Eviction
//! Nothing is evicted until the cache holds more than `high_water` tables;
//! then the least recently accessed entries are dropped until `low_water`
//! remain. Evicting in a batch avoids paying a sort on every insert once
//! the cache is full.
//!
//! The cache is not internally synchronized: the engine mutates it under
//! the same lock as the write queue so both always change together.

mod table;

pub use table::TableCache;

use crate::snapshot::Snapshot;

/// One cached table
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Published snapshot, shared with every reader
    pub snapshot: Snapshot,

    /// Engine version at the time of promotion
    pub version: u64,

    /// Logical access tick; larger means more recently used
    pub last_access: u64,

    /// Reads served from this entry since it was promoted
    pub hits: u64,
}
