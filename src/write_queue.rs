//! Write Queue
//!
//! Holds the latest un-flushed snapshot per table.
//!
//! ## Coalescing
//! Only the newest write per table is kept. A burst of writes to one table
//! within a debounce window therefore costs a single disk write carrying
//! the last snapshot; earlier snapshots were already visible through the
//! cache and are simply superseded.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// A snapshot waiting to be persisted
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub snapshot: Snapshot,

    /// Engine version assigned by the write that queued it
    pub version: u64,
}

/// Pending writes plus the flush scheduling flag
#[derive(Debug, Default)]
pub struct WriteQueue {
    pending: HashMap<String, PendingWrite>,

    /// True while a debounced flush is scheduled and has not yet taken
    /// its batch
    flush_scheduled: bool,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `snapshot` as the next write for `table`, replacing any
    /// un-flushed one
    ///
    /// Returns true when the caller must schedule a flush (none pending yet).
    pub fn enqueue(&mut self, table: &str, snapshot: Snapshot, version: u64) -> bool {
        self.pending
            .insert(table.to_string(), PendingWrite { snapshot, version });

        if self.flush_scheduled {
            false
        } else {
            self.flush_scheduled = true;
            true
        }
    }

    /// Take every pending write, leaving the queue empty and unscheduled
    pub fn take_batch(&mut self) -> HashMap<String, PendingWrite> {
        self.flush_scheduled = false;
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self, table: &str) -> bool {
        self.pending.contains_key(table)
    }

    pub fn pending(&self, table: &str) -> Option<&PendingWrite> {
        self.pending.get(table)
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Notification emitted once per table per flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    /// The table's queued snapshot is durable on disk
    Persisted { table: String, version: u64 },

    /// Persisting failed; the snapshot was dropped from this flush
    Failed {
        table: String,
        version: u64,
        error: String,
    },
}

impl WriteEvent {
    pub fn table(&self) -> &str {
        match self {
            WriteEvent::Persisted { table, .. } | WriteEvent::Failed { table, .. } => table,
        }
    }
}

/// Outcome of one flush batch
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Tables written successfully, sorted by name
    pub persisted: Vec<String>,

    /// Tables that failed, each with its own error
    pub failed: Vec<(String, StoreError)>,
}

impl FlushReport {
    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.persisted.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
