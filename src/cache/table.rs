//! TableCache implementation
//!
//! HashMap-based cache with a logical clock for LRU ordering.

use std::collections::HashMap;

use tracing::debug;

use super::CacheEntry;
use crate::snapshot::Snapshot;

/// Bounded cache of table snapshots
#[derive(Debug)]
pub struct TableCache {
    entries: HashMap<String, CacheEntry>,

    /// Monotonic access clock; ticks on every promotion and hit
    clock: u64,

    high_water: usize,
    low_water: usize,
}

impl TableCache {
    /// Create an empty cache with the given water marks
    pub fn new(low_water: usize, high_water: usize) -> Self {
        Self {
            entries: HashMap::new(),
            clock: 0,
            high_water,
            low_water: low_water.min(high_water),
        }
    }

    /// Look up a table, marking it as accessed
    pub fn get(&mut self, table: &str) -> Option<Snapshot> {
        let tick = self.tick();
        let entry = self.entries.get_mut(table)?;
        entry.last_access = tick;
        entry.hits += 1;
        Some(entry.snapshot.clone())
    }

    /// Mark a table as accessed without reading it
    pub fn touch(&mut self, table: &str) -> bool {
        let tick = self.tick();
        match self.entries.get_mut(table) {
            Some(entry) => {
                entry.last_access = tick;
                true
            }
            None => false,
        }
    }

    /// Insert or replace a table's snapshot, tagged with `version`
    pub fn promote(&mut self, table: &str, snapshot: Snapshot, version: u64) {
        let tick = self.tick();
        let entry = CacheEntry {
            snapshot,
            version,
            last_access: tick,
            hits: 0,
        };
        self.entries.insert(table.to_string(), entry);
    }

    /// Evict least recently accessed tables once above the high water mark
    ///
    /// Returns the evicted table names, oldest first.
    pub fn evict_if_needed(&mut self) -> Vec<String> {
        if self.entries.len() <= self.high_water {
            return Vec::new();
        }

        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(name, entry)| (entry.last_access, name.clone()))
            .collect();
        by_age.sort_unstable();

        let excess = self.entries.len() - self.low_water;
        let evicted: Vec<String> = by_age
            .into_iter()
            .take(excess)
            .map(|(_, name)| name)
            .collect();

        for name in &evicted {
            self.entries.remove(name);
        }

        debug!(
            evicted = evicted.len(),
            remaining = self.entries.len(),
            "cache eviction"
        );
        evicted
    }

    pub fn contains(&self, table: &str) -> bool {
        self.entries.contains_key(table)
    }

    /// Peek at an entry without affecting recency
    pub fn entry(&self, table: &str) -> Option<&CacheEntry> {
        self.entries.get(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached table names, most recently accessed first
    pub fn tables_by_recency(&self) -> Vec<String> {
        let mut tables: Vec<(&String, u64)> = self
            .entries
            .iter()
            .map(|(name, entry)| (name, entry.last_access))
            .collect();
        tables.sort_unstable_by(|a, b| b.1.cmp(&a.1));
        tables.into_iter().map(|(name, _)| name.clone()).collect()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}
