//! Configuration for tablestore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::storage::validate_name;

/// Main configuration for an engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all table files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {table}.json          (one file per table)
    ///     └── {table}.{field}.idx   (optional secondary indexes)
    pub data_dir: PathBuf,

    /// Tables loaded into the cache on connect
    pub preload_tables: Vec<String>,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Disk loads of a table before it is promoted into the cache
    pub hot_threshold: u32,

    /// Eviction starts once more than this many tables are cached
    pub cache_high_water: usize,

    /// Eviction removes entries until this many tables remain
    pub cache_low_water: usize,

    // -------------------------------------------------------------------------
    // Write Queue Configuration
    // -------------------------------------------------------------------------
    /// Debounce window between the first queued write and its flush
    pub flush_delay: Duration,

    /// Buffered write-complete events per subscriber
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            preload_tables: Vec::new(),
            hot_threshold: 10,
            cache_high_water: 50,
            cache_low_water: 40,
            flush_delay: Duration::from_millis(100),
            event_capacity: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.hot_threshold == 0 {
            return Err(StoreError::Config(
                "hot_threshold must be at least 1".to_string(),
            ));
        }
        if self.cache_low_water == 0 || self.cache_low_water > self.cache_high_water {
            return Err(StoreError::Config(format!(
                "cache water marks must satisfy 1 <= low ({}) <= high ({})",
                self.cache_low_water, self.cache_high_water
            )));
        }
        if self.event_capacity == 0 {
            return Err(StoreError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        for table in &self.preload_tables {
            validate_name(table)?;
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all table files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Add a table to preload on connect
    pub fn preload(mut self, table: impl Into<String>) -> Self {
        self.config.preload_tables.push(table.into());
        self
    }

    /// Replace the list of tables to preload on connect
    pub fn preload_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.preload_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Set how many disk loads make a table hot
    pub fn hot_threshold(mut self, loads: u32) -> Self {
        self.config.hot_threshold = loads;
        self
    }

    /// Set the eviction high/low water marks (in cached tables)
    pub fn cache_water_marks(mut self, low: usize, high: usize) -> Self {
        self.config.cache_low_water = low;
        self.config.cache_high_water = high;
        self
    }

    /// Set the write debounce window
    pub fn flush_delay(mut self, delay: std::time::Duration) -> Self {
        self.config.flush_delay = delay;
        self
    }

    /// Set the flush delay (in milliseconds)
    pub fn flush_delay_ms(self, ms: u64) -> Self {
        self.flush_delay(Duration::from_millis(ms))
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
