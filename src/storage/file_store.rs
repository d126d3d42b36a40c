//! File Store
//!
//! Reads and writes one file per table in the data directory.
//!
//! ## Responsibilities
//! - Map table names to `{table}.json` and indexes to `{table}.{field}.idx`
//! - Atomic replace: a reader never observes a partially written file
//! - Discover existing tables on disk

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::snapshot::{Record, Snapshot};

use super::{validate_field_name, validate_name};

/// Stable storage for table snapshots
///
/// Stateless apart from the directory path, so clones can be moved into
/// blocking tasks freely.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory holding table and index files
    data_dir: PathBuf,
}

impl FileStore {
    const TABLE_EXT: &'static str = "json";
    const INDEX_EXT: &'static str = "idx";
    const TEMP_SUFFIX: &'static str = ".tmp";

    /// Open a file store rooted at `path`, creating the directory if needed
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        Ok(Self {
            data_dir: path.to_path_buf(),
        })
    }

    /// Load a table snapshot
    ///
    /// Returns:
    /// - `Ok(Some(snapshot))` — table file exists and decoded
    /// - `Ok(None)` — no file for this table
    /// - `Err(_)` — unreadable or corrupt file
    pub fn load(&self, table: &str) -> Result<Option<Snapshot>> {
        validate_name(table)?;
        Ok(self.read_records(&self.table_path(table))?.map(Snapshot::new))
    }

    /// Replace a table's file with the given snapshot
    pub fn store(&self, table: &str, snapshot: &Snapshot) -> Result<()> {
        validate_name(table)?;
        self.write_records(&self.table_path(table), snapshot.records())
    }

    /// Load a persisted index, `Ok(None)` when it was never built
    pub fn load_index(&self, table: &str, field: &str) -> Result<Option<Vec<Record>>> {
        validate_name(table)?;
        validate_field_name(field)?;
        self.read_records(&self.index_path(table, field))
    }

    /// Persist an index (records already sorted by `field`)
    pub fn store_index(&self, table: &str, field: &str, sorted: &[Record]) -> Result<()> {
        validate_name(table)?;
        validate_field_name(field)?;
        self.write_records(&self.index_path(table, field), sorted)
    }

    /// Delete a persisted index, returning whether one existed
    pub fn remove_index(&self, table: &str, field: &str) -> Result<bool> {
        validate_name(table)?;
        validate_field_name(field)?;

        match fs::remove_file(self.index_path(table, field)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all tables with a file in the data directory, sorted
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut tables = Vec::new();

        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() {
                if let Some(table) = Self::parse_table_name(&path) {
                    tables.push(table);
                }
            }
        }

        tables.sort();
        Ok(tables)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `{data_dir}/{table}.json`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", table, Self::TABLE_EXT))
    }

    /// `{data_dir}/{table}.{field}.idx`
    pub fn index_path(&self, table: &str, field: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}.{}", table, field, Self::INDEX_EXT))
    }

    /// Temporary sibling used while replacing `path`
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(Self::TEMP_SUFFIX);
        PathBuf::from(name)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_records(&self, path: &Path) -> Result<Option<Vec<Record>>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let records = serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(records))
    }

    /// Write to `{path}.tmp`, fsync, then rename over `path`.
    ///
    /// The rename is the commit point: a crash before it leaves the old file
    /// untouched (plus a stray temp file), a crash after it leaves the new one.
    fn write_records(&self, path: &Path, records: &[Record]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp_path = Self::temp_path(path);

        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });

        if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Parse table name from filename
    /// "products.json" → Some("products"), "products.json.tmp" → None
    fn parse_table_name(path: &Path) -> Option<String> {
        if path.extension()? != Self::TABLE_EXT {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        validate_name(stem).ok()?;
        Some(stem.to_string())
    }
}
