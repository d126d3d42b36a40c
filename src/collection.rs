//! Collection Module
//!
//! Record-level access to one table, addressed by primary key.
//!
//! Every mutation reads the table snapshot, edits a copy and writes the
//! whole table back. Two callers doing this concurrently from the same
//! starting snapshot race: the later `put` wins and the earlier change is
//! lost. There is no compare-and-swap.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::schema::TableSchema;
use crate::snapshot::{Record, Snapshot};
use crate::storage::index::compare_values;

/// Handle to one table of an [`Engine`]
#[derive(Clone)]
pub struct Collection {
    engine: Engine,
    schema: TableSchema,
}

impl Collection {
    pub(crate) fn new(engine: Engine, schema: TableSchema) -> Self {
        Self { engine, schema }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Every record in the table
    pub async fn all(&self) -> Result<Snapshot> {
        self.engine.get(&self.schema.table).await
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.all().await?.len())
    }

    /// Record whose primary key equals `key`
    pub async fn find(&self, key: &Value) -> Result<Option<Record>> {
        let snapshot = self.all().await?;
        Ok(snapshot.iter().find(|r| self.has_key(r, key)).cloned())
    }

    /// Append a record
    ///
    /// A record without a primary key gets the next integer key (one past
    /// the largest integer key present, starting at 1). Returns the record
    /// as stored.
    pub async fn insert(&self, mut record: Record) -> Result<Record> {
        let pk = &self.schema.primary_key;
        let snapshot = self.all().await?;

        let fields = record.as_object_mut().ok_or_else(|| {
            StoreError::InvalidRecord(format!(
                "records in '{}' must be JSON objects",
                self.schema.table
            ))
        })?;

        match fields.get(pk) {
            None | Some(Value::Null) => {
                let key = self.next_key(&snapshot)?;
                fields.insert(pk.clone(), Value::from(key));
            }
            Some(key) => {
                if snapshot.iter().any(|r| self.has_key(r, key)) {
                    return Err(StoreError::DuplicateKey {
                        table: self.schema.table.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }

        let mut records = snapshot.to_vec();
        records.push(record.clone());
        self.engine.put(&self.schema.table, records).await?;

        Ok(record)
    }

    /// Merge `changes` into the record with primary key `key`
    ///
    /// Returns the updated record, or `None` if no record has that key.
    /// The primary key itself cannot be changed.
    pub async fn update(&self, key: &Value, changes: Map<String, Value>) -> Result<Option<Record>> {
        if let Some(new_key) = changes.get(&self.schema.primary_key) {
            if compare_values(new_key, key) != Ordering::Equal {
                return Err(StoreError::InvalidRecord(format!(
                    "primary key '{}' cannot be changed",
                    self.schema.primary_key
                )));
            }
        }

        let mut records = self.all().await?.to_vec();

        let updated = match records.iter_mut().find(|r| self.has_key(r, key)) {
            Some(record) => {
                if let Some(fields) = record.as_object_mut() {
                    fields.extend(changes);
                }
                record.clone()
            }
            None => return Ok(None),
        };

        self.engine.put(&self.schema.table, records).await?;
        Ok(Some(updated))
    }

    /// Delete the record with primary key `key`, returning whether it existed
    pub async fn remove(&self, key: &Value) -> Result<bool> {
        let snapshot = self.all().await?;
        let before = snapshot.len();

        let records: Vec<Record> = snapshot
            .iter()
            .filter(|r| !self.has_key(r, key))
            .cloned()
            .collect();

        if records.len() == before {
            return Ok(false);
        }

        self.engine.put(&self.schema.table, records).await?;
        Ok(true)
    }

    fn has_key(&self, record: &Record, key: &Value) -> bool {
        record
            .get(&self.schema.primary_key)
            .map_or(false, |v| compare_values(v, key) == Ordering::Equal)
    }

    fn next_key(&self, snapshot: &Snapshot) -> Result<i64> {
        let largest = snapshot
            .iter()
            .filter_map(|r| r.get(&self.schema.primary_key).and_then(Value::as_i64))
            .max();

        match largest {
            None => Ok(1),
            Some(max) => max.checked_add(1).ok_or_else(|| {
                StoreError::InvalidRecord(format!(
                    "no integer key left after {} in '{}'",
                    max, self.schema.table
                ))
            }),
        }
    }
}
