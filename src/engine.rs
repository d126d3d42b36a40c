//! Engine Module
//!
//! The cache-coherent storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Serve reads from the cache, a shared in-flight load, or a fresh load
//! - Apply writes to the cache immediately and queue them for disk
//! - Debounce and batch queued writes into one flush per window
//! - Build and query best-effort secondary indexes
//! - Preload on connect, flush everything on close

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::cache::TableCache;
use crate::collection::Collection;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::schema::TableSchema;
use crate::snapshot::{Record, Snapshot};
use crate::storage::{index, validate_field_name, validate_name, FileStore};
use crate::write_queue::{FlushReport, WriteEvent, WriteQueue};

/// Outcome of a disk load, shared by every coalesced caller
type LoadResult = std::result::Result<Snapshot, Arc<StoreError>>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// The main storage engine
///
/// `Engine` is a cheap handle: clones share one cache, one write queue and
/// one data directory. Construct it once with [`Engine::connect`], pass
/// clones to whoever needs table access, and finish with [`Engine::close`].
///
/// ## Concurrency Model
///
/// - All cache, write-queue, in-flight and hotness state sits behind a
///   single `parking_lot::Mutex` that is never held across an `.await`.
///   Every state change is therefore one uninterrupted critical section.
/// - Disk I/O runs on the blocking pool and is the only suspension point
///   besides the flush timer.
/// - Flushes are serialized by `flush_lock`, so two batches can never race
///   renames of the same table file.
/// - There is no cross-process locking: one process per data directory.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,

    /// Stable file store (one JSON file per table)
    files: FileStore,

    /// Mutable engine state, see [`State`]
    state: Mutex<State>,

    /// Held for the whole duration of a flush batch
    flush_lock: tokio::sync::Mutex<()>,

    /// Write-complete notifications
    events: broadcast::Sender<WriteEvent>,

    closed: AtomicBool,

    // Counters (lock-free, for stats)
    disk_loads: AtomicU64,
    disk_writes: AtomicU64,
    flushes: AtomicU64,
}

struct State {
    /// Process-wide version, bumped on every write
    version: u64,

    cache: TableCache,

    queue: WriteQueue,

    /// Disk loads currently running, keyed by table
    inflight: HashMap<String, InflightLoad>,

    /// Completed disk loads per uncached table (promotion counter)
    read_counts: HashMap<String, u32>,

    /// Latest write version per table whose flush has not finished yet.
    /// While a table is listed here its file may be older than its last
    /// write, so disk loads of it are never promoted.
    unsettled: HashMap<String, u64>,

    /// Version of the most recent write per table
    last_write: HashMap<String, u64>,

    /// Id source for in-flight registrations
    next_load_id: u64,
}

struct InflightLoad {
    id: u64,
    load: SharedLoad,
}

/// Engine state captured when a disk load is registered
struct LoadStart {
    id: u64,

    /// Process version at registration
    version: u64,

    /// No write to the table was unsettled at registration
    promotable: bool,
}

/// Result of building a secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub table: String,
    pub field: String,

    /// Number of records in the index
    pub len: usize,
}

/// Point-in-time engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Current process-wide write version
    pub version: u64,
    pub cached_tables: usize,
    pub pending_writes: usize,
    pub inflight_loads: usize,

    /// Table files read from disk (including preloads)
    pub disk_loads: u64,

    /// Table files successfully written
    pub disk_writes: u64,

    /// Non-empty flush batches executed
    pub flushes: u64,
}

impl Engine {
    /// Open the data directory and preload the configured tables
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Create the data directory if it doesn't exist
    /// 3. Load each preload table into the cache (failures are logged and
    ///    skipped; a missing file preloads as an empty table)
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;

        let data_dir = config.data_dir.clone();
        let files = run_blocking(move || FileStore::open(&data_dir)).await?;

        let (events, _) = broadcast::channel(config.event_capacity);

        let state = State {
            version: 0,
            cache: TableCache::new(config.cache_low_water, config.cache_high_water),
            queue: WriteQueue::new(),
            inflight: HashMap::new(),
            read_counts: HashMap::new(),
            unsettled: HashMap::new(),
            last_write: HashMap::new(),
            next_load_id: 0,
        };

        let engine = Self {
            inner: Arc::new(Inner {
                config,
                files,
                state: Mutex::new(state),
                flush_lock: tokio::sync::Mutex::new(()),
                events,
                closed: AtomicBool::new(false),
                disk_loads: AtomicU64::new(0),
                disk_writes: AtomicU64::new(0),
                flushes: AtomicU64::new(0),
            }),
        };

        engine.preload().await;

        info!(
            data_dir = %engine.data_dir().display(),
            cached = engine.inner.state.lock().cache.len(),
            "engine connected"
        );
        Ok(engine)
    }

    /// Connect with default config rooted at `path`
    pub async fn connect_path(path: &Path) -> Result<Self> {
        Self::connect(Config::builder().data_dir(path).build()).await
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Read the current snapshot of a table
    ///
    /// Resolution order:
    /// 1. Cached entry (returns without suspending)
    /// 2. A disk load already in flight for this table (shared result)
    /// 3. A new disk load; a missing file reads as an empty table
    ///
    /// A table is promoted into the cache once it has been loaded from disk
    /// `hot_threshold` times.
    pub async fn get(&self, table: &str) -> Result<Snapshot> {
        validate_name(table)?;
        self.ensure_open()?;

        let load = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            if let Some(snapshot) = state.cache.get(table) {
                debug!(table, "cache hit");
                return Ok(snapshot);
            }

            match state.inflight.get(table) {
                Some(inflight) => {
                    debug!(table, "joining in-flight load");
                    inflight.load.clone()
                }
                None => {
                    state.next_load_id += 1;
                    let id = state.next_load_id;
                    let start = LoadStart {
                        id,
                        version: state.version,
                        promotable: !state.unsettled.contains_key(table),
                    };
                    let load = Inner::start_load(&self.inner, table, start);
                    state.inflight.insert(
                        table.to_string(),
                        InflightLoad {
                            id,
                            load: load.clone(),
                        },
                    );
                    debug!(table, "cache miss, loading from disk");
                    load
                }
            }
        };

        load.await.map_err(|source| StoreError::Load {
            table: table.to_string(),
            source,
        })
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Replace a table's content
    ///
    /// Resolves as soon as the cache holds the new snapshot; later reads
    /// observe it immediately. The disk write happens in the next flush,
    /// at most `flush_delay` later.
    pub async fn put(&self, table: &str, records: Vec<Record>) -> Result<()> {
        self.put_snapshot(table, Snapshot::new(records)).await
    }

    /// Replace a table's content with an existing snapshot
    pub async fn put_snapshot(&self, table: &str, snapshot: Snapshot) -> Result<()> {
        validate_name(table)?;
        self.ensure_open()?;

        let (version, schedule) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            state.version += 1;
            let version = state.version;

            state.cache.promote(table, snapshot.clone(), version);
            state.cache.evict_if_needed();
            state.read_counts.remove(table);
            state.unsettled.insert(table.to_string(), version);
            state.last_write.insert(table.to_string(), version);

            (version, state.queue.enqueue(table, snapshot, version))
        };

        debug!(table, version, "write queued");

        if schedule {
            self.inner.schedule_flush();
        }

        Ok(())
    }

    /// Write every pending snapshot to disk now
    ///
    /// Waits for any flush already in progress first. Per-table failures are
    /// reported in the returned [`FlushReport`], not as an error.
    pub async fn flush(&self) -> Result<FlushReport> {
        self.ensure_open()?;
        Ok(self.inner.flush_pending().await)
    }

    /// Close the engine gracefully
    ///
    /// Rejects further operations, then flushes all pending writes. Returns
    /// `FlushFailed` naming the tables that could not be persisted.
    /// Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let report = self.inner.flush_pending().await;
        info!(
            persisted = report.persisted.len(),
            failed = report.failed.len(),
            "engine closed"
        );

        if report.is_clean() {
            Ok(())
        } else {
            Err(StoreError::FlushFailed {
                tables: report.failed.into_iter().map(|(table, _)| table).collect(),
            })
        }
    }

    /// Receive a [`WriteEvent`] for every table each flush persists
    pub fn subscribe(&self) -> broadcast::Receiver<WriteEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Secondary Indexes
    // =========================================================================

    /// Persist `table` sorted by `field` as `{table}.{field}.idx`
    ///
    /// Built from the current snapshot (including unflushed writes). The
    /// index is not maintained afterwards: rebuild it after writes.
    pub async fn build_index(&self, table: &str, field: &str) -> Result<IndexInfo> {
        validate_name(table)?;
        validate_field_name(field)?;

        let snapshot = self.get(table).await?;
        let mut sorted = snapshot.to_vec();
        index::sort_by_field(&mut sorted, field);
        let len = sorted.len();

        let files = self.inner.files.clone();
        let (t, f) = (table.to_string(), field.to_string());
        run_blocking(move || files.store_index(&t, &f, &sorted)).await?;

        debug!(table, field, len, "index built");
        Ok(IndexInfo {
            table: table.to_string(),
            field: field.to_string(),
            len,
        })
    }

    /// Records whose `field` lies in `[min, max]`, ordered by `field`
    ///
    /// Uses the persisted index when it loads; otherwise scans the full
    /// table. Both paths return the same records in the same order, except
    /// that an index built before later writes returns its older view.
    pub async fn range_query(
        &self,
        table: &str,
        field: &str,
        min: &Value,
        max: &Value,
    ) -> Result<Snapshot> {
        validate_name(table)?;
        validate_field_name(field)?;
        self.ensure_open()?;

        let files = self.inner.files.clone();
        let (t, f) = (table.to_string(), field.to_string());

        match run_blocking(move || files.load_index(&t, &f)).await {
            Ok(Some(sorted)) => {
                let (lo, hi) = index::range_bounds(&sorted, field, min, max);
                debug!(table, field, matched = hi - lo, "range query via index");
                return Ok(Snapshot::new(sorted[lo..hi].to_vec()));
            }
            Ok(None) => debug!(table, field, "no index, scanning table"),
            Err(e) => warn!(table, field, error = %e, "index unreadable, scanning table"),
        }

        let snapshot = self.get(table).await?;
        Ok(Snapshot::new(index::filter_range(&snapshot, field, min, max)))
    }

    /// Delete a persisted index, returning whether one existed
    pub async fn drop_index(&self, table: &str, field: &str) -> Result<bool> {
        validate_name(table)?;
        validate_field_name(field)?;
        self.ensure_open()?;

        let files = self.inner.files.clone();
        let (t, f) = (table.to_string(), field.to_string());
        run_blocking(move || files.remove_index(&t, &f)).await
    }

    // =========================================================================
    // Collaborators
    // =========================================================================

    /// Record-level access to one table keyed by its primary key
    pub fn collection(&self, schema: TableSchema) -> Collection {
        Collection::new(self.clone(), schema)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn stats(&self) -> EngineStats {
        let state = self.inner.state.lock();

        EngineStats {
            version: state.version,
            cached_tables: state.cache.len(),
            pending_writes: state.queue.len(),
            inflight_loads: state.inflight.len(),
            disk_loads: self.inner.disk_loads.load(Ordering::Relaxed),
            disk_writes: self.inner.disk_writes.load(Ordering::Relaxed),
            flushes: self.inner.flushes.load(Ordering::Relaxed),
        }
    }

    /// Whether a table is resident in the cache
    pub fn is_cached(&self, table: &str) -> bool {
        self.inner.state.lock().cache.contains(table)
    }

    /// Version tag of a cached table
    pub fn cached_version(&self, table: &str) -> Option<u64> {
        self.inner
            .state
            .lock()
            .cache
            .entry(table)
            .map(|entry| entry.version)
    }

    /// Cached tables, most recently accessed first
    pub fn cached_tables(&self) -> Vec<String> {
        self.inner.state.lock().cache.tables_by_recency()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        self.inner.files.data_dir()
    }

    pub fn file_store(&self) -> &FileStore {
        &self.inner.files
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn preload(&self) {
        for table in &self.inner.config.preload_tables {
            match self.inner.load_from_disk(table).await {
                Ok(snapshot) => {
                    let mut guard = self.inner.state.lock();
                    let state = &mut *guard;
                    if !state.cache.contains(table) {
                        let version = state.version;
                        state.cache.promote(table, snapshot, version);
                        state.cache.evict_if_needed();
                    }
                }
                Err(e) => warn!(table = table.as_str(), error = %e, "preload failed, skipping"),
            }
        }
    }
}

impl Inner {
    /// Spawn the disk load for `table` and wrap it for sharing
    ///
    /// The load runs in its own task, so it completes even if every caller
    /// waiting on it goes away.
    fn start_load(this: &Arc<Self>, table: &str, start: LoadStart) -> SharedLoad {
        let inner = Arc::clone(this);
        let name = table.to_string();

        let task = tokio::spawn(async move {
            let _registration = InflightGuard {
                inner: Arc::clone(&inner),
                table: name.clone(),
                id: start.id,
            };

            let result = inner.load_from_disk(&name).await;
            inner.finish_load(&name, &start, &result);
            result.map_err(Arc::new)
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Arc::new(StoreError::Task(e.to_string()))),
            }
        }
        .boxed()
        .shared()
    }

    async fn load_from_disk(&self, table: &str) -> Result<Snapshot> {
        self.disk_loads.fetch_add(1, Ordering::Relaxed);

        let files = self.files.clone();
        let name = table.to_string();
        let loaded = run_blocking(move || files.load(&name)).await?;

        Ok(loaded.unwrap_or_else(Snapshot::empty))
    }

    /// Settle a disk load: drop its registration and count it towards
    /// promotion
    ///
    /// A load never replaces a cached entry. It is not promoted if a write
    /// to the table was unsettled when it started or finished, or if the
    /// table was written while it ran: the file it read may predate that
    /// write.
    fn finish_load(&self, table: &str, start: &LoadStart, result: &Result<Snapshot>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.remove_inflight(table, start.id);

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(_) => return,
        };

        let written_since = state
            .last_write
            .get(table)
            .map_or(false, |&version| version > start.version);

        if !start.promotable
            || written_since
            || state.cache.contains(table)
            || state.unsettled.contains_key(table)
        {
            return;
        }

        let count = state.read_counts.entry(table.to_string()).or_insert(0);
        *count += 1;

        if *count >= self.config.hot_threshold {
            state.read_counts.remove(table);
            let version = state.version;
            state.cache.promote(table, snapshot.clone(), version);
            state.cache.evict_if_needed();
            debug!(table, version, "hot table promoted");
        }
    }

    /// Arm the debounce timer; the flush runs `flush_delay` from now
    fn schedule_flush(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let delay = self.config.flush_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let report = inner.flush_pending().await;
            if !report.is_clean() {
                error!(
                    failed = report.failed.len(),
                    persisted = report.persisted.len(),
                    "background flush incomplete"
                );
            }
        });
    }

    /// Take the whole pending batch and persist each table concurrently
    async fn flush_pending(&self) -> FlushReport {
        let _flush_guard = self.flush_lock.lock().await;

        let batch = self.state.lock().queue.take_batch();
        if batch.is_empty() {
            return FlushReport::default();
        }

        self.flushes.fetch_add(1, Ordering::Relaxed);
        debug!(tables = batch.len(), "flushing write batch");

        let writes = batch.into_iter().map(|(table, pending)| {
            let files = self.files.clone();
            let name = table.clone();
            let snapshot = pending.snapshot;
            let version = pending.version;

            async move {
                let result = run_blocking(move || files.store(&name, &snapshot)).await;
                (table, version, result)
            }
        });

        let mut report = FlushReport::default();

        for (table, version, result) in join_all(writes).await {
            self.state.lock().settle(&table, version);

            match result {
                Ok(()) => {
                    self.disk_writes.fetch_add(1, Ordering::Relaxed);
                    let _ = self.events.send(WriteEvent::Persisted {
                        table: table.clone(),
                        version,
                    });
                    report.persisted.push(table);
                }
                Err(e) => {
                    error!(table = table.as_str(), version, error = %e, "table flush failed");
                    let _ = self.events.send(WriteEvent::Failed {
                        table: table.clone(),
                        version,
                        error: e.to_string(),
                    });
                    report.failed.push((table, e));
                }
            }
        }

        report.persisted.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }
}

impl State {
    /// Mark the write `version` of `table` as flushed (or failed), unless a
    /// newer write has been queued since
    fn settle(&mut self, table: &str, version: u64) {
        if self.unsettled.get(table) == Some(&version) {
            self.unsettled.remove(table);
        }
    }

    /// Remove the in-flight registration for `table` if it is still `id`
    fn remove_inflight(&mut self, table: &str, id: u64) {
        if self.inflight.get(table).map(|load| load.id) == Some(id) {
            self.inflight.remove(table);
        }
    }
}

/// Clears an in-flight registration when the load task ends, including
/// by panic or runtime shutdown
struct InflightGuard {
    inner: Arc<Inner>,
    table: String,
    id: u64,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inner.state.lock().remove_inflight(&self.table, self.id);
    }
}

/// Run blocking file I/O off the async workers
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
