//! # tablestore
//!
//! A file-backed JSON table store with:
//! - One pretty-printed JSON file per table, replaced atomically
//! - A bounded in-memory cache of hot tables with LRU eviction
//! - Read-your-own-write consistency without waiting on disk
//! - Debounced, coalesced write batching
//! - Deduplicated concurrent disk loads
//! - Best-effort secondary indexes for range queries
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             Callers (Collection / query layer)               │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ get                          │ put
//! ┌──────────────▼──────────────┐  ┌────────────▼───────────────┐
//! │          Read Path          │  │        Write Queue         │
//! │ cache → in-flight → disk    │  │ cache update + coalesce    │
//! └──────────────┬──────────────┘  └────────────┬───────────────┘
//!                │                              │ debounce timer
//!          ┌─────▼──────┐                ┌──────▼──────┐
//!          │ TableCache │                │   Flusher   │
//!          │   (LRU)    │                │  (batched)  │
//!          └────────────┘                └──────┬──────┘
//!                                               │
//!                                       ┌───────▼───────┐
//!                                       │   FileStore   │
//!                                       │ (tmp+rename)  │
//!                                       └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::json;
//! use tablestore::{Config, Engine};
//!
//! # async fn demo() -> tablestore::Result<()> {
//! let engine = Engine::connect(Config::builder().data_dir("./data").build()).await?;
//!
//! engine.put("products", vec![json!({"id": 1, "price": 10})]).await?;
//! assert_eq!(engine.get("products").await?.len(), 1);
//!
//! engine.close().await?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod snapshot;
pub mod storage;
pub mod cache;
pub mod write_queue;
pub mod engine;

pub mod schema;
pub mod collection;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::Config;
pub use engine::{Engine, EngineStats, IndexInfo};
pub use snapshot::{Record, Snapshot};
pub use write_queue::{FlushReport, WriteEvent};
pub use schema::TableSchema;
pub use collection::Collection;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tablestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
