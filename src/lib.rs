//! # TierCache - An Embeddable Concurrent Cache with Tiered Persistence
//!
//! TierCache is an in-process key-value cache for Rust applications. Keys
//! are typed, optionally expiring, and optionally persisted through a
//! pluggable backend with incremental dirty-key syncing.
//!
//! ## Features
//!
//! - **Tiered Storage**: Permanent and expiring entries live in separate
//!   maps, so TTL churn never contends with stable configuration keys
//! - **Typed Values**: Thirteen tagged value types with a compact binary
//!   codec and overflow-checked numeric mutators
//! - **Incremental Persistence**: A dirty-key ledger keeps background
//!   saves proportional to what changed, escalating to a full rewrite
//!   only past configurable thresholds
//! - **Transactions**: Lock-mode for strict currency, snapshot-mode for
//!   concurrent multi-key work with atomic commit
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Store                                 │
//! │                                                                  │
//! │  ┌───────────────┐  ┌───────────────┐  ┌─────────────────────┐   │
//! │  │ permanent map │  │ expiring map  │  │   dirty tracker     │   │
//! │  │   (RwLock)    │  │   (RwLock)    │  │     (Mutex)         │   │
//! │  └───────┬───────┘  └───────┬───────┘  └──────────┬──────────┘   │
//! │          │                  │                     │              │
//! │  ────────┴──────────────────┴─────────────────────┴───────────   │
//! │   typed accessors · counters · batches · transactions            │
//! │                                                                  │
//! │  ┌──────────────┐   ┌───────────────┐   ┌────────────────────┐   │
//! │  │   GC task    │   │  sync timer   │   │  blocking saves    │   │
//! │  │  (expiring   │   │ (incremental  │──>│  Backend::save /   │   │
//! │  │   sweep)     │   │  or full)     │   │  save_dirty        │   │
//! │  └──────────────┘   └───────────────┘   └────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use tiercache::{Config, FileBackend, Store};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> tiercache::Result<()> {
//!     let backend = Arc::new(FileBackend::new("cache.bin"));
//!     let store = Store::open(Config::default(), Some(backend))?;
//!
//!     // Permanent and expiring keys
//!     store.set_string("motd", "hello", None)?;
//!     store.set_json("session:42", &serde_json::json!({"user": "alice"}),
//!         Some(Duration::from_secs(1800)))?;
//!
//!     // Overflow-checked counters
//!     let hits = store.incr("hits", 1u64, None)?;
//!     println!("hits = {hits}");
//!
//!     // Final save happens here
//!     store.close().await
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: the [`Store`] — tiered maps, typed accessors, counters,
//!   batches, GC, and the persistence sync engine
//! - [`tx`]: lock-mode and snapshot-mode transactions
//! - [`codec`]: the typed binary codec and the [`Numeric`] trait
//! - [`backend`]: the [`Backend`] persistence contract and [`FileBackend`]
//!
//! ## Design Highlights
//!
//! ### Two Maps, One Lock Order
//!
//! Splitting the keyspace by expiry class means the GC sweep takes only
//! the expiring map's lock, and readers of permanent keys never wait on
//! it. All multi-lock paths acquire permanent map, then expiring map,
//! then dirty tracker.
//!
//! ### Saves Proportional to Change
//!
//! Every mutation records a per-key dirty mark. The periodic sync pushes
//! just those keys, and rewrites the whole dataset only when the ledger
//! exceeds both a count and a keyspace-ratio threshold, or after a flush.
//! Backend I/O runs on blocking worker tasks, never under the maps' locks.
//!
//! ### Lazy + Active Expiry
//!
//! Expired keys are invisible the moment their deadline passes (every
//! read checks) and are physically reclaimed by the background sweep.

pub mod backend;
pub mod codec;
pub mod store;
pub mod tx;

mod config;
mod entry;
mod error;

// Re-export the types that make up the everyday API.
pub use backend::{Backend, FileBackend};
pub use codec::Numeric;
pub use config::Config;
pub use entry::{DataType, Entry, KeyTtl};
pub use error::{CacheError, Result};
pub use store::{BatchItem, Store};
pub use tx::{ReadTx, TxMode, WriteTx};

/// Version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
