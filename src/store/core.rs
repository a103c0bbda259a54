//! Split Store & Core Operations
//!
//! The keyspace is partitioned by expiry class into two independently
//! locked maps: permanent entries and expiring entries. A key is present in
//! at most one map at a time; moving a key between classes removes it from
//! one map and inserts it into the other under both write locks. The
//! partition is what lets GC skip permanent entries entirely and keeps
//! permanent-key readers clear of TTL churn.
//!
//! ## Lock Order
//!
//! Three locks exist: permanent map, expiring map, dirty tracker. Whenever
//! more than one is held, they are acquired in that fixed order.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Store                              │
//! │  ┌───────────────┐  ┌───────────────┐  ┌────────────────┐  │
//! │  │ permanent map │  │ expiring map  │  │ dirty tracker  │  │
//! │  │   RwLock      │  │   RwLock      │  │    Mutex       │  │
//! │  └───────────────┘  └───────┬───────┘  └────────┬───────┘  │
//! └─────────────────────────────┼───────────────────┼──────────┘
//!                               │                   │
//!                     ┌─────────┴────────┐ ┌────────┴────────┐
//!                     │     GC task      │ │ sync-timer task │
//!                     └──────────────────┘ └─────────────────┘
//! ```

use crate::backend::Backend;
use crate::config::Config;
use crate::entry::{now_ms, DataType, Entry, KeyTtl};
use crate::error::{CacheError, Result};
use crate::store::dirty::DirtyTracker;
use crate::store::sync::sync_loop;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// An embeddable, concurrent cache with tiered TTL storage and optional
/// durable backing.
///
/// Designed to be held in an `Arc` and shared across tasks; all operations
/// take `&self`. Background tasks hold only weak references, so dropping
/// the last handle stops them — but only [`close`](Store::close) runs the
/// final save. Call it before letting a backed store go.
///
/// # Example
///
/// ```no_run
/// use tiercache::{Config, Store};
/// use std::time::Duration;
///
/// # #[tokio::main] async fn main() -> tiercache::Result<()> {
/// let store = Store::open(Config::default(), None)?;
/// store.set_string("greeting", "hello", None)?;
/// store.set_string("session", "abc123", Some(Duration::from_secs(60)))?;
/// assert_eq!(store.get_string("greeting")?, "hello");
/// store.close().await?;
/// # Ok(()) }
/// ```
pub struct Store {
    /// Entries that never expire.
    pub(crate) permanent: RwLock<HashMap<String, Entry>>,

    /// Entries with an absolute expiry; swept by the GC task.
    pub(crate) expiring: RwLock<HashMap<String, Entry>>,

    /// Pending-change ledger; present only with a backend and incremental
    /// sync enabled.
    pub(crate) dirty: Option<Mutex<DirtyTracker>>,

    /// Durable backing, if any.
    pub(crate) backend: Option<Arc<dyn Backend>>,

    /// In-flight background saves, drained before the final shutdown save.
    pub(crate) save_tasks: Mutex<JoinSet<()>>,

    /// GC and sync-timer task handles, joined during close.
    loop_handles: Mutex<Vec<JoinHandle<()>>>,

    /// Cooperative cancellation signal for the background loops.
    shutdown_tx: watch::Sender<bool>,

    /// One-shot close guard; per-instance lifecycle state.
    closed: AtomicBool,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("permanent", &self.permanent.read().unwrap().len())
            .field("expiring", &self.expiring.read().unwrap().len())
            .field("has_backend", &self.backend.is_some())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Store {
    /// Opens a store, loading any persisted dataset from `backend` and
    /// starting the background GC and sync-timer tasks.
    ///
    /// Must be called within a Tokio runtime when either interval in
    /// `config` is non-zero. Invalid dirty thresholds are rejected here.
    pub fn open(config: Config, backend: Option<Arc<dyn Backend>>) -> Result<Arc<Store>> {
        config.validate_thresholds()?;

        let (permanent, expiring) = match &backend {
            Some(b) => {
                let (permanent, expiring) = b.load()?;
                info!(
                    permanent = permanent.len(),
                    expiring = expiring.len(),
                    "loaded persisted dataset"
                );
                (permanent, expiring)
            }
            None => (HashMap::new(), HashMap::new()),
        };

        let dirty = if backend.is_some() && config.save_dirty {
            Some(Mutex::new(DirtyTracker::new(
                config.dirty_threshold_count,
                config.dirty_threshold_ratio,
            )))
        } else {
            None
        };

        let (shutdown_tx, _) = watch::channel(false);

        let store = Arc::new(Store {
            permanent: RwLock::new(permanent),
            expiring: RwLock::new(expiring),
            dirty,
            backend,
            save_tasks: Mutex::new(JoinSet::new()),
            loop_handles: Mutex::new(Vec::new()),
            shutdown_tx,
            closed: AtomicBool::new(false),
        });

        // The loops hold only weak handles: a store dropped without close
        // must not be kept alive by its own background tasks.
        let mut handles = Vec::new();
        if !config.gc_interval.is_zero() {
            handles.push(tokio::spawn(gc_loop(
                Arc::downgrade(&store),
                config.gc_interval,
                store.shutdown_tx.subscribe(),
            )));
        }
        if store.backend.is_some() && !config.save_interval.is_zero() {
            handles.push(tokio::spawn(sync_loop(
                Arc::downgrade(&store),
                config.save_interval,
                store.shutdown_tx.subscribe(),
            )));
        }
        *store.loop_handles.lock().unwrap() = handles;

        Ok(store)
    }

    /// Returns a copy of the type tag and payload for `key`.
    ///
    /// Missing, expired, or empty keys report errors; the returned payload
    /// is an independent allocation.
    pub fn get(&self, key: &str) -> Result<(DataType, Bytes)> {
        self.lookup(key).map(|e| (e.kind, Bytes::copy_from_slice(&e.data)))
    }

    /// Like [`get`](Store::get), but returns a handle aliasing store-owned
    /// memory instead of copying.
    ///
    /// This is a deliberate performance escape hatch: the handle reflects
    /// the payload at call time and no guarantee is made beyond the read
    /// lock's duration. Do not assume it tracks later writes.
    pub fn get_nocopy(&self, key: &str) -> Result<(DataType, Bytes)> {
        self.lookup(key).map(|e| (e.kind, e.data))
    }

    /// Both read locks are held together so a key mid-move between expiry
    /// classes is never missed.
    fn lookup(&self, key: &str) -> Result<Entry> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }
        let permanent = self.permanent.read().unwrap();
        let expiring = self.expiring.read().unwrap();

        if let Some(e) = permanent.get(key) {
            return Ok(e.clone());
        }
        match expiring.get(key) {
            Some(e) if !e.is_expired() => Ok(e.clone()),
            _ => Err(CacheError::NoDataForKey(key.to_string())),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// `ttl` of `None` (or zero) stores permanently and removes any prior
    /// expiring copy; a positive `ttl` stores with `expiry = now + ttl` and
    /// removes any prior permanent copy.
    pub fn set(&self, key: &str, kind: DataType, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }
        if value.is_empty() {
            return Err(CacheError::ValueNil);
        }
        self.apply_set(key, Entry::new(kind, value, ttl));
        Ok(())
    }

    /// Inserts an already-built entry, routing it by expiry class.
    pub(crate) fn apply_set(&self, key: &str, entry: Entry) {
        {
            let mut permanent = self.permanent.write().unwrap();
            let mut expiring = self.expiring.write().unwrap();
            if entry.is_permanent() {
                permanent.insert(key.to_string(), entry);
                expiring.remove(key);
            } else {
                expiring.insert(key.to_string(), entry);
                permanent.remove(key);
            }
        }
        self.mark_dirty_set(key);
    }

    /// Removes `key` from both maps.
    pub fn delete(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }
        {
            let mut permanent = self.permanent.write().unwrap();
            let mut expiring = self.expiring.write().unwrap();
            permanent.remove(key);
            expiring.remove(key);
        }
        self.mark_dirty_delete(key);
        Ok(())
    }

    /// Counts how many of `keys` are present and not expired.
    pub fn exists(&self, keys: &[&str]) -> usize {
        if keys.is_empty() {
            return 0;
        }
        let now = now_ms();
        let permanent = self.permanent.read().unwrap();
        let expiring = self.expiring.read().unwrap();

        keys.iter()
            .filter(|key| {
                permanent.contains_key(**key)
                    || expiring.get(**key).is_some_and(|e| !e.is_expired_at(now))
            })
            .count()
    }

    /// Returns all live keys from both maps.
    pub fn keys(&self) -> Vec<String> {
        let now = now_ms();
        let permanent = self.permanent.read().unwrap();
        let expiring = self.expiring.read().unwrap();

        let mut keys = Vec::with_capacity(permanent.len() + expiring.len());
        keys.extend(permanent.keys().cloned());
        keys.extend(
            expiring
                .iter()
                .filter(|(_, e)| !e.is_expired_at(now))
                .map(|(k, _)| k.clone()),
        );
        keys
    }

    /// Reports the remaining lifetime of `key`.
    pub fn ttl(&self, key: &str) -> KeyTtl {
        let permanent = self.permanent.read().unwrap();
        if permanent.contains_key(key) {
            return KeyTtl::NoExpiry;
        }
        drop(permanent);

        let expiring = self.expiring.read().unwrap();
        match expiring.get(key).and_then(|e| e.remaining()) {
            Some(remaining) => KeyTtl::Remaining(remaining),
            None => KeyTtl::Expired,
        }
    }

    /// Clears both maps and requests a full rewrite on the next sync: after
    /// a flush an incremental diff is meaningless, the persisted state must
    /// reflect the emptied keyspace wholesale.
    pub fn flush(&self) {
        {
            let mut permanent = self.permanent.write().unwrap();
            let mut expiring = self.expiring.write().unwrap();
            permanent.clear();
            expiring.clear();
        }
        if let Some(dirty) = &self.dirty {
            dirty.lock().unwrap().request_full_sync();
        }
    }

    /// True once [`close`](Store::close) has begun.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shuts the store down: stops the background tasks, waits for
    /// outstanding background saves, performs one final exclusive save,
    /// then releases the maps. Idempotent; later calls return `Ok`.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(true);
        let handles = std::mem::take(&mut *self.loop_handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }

        // In-flight incremental saves must land before the closing full
        // save, or the two could race on the backend.
        let mut saves = std::mem::take(&mut *self.save_tasks.lock().unwrap());
        while saves.join_next().await.is_some() {}

        let mut result = Ok(());
        if let Some(backend) = &self.backend {
            let snapshot = self.snapshot_live();
            let backend_for_save = Arc::clone(backend);
            result = match tokio::task::spawn_blocking(move || {
                backend_for_save.save(snapshot, true)
            })
            .await
            {
                Ok(r) => r,
                Err(join_err) => {
                    error!(error = %join_err, "final save task failed");
                    Ok(())
                }
            };
            if let Err(e) = backend.close() {
                error!(error = %e, "backend close failed");
            }
        }

        self.permanent.write().unwrap().clear();
        self.expiring.write().unwrap().clear();
        if let Some(dirty) = &self.dirty {
            dirty.lock().unwrap().clear();
        }

        info!("store closed");
        result
    }

    /// Deep-copies every live entry, expiry-filtered, under brief read locks.
    pub(crate) fn snapshot_live(&self) -> HashMap<String, Entry> {
        let now = now_ms();
        let permanent = self.permanent.read().unwrap();
        let expiring = self.expiring.read().unwrap();

        let mut snapshot = HashMap::with_capacity(permanent.len() + expiring.len());
        for (key, e) in permanent.iter() {
            snapshot.insert(key.clone(), e.clone());
        }
        for (key, e) in expiring.iter() {
            if !e.is_expired_at(now) {
                snapshot.insert(key.clone(), e.clone());
            }
        }
        snapshot
    }

    /// Removes expired entries from the expiring map. The permanent map is
    /// never touched, so GC never contends with permanent-key readers.
    pub(crate) fn clean_expired(&self) -> usize {
        let now = now_ms();
        let mut expiring = self.expiring.write().unwrap();
        let before = expiring.len();
        expiring.retain(|_, e| !e.is_expired_at(now));
        before - expiring.len()
    }

    pub(crate) fn mark_dirty_set(&self, key: &str) {
        if let Some(dirty) = &self.dirty {
            dirty.lock().unwrap().mark_set(key);
        }
    }

    pub(crate) fn mark_dirty_delete(&self, key: &str) {
        if let Some(dirty) = &self.dirty {
            dirty.lock().unwrap().mark_delete(key);
        }
    }
}

/// Periodic sweep of the expiring map.
async fn gc_loop(store: Weak<Store>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let Some(store) = store.upgrade() else { return };
                let removed = store.clean_expired();
                if removed > 0 {
                    debug!(removed, "swept expired keys");
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("gc task received shutdown signal");
                    return;
                }
            }
        }
    }
}
