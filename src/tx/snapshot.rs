//! Snapshot-Mode Transactions
//!
//! Begin by copying a point-in-time view of the live keyspace, then run
//! without holding any store lock. Writes are buffered per key as a final
//! pending action and published in a single atomic commit; a Set buffered
//! after a Delete replaces the tombstone, so commit applies each key's
//! final state exactly once.
//!
//! The view is fixed at begin: concurrent store writes are invisible to
//! the transaction, and expiry alone can change what its reads return.

use crate::entry::{now_ms, DataType, Entry, KeyTtl};
use crate::error::{CacheError, Result};
use crate::store::core::Store;
use crate::tx::{ReadTx, WriteTx};
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

/// Final buffered action for a key.
enum PendingWrite {
    Set(Entry),
    Delete,
}

fn view_lookup(view: &HashMap<String, Entry>, key: &str) -> Result<Entry> {
    if key.is_empty() {
        return Err(CacheError::KeyEmpty);
    }
    match view.get(key) {
        Some(e) if !e.is_expired() => Ok(e.clone()),
        _ => Err(CacheError::NoDataForKey(key.to_string())),
    }
}

fn view_ttl(view: &HashMap<String, Entry>, key: &str) -> KeyTtl {
    match view.get(key) {
        Some(e) if e.is_permanent() => KeyTtl::NoExpiry,
        Some(e) => match e.remaining() {
            Some(remaining) => KeyTtl::Remaining(remaining),
            None => KeyTtl::Expired,
        },
        None => KeyTtl::Expired,
    }
}

/// Read transaction over a detached copy of the keyspace.
pub(crate) struct SnapshotReadTx {
    view: HashMap<String, Entry>,
}

impl SnapshotReadTx {
    pub(crate) fn begin(store: &Store) -> Self {
        Self {
            view: store.snapshot_live(),
        }
    }
}

impl ReadTx for SnapshotReadTx {
    fn get(&self, key: &str) -> Result<(DataType, Bytes)> {
        view_lookup(&self.view, key).map(|e| (e.kind, Bytes::copy_from_slice(&e.data)))
    }

    fn get_nocopy(&self, key: &str) -> Result<(DataType, Bytes)> {
        view_lookup(&self.view, key).map(|e| (e.kind, e.data))
    }

    fn exists(&self, keys: &[&str]) -> usize {
        let now = now_ms();
        keys.iter()
            .filter(|key| self.view.get(**key).is_some_and(|e| !e.is_expired_at(now)))
            .count()
    }

    fn ttl(&self, key: &str) -> KeyTtl {
        view_ttl(&self.view, key)
    }
}

/// Write transaction buffering changes against a detached view.
pub(crate) struct SnapshotWriteTx<'a> {
    store: &'a Store,
    view: HashMap<String, Entry>,
    pending: HashMap<String, PendingWrite>,
    committed: bool,
}

impl<'a> SnapshotWriteTx<'a> {
    pub(crate) fn begin(store: &'a Store) -> Self {
        Self {
            store,
            view: store.snapshot_live(),
            pending: HashMap::new(),
            committed: false,
        }
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.committed
    }

    /// Reads see the transaction's own buffered writes over the view.
    fn lookup(&self, key: &str) -> Result<Entry> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }
        match self.pending.get(key) {
            Some(PendingWrite::Set(e)) if !e.is_expired() => Ok(e.clone()),
            Some(_) => Err(CacheError::NoDataForKey(key.to_string())),
            None => view_lookup(&self.view, key),
        }
    }
}

impl ReadTx for SnapshotWriteTx<'_> {
    fn get(&self, key: &str) -> Result<(DataType, Bytes)> {
        self.lookup(key)
            .map(|e| (e.kind, Bytes::copy_from_slice(&e.data)))
    }

    fn get_nocopy(&self, key: &str) -> Result<(DataType, Bytes)> {
        self.lookup(key).map(|e| (e.kind, e.data))
    }

    fn exists(&self, keys: &[&str]) -> usize {
        let now = now_ms();
        keys.iter()
            .filter(|key| match self.pending.get(**key) {
                Some(PendingWrite::Set(e)) => !e.is_expired_at(now),
                Some(PendingWrite::Delete) => false,
                None => self.view.get(**key).is_some_and(|e| !e.is_expired_at(now)),
            })
            .count()
    }

    fn ttl(&self, key: &str) -> KeyTtl {
        match self.pending.get(key) {
            Some(PendingWrite::Set(e)) if e.is_permanent() => KeyTtl::NoExpiry,
            Some(PendingWrite::Set(e)) => match e.remaining() {
                Some(remaining) => KeyTtl::Remaining(remaining),
                None => KeyTtl::Expired,
            },
            Some(PendingWrite::Delete) => KeyTtl::Expired,
            None => view_ttl(&self.view, key),
        }
    }
}

impl WriteTx for SnapshotWriteTx<'_> {
    fn set(
        &mut self,
        key: &str,
        kind: DataType,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }
        if value.is_empty() {
            return Err(CacheError::ValueNil);
        }
        self.pending
            .insert(key.to_string(), PendingWrite::Set(Entry::new(kind, value, ttl)));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }
        self.pending.insert(key.to_string(), PendingWrite::Delete);
        Ok(())
    }

    /// Publishes all buffered writes under the store's locks, routing each
    /// entry by expiry class and recording dirty marks from the final
    /// buffered state.
    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(CacheError::AlreadyCommitted);
        }
        self.committed = true;

        let mut permanent = self.store.permanent.write().unwrap();
        let mut expiring = self.store.expiring.write().unwrap();
        let mut dirty = self.store.dirty.as_ref().map(|d| d.lock().unwrap());

        for (key, write) in self.pending.drain() {
            match write {
                PendingWrite::Set(entry) => {
                    if entry.is_permanent() {
                        expiring.remove(&key);
                        permanent.insert(key.clone(), entry);
                    } else {
                        permanent.remove(&key);
                        expiring.insert(key.clone(), entry);
                    }
                    if let Some(dirty) = &mut dirty {
                        dirty.mark_set(&key);
                    }
                }
                PendingWrite::Delete => {
                    permanent.remove(&key);
                    expiring.remove(&key);
                    if let Some(dirty) = &mut dirty {
                        dirty.mark_delete(&key);
                    }
                }
            }
        }
        Ok(())
    }
}
