//! Lock-Mode Transactions
//!
//! Hold the store's own locks for the transaction's lifetime. Reads always
//! see the latest state and writes land directly in the maps, at the cost
//! of stalling every other store operation until the guards drop.
//!
//! Guards are acquired in the store's fixed order: permanent map, expiring
//! map, dirty tracker.

use crate::entry::{now_ms, DataType, Entry, KeyTtl};
use crate::error::{CacheError, Result};
use crate::store::core::Store;
use crate::store::dirty::DirtyTracker;
use crate::tx::{ReadTx, WriteTx};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{MutexGuard, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

fn lookup(
    permanent: &HashMap<String, Entry>,
    expiring: &HashMap<String, Entry>,
    key: &str,
) -> Result<Entry> {
    if key.is_empty() {
        return Err(CacheError::KeyEmpty);
    }
    if let Some(e) = permanent.get(key) {
        return Ok(e.clone());
    }
    match expiring.get(key) {
        Some(e) if !e.is_expired() => Ok(e.clone()),
        _ => Err(CacheError::NoDataForKey(key.to_string())),
    }
}

fn count_live(
    permanent: &HashMap<String, Entry>,
    expiring: &HashMap<String, Entry>,
    keys: &[&str],
) -> usize {
    let now = now_ms();
    keys.iter()
        .filter(|key| {
            permanent.contains_key(**key)
                || expiring.get(**key).is_some_and(|e| !e.is_expired_at(now))
        })
        .count()
}

fn key_ttl(
    permanent: &HashMap<String, Entry>,
    expiring: &HashMap<String, Entry>,
    key: &str,
) -> KeyTtl {
    if permanent.contains_key(key) {
        return KeyTtl::NoExpiry;
    }
    match expiring.get(key).and_then(|e| e.remaining()) {
        Some(remaining) => KeyTtl::Remaining(remaining),
        None => KeyTtl::Expired,
    }
}

/// Read transaction holding both map read locks.
pub(crate) struct LockReadTx<'a> {
    permanent: RwLockReadGuard<'a, HashMap<String, Entry>>,
    expiring: RwLockReadGuard<'a, HashMap<String, Entry>>,
}

impl<'a> LockReadTx<'a> {
    pub(crate) fn begin(store: &'a Store) -> Self {
        Self {
            permanent: store.permanent.read().unwrap(),
            expiring: store.expiring.read().unwrap(),
        }
    }
}

impl ReadTx for LockReadTx<'_> {
    fn get(&self, key: &str) -> Result<(DataType, Bytes)> {
        lookup(&self.permanent, &self.expiring, key)
            .map(|e| (e.kind, Bytes::copy_from_slice(&e.data)))
    }

    fn get_nocopy(&self, key: &str) -> Result<(DataType, Bytes)> {
        lookup(&self.permanent, &self.expiring, key).map(|e| (e.kind, e.data))
    }

    fn exists(&self, keys: &[&str]) -> usize {
        count_live(&self.permanent, &self.expiring, keys)
    }

    fn ttl(&self, key: &str) -> KeyTtl {
        key_ttl(&self.permanent, &self.expiring, key)
    }
}

/// Write transaction holding both map write locks and the dirty tracker.
///
/// Mutations apply to the maps immediately; commit only marks the
/// transaction finished.
pub(crate) struct LockWriteTx<'a> {
    permanent: RwLockWriteGuard<'a, HashMap<String, Entry>>,
    expiring: RwLockWriteGuard<'a, HashMap<String, Entry>>,
    dirty: Option<MutexGuard<'a, DirtyTracker>>,
    committed: bool,
}

impl<'a> LockWriteTx<'a> {
    pub(crate) fn begin(store: &'a Store) -> Self {
        Self {
            permanent: store.permanent.write().unwrap(),
            expiring: store.expiring.write().unwrap(),
            dirty: store.dirty.as_ref().map(|d| d.lock().unwrap()),
            committed: false,
        }
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.committed
    }
}

impl ReadTx for LockWriteTx<'_> {
    fn get(&self, key: &str) -> Result<(DataType, Bytes)> {
        lookup(&self.permanent, &self.expiring, key)
            .map(|e| (e.kind, Bytes::copy_from_slice(&e.data)))
    }

    fn get_nocopy(&self, key: &str) -> Result<(DataType, Bytes)> {
        lookup(&self.permanent, &self.expiring, key).map(|e| (e.kind, e.data))
    }

    fn exists(&self, keys: &[&str]) -> usize {
        count_live(&self.permanent, &self.expiring, keys)
    }

    fn ttl(&self, key: &str) -> KeyTtl {
        key_ttl(&self.permanent, &self.expiring, key)
    }
}

impl WriteTx for LockWriteTx<'_> {
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
        let entry = Entry::new(kind, value, ttl);
        if entry.is_permanent() {
            self.permanent.insert(key.to_string(), entry);
            self.expiring.remove(key);
        } else {
            self.expiring.insert(key.to_string(), entry);
            self.permanent.remove(key);
        }
        if let Some(dirty) = &mut self.dirty {
            dirty.mark_set(key);
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }
        self.permanent.remove(key);
        self.expiring.remove(key);
        if let Some(dirty) = &mut self.dirty {
            dirty.mark_delete(key);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(CacheError::AlreadyCommitted);
        }
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tx::TxMode;
    use std::sync::Arc;

    fn open_plain() -> Arc<Store> {
        let config = Config {
            gc_interval: Duration::ZERO,
            save_interval: Duration::ZERO,
            ..Config::default()
        };
        Store::open(config, None).unwrap()
    }

    #[tokio::test]
    async fn test_writes_visible_within_tx() {
        let store = open_plain();
        store
            .write_tx(TxMode::Lock, |tx| {
                tx.set("k", DataType::Raw, Bytes::from_static(b"v"), None)?;
                let (_, data) = tx.get("k")?;
                assert_eq!(&data[..], b"v");
                tx.delete("k")?;
                assert!(tx.get("k").unwrap_err().is_no_data());
                Ok(())
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_ttl_class_move_within_tx() {
        let store = open_plain();
        store
            .set("k", DataType::Raw, Bytes::from_static(b"v"), None)
            .unwrap();

        store
            .write_tx(TxMode::Lock, |tx| {
                assert_eq!(tx.ttl("k"), KeyTtl::NoExpiry);
                tx.set(
                    "k",
                    DataType::Raw,
                    Bytes::from_static(b"v"),
                    Some(Duration::from_secs(60)),
                )?;
                assert!(matches!(tx.ttl("k"), KeyTtl::Remaining(_)));
                Ok(())
            })
            .unwrap();

        assert_eq!(store.permanent.read().unwrap().len(), 0);
        assert_eq!(store.expiring.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exists_and_validation() {
        let store = open_plain();
        store
            .write_tx(TxMode::Lock, |tx| {
                tx.set("a", DataType::Raw, Bytes::from_static(b"1"), None)?;
                assert_eq!(tx.exists(&["a", "b"]), 1);
                assert!(matches!(
                    tx.set("", DataType::Raw, Bytes::from_static(b"1"), None),
                    Err(CacheError::KeyEmpty)
                ));
                assert!(matches!(
                    tx.set("a", DataType::Raw, Bytes::new(), None),
                    Err(CacheError::ValueNil)
                ));
                assert!(matches!(tx.get(""), Err(CacheError::KeyEmpty)));
                Ok(())
            })
            .unwrap();
    }
}
