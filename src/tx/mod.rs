//! Transactions
//!
//! Multi-operation access to the store comes in two modes with different
//! concurrency trade-offs:
//!
//! - [`TxMode::Lock`] holds the store's locks for the whole transaction.
//!   Reads are strictly current and writes are immediately visible, but
//!   everything else blocks until the transaction ends.
//! - [`TxMode::Snapshot`] copies a point-in-time view up front and buffers
//!   writes, publishing them in one atomic commit. Other operations run
//!   concurrently; the view does not see their effects.
//!
//! Transactions are closure-scoped: the closure's `Ok` commits (where
//! there is anything to commit) and its `Err` discards buffered writes.
//! Lock-mode writes apply as they are made and are not rolled back by an
//! `Err`.

mod lock;
mod snapshot;

use crate::entry::{DataType, KeyTtl};
use crate::error::{CacheError, Result};
use crate::store::core::Store;
use bytes::Bytes;
use std::time::Duration;

use self::lock::{LockReadTx, LockWriteTx};
use self::snapshot::{SnapshotReadTx, SnapshotWriteTx};

/// Concurrency mode for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Hold the store's locks; current reads, blocking everyone else.
    Lock,
    /// Copy a view and buffer writes; concurrent, committed atomically.
    Snapshot,
}

/// Read operations available inside a transaction.
pub trait ReadTx {
    /// Returns a copy of the type tag and payload for `key`.
    fn get(&self, key: &str) -> Result<(DataType, Bytes)>;

    /// Like [`get`](ReadTx::get) without copying the payload.
    fn get_nocopy(&self, key: &str) -> Result<(DataType, Bytes)>;

    /// Counts how many of `keys` are present and not expired.
    fn exists(&self, keys: &[&str]) -> usize;

    /// Reports the remaining lifetime of `key`.
    fn ttl(&self, key: &str) -> KeyTtl;
}

/// Write operations available inside a write transaction.
pub trait WriteTx: ReadTx {
    /// Stores `value` under `key`; `None` TTL stores permanently.
    fn set(&mut self, key: &str, kind: DataType, value: Bytes, ttl: Option<Duration>)
        -> Result<()>;

    /// Removes `key`.
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Finalizes the transaction early. Commits buffered writes in
    /// snapshot mode; marks the transaction finished in lock mode. A
    /// second commit reports
    /// [`AlreadyCommitted`](crate::CacheError::AlreadyCommitted).
    fn commit(&mut self) -> Result<()>;
}

impl Store {
    /// Runs `f` inside a read transaction in the given mode.
    pub fn read_tx<T>(
        &self,
        mode: TxMode,
        f: impl FnOnce(&dyn ReadTx) -> Result<T>,
    ) -> Result<T> {
        if self.is_closed() {
            return Err(CacheError::StoreClosed);
        }
        match mode {
            TxMode::Lock => f(&LockReadTx::begin(self)),
            TxMode::Snapshot => f(&SnapshotReadTx::begin(self)),
        }
    }

    /// Runs `f` inside a write transaction in the given mode.
    ///
    /// If `f` returns `Ok` and has not already committed, the transaction
    /// is committed. On `Err`, snapshot-mode writes are discarded;
    /// lock-mode writes have already been applied.
    pub fn write_tx<T>(
        &self,
        mode: TxMode,
        f: impl FnOnce(&mut dyn WriteTx) -> Result<T>,
    ) -> Result<T> {
        if self.is_closed() {
            return Err(CacheError::StoreClosed);
        }
        match mode {
            TxMode::Lock => {
                let mut tx = LockWriteTx::begin(self);
                let out = f(&mut tx)?;
                if !tx.is_committed() {
                    tx.commit()?;
                }
                Ok(out)
            }
            TxMode::Snapshot => {
                let mut tx = SnapshotWriteTx::begin(self);
                let out = f(&mut tx)?;
                if !tx.is_committed() {
                    tx.commit()?;
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn open_plain() -> Arc<Store> {
        let config = Config {
            gc_interval: Duration::ZERO,
            save_interval: Duration::ZERO,
            ..Config::default()
        };
        Store::open(config, None).unwrap()
    }

    fn set_raw(store: &Store, key: &str, value: &'static [u8]) {
        store
            .set(key, DataType::Raw, Bytes::from_static(value), None)
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_tx_both_modes() {
        let store = open_plain();
        set_raw(&store, "k", b"v");

        for mode in [TxMode::Lock, TxMode::Snapshot] {
            let (kind, data) = store.read_tx(mode, |tx| tx.get("k")).unwrap();
            assert_eq!(kind, DataType::Raw);
            assert_eq!(&data[..], b"v");
        }
    }

    #[tokio::test]
    async fn test_write_tx_commits_on_ok() {
        let store = open_plain();

        for (mode, key) in [(TxMode::Lock, "a"), (TxMode::Snapshot, "b")] {
            store
                .write_tx(mode, |tx| {
                    tx.set(key, DataType::Raw, Bytes::from_static(b"v"), None)
                })
                .unwrap();
            assert_eq!(&store.get(key).unwrap().1[..], b"v");
        }
    }

    #[tokio::test]
    async fn test_snapshot_write_tx_discards_on_err() {
        let store = open_plain();

        let result: Result<()> = store.write_tx(TxMode::Snapshot, |tx| {
            tx.set("k", DataType::Raw, Bytes::from_static(b"v"), None)?;
            Err(CacheError::ValueNil)
        });
        assert!(result.is_err());
        assert!(store.get("k").unwrap_err().is_no_data());
    }

    #[tokio::test]
    async fn test_lock_write_tx_err_keeps_applied_writes() {
        let store = open_plain();

        let result: Result<()> = store.write_tx(TxMode::Lock, |tx| {
            tx.set("k", DataType::Raw, Bytes::from_static(b"v"), None)?;
            Err(CacheError::ValueNil)
        });
        assert!(result.is_err());
        // Lock mode applies in place; the error does not undo the write.
        assert_eq!(&store.get("k").unwrap().1[..], b"v");
    }

    #[tokio::test]
    async fn test_double_commit_rejected() {
        let store = open_plain();

        for mode in [TxMode::Lock, TxMode::Snapshot] {
            let result: Result<()> = store.write_tx(mode, |tx| {
                tx.set("k", DataType::Raw, Bytes::from_static(b"v"), None)?;
                tx.commit()?;
                tx.commit()
            });
            assert!(matches!(result, Err(CacheError::AlreadyCommitted)));
        }
    }

    #[tokio::test]
    async fn test_explicit_commit_then_ok_is_fine() {
        let store = open_plain();

        store
            .write_tx(TxMode::Snapshot, |tx| {
                tx.set("k", DataType::Raw, Bytes::from_static(b"v"), None)?;
                tx.commit()
            })
            .unwrap();
        assert_eq!(&store.get("k").unwrap().1[..], b"v");
    }

    #[tokio::test]
    async fn test_tx_on_closed_store() {
        let store = open_plain();
        store.close().await.unwrap();

        let read: Result<()> = store.read_tx(TxMode::Lock, |_| Ok(()));
        assert!(matches!(read, Err(CacheError::StoreClosed)));
        let write: Result<()> = store.write_tx(TxMode::Snapshot, |_| Ok(()));
        assert!(matches!(write, Err(CacheError::StoreClosed)));
    }
}
