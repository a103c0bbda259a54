//! Batch Operations
//!
//! Multi-key reads and writes executed in one pass under the store's
//! locks, so a batch observes (and produces) a single consistent state
//! rather than interleaving with other writers key by key.
//!
//! Results are per item, index-aligned with the input: one bad item does
//! not poison its neighbors.

use crate::entry::{now_ms, DataType, Entry};
use crate::error::{CacheError, Result};
use crate::store::core::Store;
use bytes::Bytes;
use std::time::Duration;

/// One write in a [`set_many`](Store::set_many) batch, with its own TTL.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub key: String,
    pub kind: DataType,
    pub value: Bytes,
    pub ttl: Option<Duration>,
}

impl BatchItem {
    pub fn new(
        key: impl Into<String>,
        kind: DataType,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            value,
            ttl,
        }
    }
}

impl Store {
    /// Fetches several keys under one lock acquisition. Results align with
    /// `keys` by index; payloads are independent copies.
    pub fn get_many(&self, keys: &[&str]) -> Vec<Result<(DataType, Bytes)>> {
        if keys.is_empty() {
            return Vec::new();
        }
        let now = now_ms();
        let permanent = self.permanent.read().unwrap();
        let expiring = self.expiring.read().unwrap();

        keys.iter()
            .map(|key| {
                if key.is_empty() {
                    return Err(CacheError::KeyEmpty);
                }
                permanent
                    .get(*key)
                    .or_else(|| expiring.get(*key).filter(|e| !e.is_expired_at(now)))
                    .map(|e| (e.kind, Bytes::copy_from_slice(&e.data)))
                    .ok_or_else(|| CacheError::NoDataForKey(key.to_string()))
            })
            .collect()
    }

    /// Stores several values under one lock acquisition, each with its own
    /// TTL. Invalid items report their error at their index and are
    /// skipped; the rest of the batch still applies.
    pub fn set_many(&self, items: Vec<BatchItem>) -> Vec<Result<()>> {
        if items.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::with_capacity(items.len());
        let mut applied = Vec::new();
        {
            let mut permanent = self.permanent.write().unwrap();
            let mut expiring = self.expiring.write().unwrap();

            for item in items {
                if item.key.is_empty() {
                    results.push(Err(CacheError::KeyEmpty));
                    continue;
                }
                if item.value.is_empty() {
                    results.push(Err(CacheError::ValueNil));
                    continue;
                }
                let entry = Entry::new(item.kind, item.value, item.ttl);
                if entry.is_permanent() {
                    permanent.insert(item.key.clone(), entry);
                    expiring.remove(&item.key);
                } else {
                    expiring.insert(item.key.clone(), entry);
                    permanent.remove(&item.key);
                }
                applied.push(item.key);
                results.push(Ok(()));
            }
        }

        for key in &applied {
            self.mark_dirty_set(key);
        }
        results
    }

    /// Removes several keys under one lock acquisition. Results align with
    /// `keys` by index.
    pub fn delete_many(&self, keys: &[&str]) -> Vec<Result<()>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::with_capacity(keys.len());
        {
            let mut permanent = self.permanent.write().unwrap();
            let mut expiring = self.expiring.write().unwrap();
            for key in keys {
                if key.is_empty() {
                    results.push(Err(CacheError::KeyEmpty));
                    continue;
                }
                permanent.remove(*key);
                expiring.remove(*key);
                results.push(Ok(()));
            }
        }

        for (key, result) in keys.iter().zip(&results) {
            if result.is_ok() {
                self.mark_dirty_delete(key);
            }
        }
        results
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

    fn item(key: &str, value: &'static [u8]) -> BatchItem {
        BatchItem::new(key, DataType::Raw, Bytes::from_static(value), None)
    }

    #[tokio::test]
    async fn test_set_many_and_get_many() {
        let store = open_plain();
        let results = store.set_many(vec![item("a", b"1"), item("b", b"2")]);
        assert!(results.iter().all(Result::is_ok));

        let fetched = store.get_many(&["a", "missing", "b"]);
        assert_eq!(&fetched[0].as_ref().unwrap().1[..], b"1");
        assert!(fetched[1].as_ref().unwrap_err().is_no_data());
        assert_eq!(&fetched[2].as_ref().unwrap().1[..], b"2");
    }

    #[tokio::test]
    async fn test_set_many_skips_bad_items_only() {
        let store = open_plain();
        let results = store.set_many(vec![
            item("good", b"1"),
            BatchItem::new("bad", DataType::Raw, Bytes::new(), None),
            BatchItem::new("", DataType::Raw, Bytes::from_static(b"x"), None),
            item("also-good", b"2"),
        ]);

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CacheError::ValueNil)));
        assert!(matches!(results[2], Err(CacheError::KeyEmpty)));
        assert!(results[3].is_ok());

        // The valid neighbors landed despite the failures.
        assert_eq!(&store.get("good").unwrap().1[..], b"1");
        assert_eq!(&store.get("also-good").unwrap().1[..], b"2");
    }

    #[tokio::test]
    async fn test_set_many_per_item_ttl() {
        let store = open_plain();
        store.set_many(vec![
            item("perm", b"1"),
            BatchItem::new(
                "temp",
                DataType::Raw,
                Bytes::from_static(b"2"),
                Some(Duration::from_secs(60)),
            ),
        ]);
        assert_eq!(store.permanent.read().unwrap().len(), 1);
        assert_eq!(store.expiring.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = open_plain();
        store.set_many(vec![item("a", b"1"), item("b", b"2"), item("c", b"3")]);
        let results = store.delete_many(&["a", "", "c", "never-there"]);

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CacheError::KeyEmpty)));
        assert!(results[2].is_ok());
        // Deleting an absent key is not an error.
        assert!(results[3].is_ok());

        assert_eq!(store.keys(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_batches_are_noops() {
        let store = open_plain();
        assert!(store.set_many(Vec::new()).is_empty());
        assert!(store.delete_many(&[]).is_empty());
        assert!(store.get_many(&[]).is_empty());
    }
}
