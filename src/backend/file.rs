//! Snapshot File Backend
//!
//! Persists the whole keyspace as one bincode-encoded map, written to a
//! temporary file and atomically renamed over the target so readers never
//! observe a torn snapshot. An internal mutex provides the exclusive /
//! best-effort save semantics: exclusive saves block behind in-flight
//! work, periodic saves bail out with `SaveAlreadyInProgress` instead.

use crate::backend::Backend;
use crate::entry::{now_ms, DataType, Entry};
use crate::error::{CacheError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-disk representation of an entry.
#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    kind: u8,
    data: Vec<u8>,
    expiry: i64,
}

impl From<&Entry> for DiskEntry {
    fn from(e: &Entry) -> Self {
        DiskEntry {
            kind: e.kind as u8,
            data: e.data.to_vec(),
            expiry: e.expiry,
        }
    }
}

impl From<DiskEntry> for Entry {
    fn from(d: DiskEntry) -> Self {
        Entry {
            kind: DataType::from_u8(d.kind),
            data: Bytes::from(d.data),
            expiry: d.expiry,
        }
    }
}

/// File-based [`Backend`] storing the dataset as a single snapshot file.
pub struct FileBackend {
    path: PathBuf,
    save_lock: Mutex<()>,
}

impl FileBackend {
    /// Creates a backend persisting to `path`. The file is created on the
    /// first save; a missing file loads as an empty dataset.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            save_lock: Mutex::new(()),
        }
    }

    fn read_disk_map(&self) -> Result<HashMap<String, DiskEntry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read(&self.path)?;
        Ok(bincode::deserialize(&raw)?)
    }

    fn write_disk_map(&self, map: &HashMap<String, DiskEntry>) -> Result<()> {
        let encoded = bincode::serialize(map)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Backend for FileBackend {
    fn load(&self) -> Result<(HashMap<String, Entry>, HashMap<String, Entry>)> {
        let now = now_ms();
        let mut permanent = HashMap::new();
        let mut expiring = HashMap::new();

        for (key, disk) in self.read_disk_map()? {
            let entry: Entry = disk.into();
            if entry.is_permanent() {
                permanent.insert(key, entry);
            } else if !entry.is_expired_at(now) {
                expiring.insert(key, entry);
            }
            // Rows already expired at load time are dropped.
        }

        Ok((permanent, expiring))
    }

    fn save(&self, entries: HashMap<String, Entry>, exclusive: bool) -> Result<()> {
        let _guard = if exclusive {
            self.save_lock.lock().unwrap()
        } else {
            match self.save_lock.try_lock() {
                Ok(g) => g,
                Err(_) => return Err(CacheError::SaveAlreadyInProgress),
            }
        };

        let now = now_ms();
        let disk: HashMap<String, DiskEntry> = entries
            .iter()
            .filter(|(_, e)| !e.is_expired_at(now))
            .map(|(k, e)| (k.clone(), DiskEntry::from(e)))
            .collect();

        self.write_disk_map(&disk)
    }

    fn save_dirty(&self, set: HashMap<String, Entry>, delete: Vec<String>) -> Result<()> {
        if set.is_empty() && delete.is_empty() {
            return Ok(());
        }

        let _guard = match self.save_lock.try_lock() {
            Ok(g) => g,
            Err(_) => return Err(CacheError::SaveAlreadyInProgress),
        };

        let mut disk = self.read_disk_map()?;
        let now = now_ms();

        for (key, entry) in &set {
            if entry.is_expired_at(now) {
                continue;
            }
            disk.insert(key.clone(), DiskEntry::from(entry));
        }
        for key in &delete {
            disk.remove(key);
        }

        self.write_disk_map(&disk)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
