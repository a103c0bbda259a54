//! Durable Backend Contract
//!
//! The store persists through this small load/save interface. Any embedded
//! or remote store can back the cache by implementing it; the crate ships
//! [`FileBackend`], an atomic-rename snapshot file.
//!
//! Implementations are called from blocking worker tasks, never while the
//! store's in-memory locks are held.

pub mod file;

use crate::entry::Entry;
use crate::error::Result;
use std::collections::HashMap;

pub use self::file::FileBackend;

/// Durable storage satisfying the cache's load/save contract.
pub trait Backend: Send + Sync + 'static {
    /// Loads the persisted dataset, split by expiry class. Rows already
    /// expired at load time are excluded from the expiring set.
    fn load(&self) -> Result<(HashMap<String, Entry>, HashMap<String, Entry>)>;

    /// Replaces the persisted dataset with `entries`.
    ///
    /// With `exclusive` set the call blocks until any in-flight save
    /// finishes (used at shutdown); otherwise it returns
    /// [`SaveAlreadyInProgress`](crate::CacheError::SaveAlreadyInProgress)
    /// instead of queuing — periodic saves are best-effort.
    fn save(&self, entries: HashMap<String, Entry>, exclusive: bool) -> Result<()>;

    /// Upserts `set` and removes `delete`. A no-op when both are empty.
    fn save_dirty(&self, set: HashMap<String, Entry>, delete: Vec<String>) -> Result<()>;

    /// Releases backend resources.
    fn close(&self) -> Result<()>;
}
