//! Store module: the concurrent tiered cache and everything it carries.
//!
//! - [`core`]: the [`Store`] itself — split permanent/expiring maps, core
//!   key-value operations, GC, lifecycle
//! - [`dirty`]: per-key pending-change ledger for incremental persistence
//! - [`sync`]: the sync engine deciding between incremental and full saves
//! - `typed` / `numeric` / `batch`: typed accessors, atomic counters, and
//!   multi-key operations layered on the core

mod batch;
pub(crate) mod core;
pub(crate) mod dirty;
mod numeric;
mod sync;
mod typed;

pub use self::batch::BatchItem;
pub use self::core::Store;
