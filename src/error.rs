//! Error Taxonomy
//!
//! Every public operation returns an explicit `Result`; expected failures
//! never panic. Validation and type/arithmetic errors are returned
//! synchronously from the operation that detected them, while background
//! sync failures are logged and swallowed (sync is best-effort).

use crate::entry::DataType;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

/// All failure modes surfaced by the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Keys must be non-empty strings.
    #[error("key cannot be empty")]
    KeyEmpty,

    /// A live entry's payload is never absent; zero-length payloads are
    /// rejected at the door.
    #[error("value cannot be empty")]
    ValueNil,

    /// The key is missing, or present but already expired.
    #[error("no data found for key: {0}")]
    NoDataForKey(String),

    /// The stored discriminant does not match the requested type.
    #[error("type mismatch for key '{key}': expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: DataType,
        actual: DataType,
    },

    /// A fixed-width payload had the wrong byte length.
    #[error("invalid data length: expected {expected} bytes, got {actual} bytes")]
    InvalidDataLength { expected: usize, actual: usize },

    /// Unsigned decrement where `current < delta`.
    #[error("unsigned integer underflow: current value is less than delta")]
    UnsignedUnderflow,

    /// Increment/decrement would leave the type's representable range.
    #[error("{0} overflow: result exceeds representable range")]
    ValueOverflow(DataType),

    /// Float mutation produced NaN or infinity at the representable edge.
    #[error("invalid float result: NaN or infinity")]
    FloatSpecial,

    /// The store has been closed; transactions fail fast.
    #[error("store is closed")]
    StoreClosed,

    /// A snapshot transaction may only be committed once.
    #[error("transaction already committed")]
    AlreadyCommitted,

    /// Best-effort saves refuse to queue behind an in-flight save.
    #[error("save operation already in progress")]
    SaveAlreadyInProgress,

    /// Dirty thresholds are rejected at construction, not clamped.
    #[error("invalid dirty threshold: {0}")]
    InvalidDirtyThreshold(String),

    /// Reserved for [`Backend`](crate::Backend) implementations whose
    /// underlying handle can be absent when an operation arrives.
    #[error("backend not initialized")]
    BackendNotInitialized,

    /// A stored timestamp decoded to a value outside chrono's range.
    #[error("timestamp out of range")]
    InvalidTimestamp,

    /// A string-tagged payload held invalid UTF-8.
    #[error("stored string is not valid utf-8")]
    InvalidUtf8,

    /// JSON marshal/unmarshal failure in the typed codec.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend file IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend snapshot encode/decode failure.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl CacheError {
    /// True for the missing-or-expired case, which several operations
    /// treat as "absent" rather than as a hard failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, CacheError::NoDataForKey(_))
    }
}
