//! Typed, Expirable Entries
//!
//! An [`Entry`] is an owned value: a type discriminant, a payload buffer,
//! and an absolute expiry in milliseconds since the Unix epoch (`0` means
//! the entry never expires). Entries whose expiry has passed are logically
//! dead but may remain physically present until the GC sweep or a lazy
//! check removes them.
//!
//! Payloads are `bytes::Bytes`. `Bytes` is immutable, so handle clones are
//! observational snapshots: later writes replace the buffer rather than
//! mutating it in place. [`Entry::deep_clone`] still exists for the paths
//! where the caller must receive an independent allocation.

use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// Type discriminant stored alongside every payload.
///
/// The `u8` values are part of the disk format; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Unknown = 0,
    Raw = 1,
    Bool = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    UInt16 = 6,
    UInt32 = 7,
    UInt64 = 8,
    Float32 = 9,
    Float64 = 10,
    String = 11,
    Time = 12,
    Json = 13,
}

impl DataType {
    /// Decodes a discriminant loaded from the backend.
    pub fn from_u8(v: u8) -> DataType {
        match v {
            1 => DataType::Raw,
            2 => DataType::Bool,
            3 => DataType::Int16,
            4 => DataType::Int32,
            5 => DataType::Int64,
            6 => DataType::UInt16,
            7 => DataType::UInt32,
            8 => DataType::UInt64,
            9 => DataType::Float32,
            10 => DataType::Float64,
            11 => DataType::String,
            12 => DataType::Time,
            13 => DataType::Json,
            _ => DataType::Unknown,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Unknown => "unknown",
            DataType::Raw => "raw",
            DataType::Bool => "bool",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::String => "string",
            DataType::Time => "time",
            DataType::Json => "json",
        };
        f.write_str(name)
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A stored value: type tag, payload bytes, absolute expiry (0 = permanent).
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Type discriminant for the payload encoding.
    pub kind: DataType,
    /// The encoded payload. Never empty for a live entry.
    pub data: Bytes,
    /// Absolute expiry in ms since epoch; `0` means never.
    pub expiry: i64,
}

impl Entry {
    /// Creates an entry from a TTL. `None` (or a zero duration) produces a
    /// permanent entry.
    pub fn new(kind: DataType, data: Bytes, ttl: Option<Duration>) -> Self {
        let expiry = match ttl {
            Some(d) if !d.is_zero() => now_ms() + d.as_millis() as i64,
            _ => 0,
        };
        Self { kind, data, expiry }
    }

    /// Creates an entry with an already-computed absolute expiry.
    pub fn with_expiry(kind: DataType, data: Bytes, expiry: i64) -> Self {
        Self { kind, data, expiry }
    }

    /// Creates a permanent entry.
    pub fn permanent(kind: DataType, data: Bytes) -> Self {
        Self::with_expiry(kind, data, 0)
    }

    /// True if this entry never expires.
    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.expiry == 0
    }

    /// Checks expiry against the current wall clock.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    /// Checks expiry against a caller-supplied clock reading, so bulk scans
    /// read the clock once.
    #[inline]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expiry > 0 && self.expiry <= now_ms
    }

    /// Copies this entry into an independent payload allocation.
    pub fn deep_clone(&self) -> Entry {
        Entry {
            kind: self.kind,
            data: Bytes::copy_from_slice(&self.data),
            expiry: self.expiry,
        }
    }

    /// Remaining lifetime, or `None` for permanent/expired entries.
    pub fn remaining(&self) -> Option<Duration> {
        if self.expiry == 0 {
            return None;
        }
        let left = self.expiry - now_ms();
        if left <= 0 {
            None
        } else {
            Some(Duration::from_millis(left as u64))
        }
    }
}

/// Result of a TTL query.
///
/// Both a missing key and a permanent key would otherwise report ambiguous
/// zero/negative durations, so the two out-of-domain cases get their own
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key exists and does not expire.
    NoExpiry,
    /// Key does not exist or is expired.
    Expired,
    /// Key exists; this much lifetime remains.
    Remaining(Duration),
}

impl KeyTtl {
    /// Remaining duration, if the key is live and expiring.
    pub fn remaining(self) -> Option<Duration> {
        match self {
            KeyTtl::Remaining(d) => Some(d),
            _ => None,
        }
    }
}
