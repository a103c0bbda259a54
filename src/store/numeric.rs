//! Atomic Numeric Mutators
//!
//! Read-modify-write counters over the typed numeric encodings. The whole
//! mutation runs under both map write locks, so concurrent increments
//! never lose updates. Arithmetic is overflow-checked before anything is
//! written: a failed mutation leaves the stored value untouched.
//!
//! An increment on a missing (or expired) key initializes it from zero;
//! a decrement on a missing key fails, since there is nothing to subtract
//! from. A `None` TTL keeps the key's existing expiry rather than
//! resetting it, so counters under a session key do not accidentally
//! become immortal on every bump.

use crate::codec::Numeric;
use crate::entry::{now_ms, Entry};
use crate::error::{CacheError, Result};
use crate::store::core::Store;
use std::time::Duration;

impl Store {
    /// Atomically adds `delta` to the numeric value under `key` and
    /// returns the new value.
    ///
    /// A missing key starts from zero. `ttl` of `None` (or zero) keeps the
    /// key's current expiry; a positive `ttl` resets it.
    pub fn incr<N: Numeric>(&self, key: &str, delta: N, ttl: Option<Duration>) -> Result<N> {
        self.apply_numeric(key, delta, ttl, false)
    }

    /// Atomically subtracts `delta` from the numeric value under `key` and
    /// returns the new value. A missing key is an error; TTL semantics
    /// match [`incr`](Store::incr).
    pub fn decr<N: Numeric>(&self, key: &str, delta: N, ttl: Option<Duration>) -> Result<N> {
        self.apply_numeric(key, delta, ttl, true)
    }

    // Concrete-named aliases of incr/decr, one pair per numeric type.

    pub fn incr_i16(&self, key: &str, delta: i16, ttl: Option<Duration>) -> Result<i16> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_i16(&self, key: &str, delta: i16, ttl: Option<Duration>) -> Result<i16> {
        self.decr(key, delta, ttl)
    }

    pub fn incr_i32(&self, key: &str, delta: i32, ttl: Option<Duration>) -> Result<i32> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_i32(&self, key: &str, delta: i32, ttl: Option<Duration>) -> Result<i32> {
        self.decr(key, delta, ttl)
    }

    pub fn incr_i64(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_i64(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64> {
        self.decr(key, delta, ttl)
    }

    pub fn incr_u16(&self, key: &str, delta: u16, ttl: Option<Duration>) -> Result<u16> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_u16(&self, key: &str, delta: u16, ttl: Option<Duration>) -> Result<u16> {
        self.decr(key, delta, ttl)
    }

    pub fn incr_u32(&self, key: &str, delta: u32, ttl: Option<Duration>) -> Result<u32> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_u32(&self, key: &str, delta: u32, ttl: Option<Duration>) -> Result<u32> {
        self.decr(key, delta, ttl)
    }

    pub fn incr_u64(&self, key: &str, delta: u64, ttl: Option<Duration>) -> Result<u64> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_u64(&self, key: &str, delta: u64, ttl: Option<Duration>) -> Result<u64> {
        self.decr(key, delta, ttl)
    }

    pub fn incr_f32(&self, key: &str, delta: f32, ttl: Option<Duration>) -> Result<f32> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_f32(&self, key: &str, delta: f32, ttl: Option<Duration>) -> Result<f32> {
        self.decr(key, delta, ttl)
    }

    pub fn incr_f64(&self, key: &str, delta: f64, ttl: Option<Duration>) -> Result<f64> {
        self.incr(key, delta, ttl)
    }

    pub fn decr_f64(&self, key: &str, delta: f64, ttl: Option<Duration>) -> Result<f64> {
        self.decr(key, delta, ttl)
    }

    fn apply_numeric<N: Numeric>(
        &self,
        key: &str,
        delta: N,
        ttl: Option<Duration>,
        decr: bool,
    ) -> Result<N> {
        if key.is_empty() {
            return Err(CacheError::KeyEmpty);
        }

        let mut permanent = self.permanent.write().unwrap();
        let mut expiring = self.expiring.write().unwrap();

        let existing = permanent
            .get(key)
            .or_else(|| expiring.get(key).filter(|e| !e.is_expired()));
        let (current, old_expiry) = match existing {
            Some(e) => {
                if e.kind != N::KIND {
                    return Err(CacheError::TypeMismatch {
                        key: key.to_string(),
                        expected: N::KIND,
                        actual: e.kind,
                    });
                }
                (N::decode(&e.data)?, e.expiry)
            }
            // Increment initializes an absent key from zero; decrement has
            // nothing to subtract from.
            None if decr => return Err(CacheError::NoDataForKey(key.to_string())),
            None => (N::ZERO, 0),
        };

        let next = if decr {
            current.checked_decr(delta)?
        } else {
            current.checked_incr(delta)?
        };

        let expiry = match ttl {
            Some(d) if !d.is_zero() => now_ms() + d.as_millis() as i64,
            _ => old_expiry,
        };
        let entry = Entry::with_expiry(N::KIND, next.encode(), expiry);
        if entry.is_permanent() {
            permanent.insert(key.to_string(), entry);
            expiring.remove(key);
        } else {
            expiring.insert(key.to_string(), entry);
            permanent.remove(key);
        }
        drop(expiring);
        drop(permanent);

        self.mark_dirty_set(key);
        Ok(next)
    }
}
