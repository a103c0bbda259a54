//! Typed Accessors
//!
//! Ergonomic get/set pairs over the untyped core, one per supported
//! [`DataType`]. Setters encode through the codec and tag the entry;
//! getters verify the stored tag before decoding, so asking for the wrong
//! type reports a mismatch instead of misinterpreting bytes.

use crate::codec::{self, Numeric};
use crate::entry::DataType;
use crate::error::{CacheError, Result};
use crate::store::core::Store;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

impl Store {
    fn get_typed(&self, key: &str, expected: DataType) -> Result<Bytes> {
        let (actual, data) = self.get_nocopy(key)?;
        if actual != expected {
            return Err(CacheError::TypeMismatch {
                key: key.to_string(),
                expected,
                actual,
            });
        }
        Ok(data)
    }

    /// Stores an untagged byte payload.
    pub fn set_raw(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        self.set(key, DataType::Raw, value, ttl)
    }

    /// Returns a raw payload. The payload is an independent copy.
    pub fn get_raw(&self, key: &str) -> Result<Bytes> {
        let data = self.get_typed(key, DataType::Raw)?;
        Ok(Bytes::copy_from_slice(&data))
    }

    pub fn set_bool(&self, key: &str, value: bool, ttl: Option<Duration>) -> Result<()> {
        self.set(key, DataType::Bool, codec::encode_bool(value), ttl)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        codec::decode_bool(&self.get_typed(key, DataType::Bool)?)
    }

    pub fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.set(
            key,
            DataType::String,
            Bytes::copy_from_slice(value.as_bytes()),
            ttl,
        )
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        let data = self.get_typed(key, DataType::String)?;
        String::from_utf8(data.to_vec()).map_err(|_| CacheError::InvalidUtf8)
    }

    pub fn set_time(&self, key: &str, value: DateTime<Utc>, ttl: Option<Duration>) -> Result<()> {
        self.set(key, DataType::Time, codec::encode_time(value), ttl)
    }

    pub fn get_time(&self, key: &str) -> Result<DateTime<Utc>> {
        codec::decode_time(&self.get_typed(key, DataType::Time)?)
    }

    /// Marshals `value` as JSON and stores it tagged accordingly.
    pub fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.set(key, DataType::Json, codec::encode_json(value)?, ttl)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        codec::decode_json(&self.get_typed(key, DataType::Json)?)
    }

    /// Stores any fixed-width numeric in its little-endian encoding.
    pub fn set_numeric<N: Numeric>(&self, key: &str, value: N, ttl: Option<Duration>) -> Result<()> {
        self.set(key, N::KIND, value.encode(), ttl)
    }

    /// Reads back a fixed-width numeric, checking tag and width.
    pub fn get_numeric<N: Numeric>(&self, key: &str) -> Result<N> {
        N::decode(&self.get_typed(key, N::KIND)?)
    }

    pub fn set_i16(&self, key: &str, value: i16, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_i16(&self, key: &str) -> Result<i16> {
        self.get_numeric(key)
    }

    pub fn set_i32(&self, key: &str, value: i32, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_i32(&self, key: &str) -> Result<i32> {
        self.get_numeric(key)
    }

    pub fn set_i64(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.get_numeric(key)
    }

    pub fn set_u16(&self, key: &str, value: u16, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_u16(&self, key: &str) -> Result<u16> {
        self.get_numeric(key)
    }

    pub fn set_u32(&self, key: &str, value: u32, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_u32(&self, key: &str) -> Result<u32> {
        self.get_numeric(key)
    }

    pub fn set_u64(&self, key: &str, value: u64, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_u64(&self, key: &str) -> Result<u64> {
        self.get_numeric(key)
    }

    pub fn set_f32(&self, key: &str, value: f32, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_f32(&self, key: &str) -> Result<f32> {
        self.get_numeric(key)
    }

    pub fn set_f64(&self, key: &str, value: f64, ttl: Option<Duration>) -> Result<()> {
        self.set_numeric(key, value, ttl)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_numeric(key)
    }
}
