//! Typed Binary Codec
//!
//! Every stored value is tagged bytes: a [`DataType`] discriminant plus an
//! encoding. Fixed-width numerics are little-endian; floats store their
//! IEEE754 bit pattern; strings and raw values are verbatim; JSON is
//! marshaled via `serde_json`; timestamps use a 12-byte portable encoding
//! (seconds `i64` + subsecond nanos `u32`, both little-endian).
//!
//! The [`Numeric`] trait is the capability the generic increment routine is
//! parameterized over: encode, decode, and overflow-checked arithmetic with
//! precise overflow/underflow/special-value semantics.

use crate::entry::DataType;
use crate::error::{CacheError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Byte width of the portable timestamp encoding.
pub const TIME_WIDTH: usize = 12;

fn check_width(data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(CacheError::InvalidDataLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

// -- boolean ----------------------------------------------------------------

pub fn encode_bool(value: bool) -> Bytes {
    Bytes::copy_from_slice(&[u8::from(value)])
}

pub fn decode_bool(data: &[u8]) -> Result<bool> {
    check_width(data, 1)?;
    Ok(data[0] == 1)
}

// -- time -------------------------------------------------------------------

pub fn encode_time(value: DateTime<Utc>) -> Bytes {
    let mut buf = [0u8; TIME_WIDTH];
    buf[..8].copy_from_slice(&value.timestamp().to_le_bytes());
    buf[8..].copy_from_slice(&value.timestamp_subsec_nanos().to_le_bytes());
    Bytes::copy_from_slice(&buf)
}

pub fn decode_time(data: &[u8]) -> Result<DateTime<Utc>> {
    check_width(data, TIME_WIDTH)?;
    let secs = i64::from_le_bytes(data[..8].try_into().unwrap());
    let nanos = u32::from_le_bytes(data[8..].try_into().unwrap());
    DateTime::from_timestamp(secs, nanos).ok_or(CacheError::InvalidTimestamp)
}

// -- json -------------------------------------------------------------------

pub fn encode_json<T: Serialize>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

pub fn decode_json<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}

// -- numerics ---------------------------------------------------------------

/// Capability bundle for the generic increment/decrement routine: a fixed
/// discriminant and width, byte conversion, and checked arithmetic.
pub trait Numeric: Copy + PartialEq + std::fmt::Debug {
    /// The discriminant stored entries of this type must carry.
    const KIND: DataType;
    /// Fixed payload width in bytes.
    const WIDTH: usize;
    /// Starting point for mutating a key that holds nothing yet.
    const ZERO: Self;

    fn encode(self) -> Bytes;
    fn decode(data: &[u8]) -> Result<Self>;

    /// `self + delta` with the type's overflow semantics.
    fn checked_incr(self, delta: Self) -> Result<Self>;
    /// `self - delta`; unsigned types report underflow distinctly.
    fn checked_decr(self, delta: Self) -> Result<Self>;
}

macro_rules! impl_signed_numeric {
    ($t:ty, $kind:expr, $width:expr) => {
        impl Numeric for $t {
            const KIND: DataType = $kind;
            const WIDTH: usize = $width;
            const ZERO: Self = 0;

            fn encode(self) -> Bytes {
                Bytes::copy_from_slice(&self.to_le_bytes())
            }

            fn decode(data: &[u8]) -> Result<Self> {
                check_width(data, Self::WIDTH)?;
                Ok(<$t>::from_le_bytes(data.try_into().unwrap()))
            }

            fn checked_incr(self, delta: Self) -> Result<Self> {
                self.checked_add(delta)
                    .ok_or(CacheError::ValueOverflow(Self::KIND))
            }

            fn checked_decr(self, delta: Self) -> Result<Self> {
                self.checked_sub(delta)
                    .ok_or(CacheError::ValueOverflow(Self::KIND))
            }
        }
    };
}

macro_rules! impl_unsigned_numeric {
    ($t:ty, $kind:expr, $width:expr) => {
        impl Numeric for $t {
            const KIND: DataType = $kind;
            const WIDTH: usize = $width;
            const ZERO: Self = 0;

            fn encode(self) -> Bytes {
                Bytes::copy_from_slice(&self.to_le_bytes())
            }

            fn decode(data: &[u8]) -> Result<Self> {
                check_width(data, Self::WIDTH)?;
                Ok(<$t>::from_le_bytes(data.try_into().unwrap()))
            }

            fn checked_incr(self, delta: Self) -> Result<Self> {
                self.checked_add(delta)
                    .ok_or(CacheError::ValueOverflow(Self::KIND))
            }

            fn checked_decr(self, delta: Self) -> Result<Self> {
                // Subtracting more than is stored is underflow, not overflow.
                if self < delta {
                    return Err(CacheError::UnsignedUnderflow);
                }
                Ok(self - delta)
            }
        }
    };
}

impl_signed_numeric!(i16, DataType::Int16, 2);
impl_signed_numeric!(i32, DataType::Int32, 4);
impl_signed_numeric!(i64, DataType::Int64, 8);
impl_unsigned_numeric!(u16, DataType::UInt16, 2);
impl_unsigned_numeric!(u32, DataType::UInt32, 4);
impl_unsigned_numeric!(u64, DataType::UInt64, 8);

macro_rules! impl_float_numeric {
    ($t:ty, $bits:ty, $kind:expr, $width:expr) => {
        impl Numeric for $t {
            const KIND: DataType = $kind;
            const WIDTH: usize = $width;
            const ZERO: Self = 0.0;

            fn encode(self) -> Bytes {
                Bytes::copy_from_slice(&self.to_bits().to_le_bytes())
            }

            fn decode(data: &[u8]) -> Result<Self> {
                check_width(data, Self::WIDTH)?;
                Ok(<$t>::from_bits(<$bits>::from_le_bytes(
                    data.try_into().unwrap(),
                )))
            }

            fn checked_incr(self, delta: Self) -> Result<Self> {
                // Range pre-check against the max representable magnitude;
                // floats saturate to infinity rather than wrapping.
                if delta > 0.0 && (self > <$t>::MAX - delta || (<$t>::MAX - self) < delta) {
                    return Err(CacheError::ValueOverflow(Self::KIND));
                }
                if delta < 0.0 && (self < -<$t>::MAX - delta || (self + <$t>::MAX) < -delta) {
                    return Err(CacheError::ValueOverflow(Self::KIND));
                }
                let next = self + delta;
                // Extreme operands can still combine to a special value at
                // the representable edge even when the pre-check passed.
                if next.is_nan() || next.is_infinite() {
                    return Err(CacheError::FloatSpecial);
                }
                Ok(next)
            }

            fn checked_decr(self, delta: Self) -> Result<Self> {
                self.checked_incr(-delta)
            }
        }
    };
}

impl_float_numeric!(f32, u32, DataType::Float32, 4);
impl_float_numeric!(f64, u64, DataType::Float64, 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_roundtrip() {
        assert!(decode_bool(&encode_bool(true)).unwrap());
        assert!(!decode_bool(&encode_bool(false)).unwrap());
        assert!(matches!(
            decode_bool(b"ab"),
            Err(CacheError::InvalidDataLength {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_time_roundtrip() {
        let t = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let encoded = encode_time(t);
        assert_eq!(encoded.len(), TIME_WIDTH);
        assert_eq!(decode_time(&encoded).unwrap(), t);
    }

    #[test]
    fn test_time_wrong_width() {
        assert!(matches!(
            decode_time(&[0u8; 8]),
            Err(CacheError::InvalidDataLength {
                expected: TIME_WIDTH,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let v = serde_json::json!({"name": "Alice", "age": 30});
        let encoded = encode_json(&v).unwrap();
        let decoded: serde_json::Value = decode_json(&encoded).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn test_json_rejects_empty_and_garbage() {
        assert!(decode_json::<serde_json::Value>(b"").is_err());
        assert!(decode_json::<serde_json::Value>(b"{not json").is_err());
    }

    #[test]
    fn test_integer_roundtrips() {
        assert_eq!(i16::decode(&(-123i16).encode()).unwrap(), -123);
        assert_eq!(i32::decode(&(-70_000i32).encode()).unwrap(), -70_000);
        assert_eq!(
            i64::decode(&(-9_000_000_000i64).encode()).unwrap(),
            -9_000_000_000
        );
        assert_eq!(u16::decode(&65_000u16.encode()).unwrap(), 65_000);
        assert_eq!(u32::decode(&4_000_000_000u32.encode()).unwrap(), 4_000_000_000);
        assert_eq!(u64::decode(&u64::MAX.encode()).unwrap(), u64::MAX);
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(&0x0102u16.encode()[..], &[0x02, 0x01]);
        assert_eq!(&0x01020304u32.encode()[..], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_float_roundtrips() {
        assert_eq!(f32::decode(&1.5f32.encode()).unwrap(), 1.5);
        assert_eq!(f64::decode(&(-2.25f64).encode()).unwrap(), -2.25);
        // Bit patterns survive, including negative zero.
        let neg_zero = f64::decode(&(-0.0f64).encode()).unwrap();
        assert!(neg_zero.is_sign_negative());
    }

    #[test]
    fn test_decode_wrong_width() {
        assert!(matches!(
            u32::decode(&[1, 2]),
            Err(CacheError::InvalidDataLength {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_signed_overflow() {
        assert!(matches!(
            i16::MAX.checked_incr(1),
            Err(CacheError::ValueOverflow(DataType::Int16))
        ));
        assert!(matches!(
            i64::MIN.checked_decr(1),
            Err(CacheError::ValueOverflow(DataType::Int64))
        ));
        assert_eq!(i32::MAX.checked_incr(0).unwrap(), i32::MAX);
    }

    #[test]
    fn test_unsigned_overflow_and_underflow() {
        assert!(matches!(
            u16::MAX.checked_incr(1),
            Err(CacheError::ValueOverflow(DataType::UInt16))
        ));
        assert!(matches!(
            500u32.checked_decr(1000),
            Err(CacheError::UnsignedUnderflow)
        ));
        assert_eq!(500u32.checked_decr(500).unwrap(), 0);
    }

    #[test]
    fn test_float_overflow_precheck() {
        assert!(matches!(
            f64::MAX.checked_incr(f64::MAX),
            Err(CacheError::ValueOverflow(DataType::Float64))
        ));
        assert!(matches!(
            (-f32::MAX).checked_decr(f32::MAX),
            Err(CacheError::ValueOverflow(DataType::Float32))
        ));
    }

    #[test]
    fn test_float_special_postcheck() {
        // Infinity plus negative infinity passes the range pre-check but
        // combines to NaN.
        assert!(matches!(
            f64::INFINITY.checked_incr(f64::NEG_INFINITY),
            Err(CacheError::FloatSpecial)
        ));
        assert!(matches!(
            1.0f64.checked_incr(f64::NAN),
            Err(CacheError::FloatSpecial)
        ));
    }
}
