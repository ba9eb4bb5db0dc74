//! Minimal CBOR decoding surface (C1).
//!
//! Authenticators only ever produce a small, well-known profile of CBOR:
//! unsigned/negative integers, byte strings, text strings, arrays and maps
//! (keyed by integers or strings), plus the occasional `simple` value.
//! Decoding is delegated entirely to `serde_cbor_2`, which already accepts
//! indefinite-length encodings and does not require canonical ordering on
//! input; this module only adds the small accessor helpers the rest of the
//! crate needs to walk a decoded [`Value`] without repeating match arms.

use crate::error::{WebauthnError, WebauthnResult};
pub use serde_cbor_2::Value;

/// Decode a single CBOR value from a byte slice. Trailing bytes are an
/// error for top-level decodes (the caller is expected to know exactly how
/// many bytes the value occupies); use [`decode_prefix`] when more data may
/// follow (e.g. CBOR-encoded extensions after a COSE key).
pub fn decode(bytes: &[u8]) -> WebauthnResult<Value> {
    serde_cbor_2::from_slice(bytes).map_err(|_| WebauthnError::InvalidCbor)
}

/// Decode a single CBOR value from the start of `bytes`, returning the
/// value and the number of bytes it consumed.
pub fn decode_prefix(bytes: &[u8]) -> WebauthnResult<(Value, usize)> {
    let mut deserializer = serde_cbor_2::Deserializer::from_slice(bytes);
    let value = serde_cbor_2::Value::deserialize(&mut deserializer)
        .map_err(|_| WebauthnError::InvalidCbor)?;
    Ok((value, deserializer.byte_offset()))
}

/// Extract a `&BTreeMap` from a CBOR value or fail with `invalid_cbor`.
macro_rules! cbor_try_map {
    ($v:expr) => {
        match $v {
            $crate::cbor::Value::Map(m) => Ok(m),
            _ => Err($crate::error::WebauthnError::InvalidCbor),
        }
    };
}

/// Extract a byte string from a CBOR value or fail with `invalid_cbor`.
macro_rules! cbor_try_bytes {
    ($v:expr) => {
        match $v {
            $crate::cbor::Value::Bytes(b) => Ok(b),
            _ => Err($crate::error::WebauthnError::InvalidCbor),
        }
    };
}

/// Extract a text string from a CBOR value or fail with `invalid_cbor`.
macro_rules! cbor_try_string {
    ($v:expr) => {
        match $v {
            $crate::cbor::Value::Text(s) => Ok(s),
            _ => Err($crate::error::WebauthnError::InvalidCbor),
        }
    };
}

/// Extract an integer (positive or negative) from a CBOR value as `i128`.
macro_rules! cbor_try_i128 {
    ($v:expr) => {
        match $v {
            $crate::cbor::Value::Integer(i) => Ok(*i),
            _ => Err($crate::error::WebauthnError::InvalidCbor),
        }
    };
}

pub(crate) use cbor_try_bytes;
pub(crate) use cbor_try_i128;
pub(crate) use cbor_try_map;
pub(crate) use cbor_try_string;

use serde::Deserialize;
