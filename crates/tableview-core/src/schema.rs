//! Value Schemas
//!
//! A [`Schema`] turns the raw payload of a [`Message`](crate::Message) into a
//! typed value and back. The table view only ever decodes; `encode` exists so
//! producers writing into a log use the exact same wire format.
//!
//! ## Built-in Schemas
//!
//! | Schema | Value type | Wire format |
//! |---|---|---|
//! | [`BytesSchema`] | `Bytes` | payload as-is |
//! | [`StringSchema`] | `String` | UTF-8 |
//! | [`Int32Schema`] | `i32` | 4 bytes, big-endian |
//! | [`JsonSchema<T>`] | any serde type | JSON |
//!
//! ## Custom Schemas
//!
//! ```ignore
//! struct UpperCase;
//!
//! impl Schema<String> for UpperCase {
//!     fn encode(&self, value: &String) -> Result<Bytes> {
//!         Ok(Bytes::from(value.to_lowercase()))
//!     }
//!
//!     fn decode(&self, bytes: &[u8]) -> Result<String> {
//!         Ok(std::str::from_utf8(bytes)?.to_uppercase())
//!     }
//! }
//! ```

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Codec between payload bytes and values of type `T`.
///
/// Implementations must be `Send + Sync`: one schema instance is shared by
/// every partition reader of a view.
pub trait Schema<T>: Send + Sync {
    /// Serialize a value into payload bytes.
    fn encode(&self, value: &T) -> Result<Bytes>;

    /// Deserialize payload bytes into a value.
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Pass-through schema for raw payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSchema;

impl Schema<Bytes> for BytesSchema {
    fn encode(&self, value: &Bytes) -> Result<Bytes> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// UTF-8 string schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSchema;

impl Schema<String> for StringSchema {
    fn encode(&self, value: &String) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        Ok(std::str::from_utf8(bytes)?.to_string())
    }
}

/// 32-bit signed integer schema (big-endian).
#[derive(Debug, Clone, Copy, Default)]
pub struct Int32Schema;

impl Schema<i32> for Int32Schema {
    fn encode(&self, value: &i32) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<i32> {
        let raw: [u8; 4] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: 4,
            actual: bytes.len(),
        })?;
        Ok(i32::from_be_bytes(raw))
    }
}

/// JSON schema for any serde-compatible type.
pub struct JsonSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchema")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Schema<T> for JsonSchema<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
