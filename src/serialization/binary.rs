//! Binary serialization (efficient, compact)
//!
//! Uses the bincode 2 serde API with the standard configuration. Floats are
//! stored bit-for-bit, so NaN payloads and infinities survive unchanged.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::error::{DatabaseError, Result};
use crate::serialization::SerializationStrategy;

/// bincode-backed strategy
#[derive(Debug, Default, Clone, Copy)]
pub struct BinarySerialization;

impl SerializationStrategy for BinarySerialization {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let config = bincode::config::standard();
        bincode::serde::encode_to_vec(value, config)
            .map_err(|e| DatabaseError::Serialization(format!("Binary encode failed: {}", e)))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let config = bincode::config::standard();
        let (value, read) = bincode::serde::decode_from_slice(bytes, config)
            .map_err(|e| DatabaseError::Serialization(format!("Binary decode failed: {}", e)))?;
        if read != bytes.len() {
            return Err(DatabaseError::Serialization(format!(
                "Binary decode left {} unread bytes",
                bytes.len() - read
            )));
        }
        Ok(value)
    }
}
