//! Value serialization for counterexamples
//!
//! A counterexample is turned into bytes here before it is compressed, and
//! read back after decompression. Serialization never sees compressed bytes.
//!
//! - **json**: human-readable, the default (`serde_json`)
//! - **binary**: compact and bit-exact (`bincode`)
//!
//! JSON cannot represent NaN or infinities. Fields that may hold them should
//! use the [`float_sentinel`] adapter, which writes them as strings.

pub mod binary;
pub mod json;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::common::error::{DatabaseError, Result};

pub use binary::BinarySerialization;
pub use json::{float_sentinel, JsonSerialization};

/// Converts typed values to bytes and back
pub trait SerializationStrategy {
    /// Stable identifier of this encoding
    fn name(&self) -> &'static str;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// The serialization strategy a database is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    Json,
    Binary,
}

impl SerializationStrategy for SerializationFormat {
    fn name(&self) -> &'static str {
        match self {
            SerializationFormat::Json => JsonSerialization.name(),
            SerializationFormat::Binary => BinarySerialization.name(),
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializationFormat::Json => JsonSerialization.encode(value),
            SerializationFormat::Binary => BinarySerialization.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            SerializationFormat::Json => JsonSerialization.decode(bytes),
            SerializationFormat::Binary => BinarySerialization.decode(bytes),
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SerializationFormat {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SerializationFormat::Json),
            "binary" | "bincode" => Ok(SerializationFormat::Binary),
            other => Err(DatabaseError::Config(format!(
                "Unknown serialization format: {}",
                other
            ))),
        }
    }
}
