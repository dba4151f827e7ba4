//! JSON serialization (human-readable, debuggable)

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::error::{DatabaseError, Result};
use crate::serialization::SerializationStrategy;

/// serde_json-backed strategy
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerialization;

impl SerializationStrategy for JsonSerialization {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| DatabaseError::Serialization(format!("JSON encode failed: {}", e)))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| DatabaseError::Serialization(format!("JSON decode failed: {}", e)))
    }
}

/// Serde adapter that keeps non-finite floats intact in JSON
///
/// Finite values are written as plain numbers. NaN, +inf and -inf are
/// written as the strings `"NaN"`, `"inf"` and `"-inf"`.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Arc {
///     #[serde(with = "cxdb::serialization::float_sentinel")]
///     sweep: f64,
/// }
/// ```
pub mod float_sentinel {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        struct SentinelVisitor;

        impl<'de> Visitor<'de> for SentinelVisitor {
            type Value = f64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or one of \"NaN\", \"inf\", \"-inf\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
                Ok(v as f64)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
                Ok(v as f64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
                match v {
                    "NaN" => Ok(f64::NAN),
                    "inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(SentinelVisitor)
    }
}
