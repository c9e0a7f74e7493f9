//! Encoding of values stored in the distributed (L2) tier.
//!
//! L1 keeps typed values in-process; only L2 sees bytes. Both formats write
//! struct fields by name in declaration order, so a payload written by one
//! process version can be read by another as long as field names are stable.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{CacheError, CacheResult};

/// Wire format for L2 payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// UTF-8 JSON (serde_json)
    #[default]
    Json,
    /// MessagePack with named fields (rmp-serde)
    #[serde(rename = "msgpack", alias = "messagepack")]
    MessagePack,
}

impl SerializationFormat {
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> CacheResult<Vec<u8>> {
        match self {
            SerializationFormat::Json => {
                serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
            }
            SerializationFormat::MessagePack => rmp_serde::to_vec_named(value)
                .map_err(|e| CacheError::Serialization(e.to_string())),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> CacheResult<T> {
        match self {
            SerializationFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| CacheError::Deserialization(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(bytes)
                .map_err(|e| CacheError::Deserialization(e.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            SerializationFormat::MessagePack => "msgpack",
        }
    }
}
