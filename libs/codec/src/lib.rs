//! Node-Wide Serialization
//!
//! Every node picks one [`Codec`] at bootstrap; it serializes both user
//! payloads and the wire envelopes (`ActorMessage`, `Response`) that cross
//! the message bus. Three codecs are provided: JSON for debuggability,
//! MessagePack and bincode for compact binary traffic.
//!
//! Conventions:
//! - marshalling `None` produces empty bytes ([`Codec::marshal_opt`])
//! - unmarshalling empty bytes yields the type's default value
//! - raw-byte payloads bypass the codec entirely (router-level passthrough)

use hive_types::{HiveError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Serialization codec shared by a whole node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    #[serde(rename = "messagepack")]
    MessagePack,
    Bincode,
}

impl Codec {
    /// Codec name as used in configuration files and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MessagePack => "messagepack",
            Codec::Bincode => "bincode",
        }
    }

    /// Parse a codec name from configuration
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Codec::Json),
            "messagepack" | "msgpack" => Some(Codec::MessagePack),
            "bincode" => Some(Codec::Bincode),
            _ => None,
        }
    }

    /// Serialize a value
    pub fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Json => serde_json::to_vec(value).map_err(|e| HiveError::Marshal {
                codec: self.name(),
                message: e.to_string(),
            }),
            Codec::MessagePack => rmp_serde::to_vec_named(value).map_err(|e| HiveError::Marshal {
                codec: self.name(),
                message: e.to_string(),
            }),
            Codec::Bincode => bincode::serialize(value).map_err(|e| HiveError::Marshal {
                codec: self.name(),
                message: e.to_string(),
            }),
        }
    }

    /// Serialize an optional value; `None` maps to empty bytes
    pub fn marshal_opt<T: Serialize>(&self, value: Option<&T>) -> Result<Vec<u8>> {
        match value {
            Some(v) => self.marshal(v),
            None => Ok(Vec::new()),
        }
    }

    /// Deserialize a value; empty input yields `T::default()`
    pub fn unmarshal<T: DeserializeOwned + Default>(&self, data: &[u8]) -> Result<T> {
        if data.is_empty() {
            return Ok(T::default());
        }
        match self {
            Codec::Json => serde_json::from_slice(data).map_err(|e| HiveError::Unmarshal {
                codec: self.name(),
                message: e.to_string(),
            }),
            Codec::MessagePack => rmp_serde::from_slice(data).map_err(|e| HiveError::Unmarshal {
                codec: self.name(),
                message: e.to_string(),
            }),
            Codec::Bincode => bincode::deserialize(data).map_err(|e| HiveError::Unmarshal {
                codec: self.name(),
                message: e.to_string(),
            }),
        }
    }
}

pub const ALL_CODECS: [Codec; 3] = [Codec::Json, Codec::MessagePack, Codec::Bincode];
