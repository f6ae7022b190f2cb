use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while turning payloads into bytes and back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("could not serialize payload as {codec}: {reason}")]
    Encode { codec: Codec, reason: String },
    #[error("could not deserialize payload as {codec}: {reason}")]
    Decode { codec: Codec, reason: String },
}

/// Serializer applied to the plaintext before encryption.
///
/// The codec is recorded in every envelope, so a file is always decoded with
/// the codec it was written with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Self-describing JSON via `serde_json`.
    #[default]
    Json,
    /// Compact binary via `bincode`. Not self-describing: read back into the
    /// same type that was written.
    Bincode,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::Bincode => "bincode",
        }
    }

    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        let encoded = match self {
            Codec::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
            Codec::Bincode => bincode::serialize(value).map_err(|e| e.to_string()),
        };
        encoded.map_err(|reason| CodecError::Encode {
            codec: self,
            reason,
        })
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        let decoded = match self {
            Codec::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            Codec::Bincode => bincode::deserialize(bytes).map_err(|e| e.to_string()),
        };
        decoded.map_err(|reason| CodecError::Decode {
            codec: self,
            reason,
        })
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
