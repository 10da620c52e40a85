//! CBOR wire codec and the versioned plaintext payload contract.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Current plaintext payload format version.
///
/// Plaintext handed to the ratchet is `PAYLOAD_VERSION || cbor(payload)`.
/// The explicit version byte makes the round-trip contract checkable across
/// implementations; unknown versions are rejected before deserialization.
pub const PAYLOAD_VERSION: u8 = 1;

/// Errors from wire encoding and decoding.
#[derive(Debug, Error)]
pub enum WireError {
    /// Serialization failed.
    #[error("encode failed: {reason}")]
    Encode {
        /// Description of the serializer failure.
        reason: String,
    },

    /// Deserialization failed.
    #[error("decode failed: {reason}")]
    Decode {
        /// Description of the deserializer failure.
        reason: String,
    },

    /// Plaintext payload carries a version this build does not understand.
    #[error("unsupported payload version {found}, expected {PAYLOAD_VERSION}")]
    UnsupportedVersion {
        /// Version byte found in the payload.
        found: u8,
    },
}

/// Encode a wire record as CBOR.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| WireError::Encode { reason: e.to_string() })?;
    Ok(bytes)
}

/// Decode a CBOR wire record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::Decode { reason: e.to_string() })
}

/// Encode an application payload under the versioned plaintext contract.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>, WireError> {
    let mut bytes = vec![PAYLOAD_VERSION];
    ciborium::ser::into_writer(payload, &mut bytes)
        .map_err(|e| WireError::Encode { reason: e.to_string() })?;
    Ok(bytes)
}

/// Decode a versioned plaintext payload.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    match bytes.split_first() {
        Some((&PAYLOAD_VERSION, rest)) => decode(rest),
        Some((&found, _)) => Err(WireError::UnsupportedVersion { found }),
        None => Err(WireError::Decode { reason: "empty payload".into() }),
    }
}
