//! Sable Wire Payloads
//!
//! Language-agnostic structured records exchanged by the session layer:
//! ratchet message headers, handshake init bundles, prekey cards, sealed
//! envelopes, and the versioned plaintext payload codec.
//!
//! All records are serde types encoded as CBOR. Nothing here touches key
//! material; ciphertexts and public keys are opaque bytes at this layer.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
mod header;
mod payloads;

pub use codec::{PAYLOAD_VERSION, WireError, decode, decode_payload, encode, encode_payload};
pub use header::{HEADER_WIRE_SIZE, MessageHeader};
pub use payloads::{Envelope, InitBundle, PrekeyCard, RatchetMessage};
