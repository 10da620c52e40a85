//! Per-message ratchet header.

use serde::{Deserialize, Serialize};

/// Canonical header encoding length: 32-byte DH key + two big-endian u32s.
pub const HEADER_WIRE_SIZE: usize = 40;

/// Cleartext metadata carried with every ratchet message.
///
/// The header travels unencrypted but is bound into the AEAD associated
/// data, so any tampering fails authentication. The receiver uses it to
/// locate or derive the correct message key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Sender's current DH ratchet public key.
    pub dh: [u8; 32],
    /// Length of the sender's previous sending chain.
    pub pn: u32,
    /// Index within the current sending chain.
    pub n: u32,
}

impl MessageHeader {
    /// Canonical byte encoding: `dh || pn_be || n_be`.
    ///
    /// Both sides hash this encoding into key derivations, so it must be
    /// byte-stable across implementations. Fixed-width fields, no framing.
    pub fn to_bytes(&self) -> [u8; HEADER_WIRE_SIZE] {
        let mut out = [0u8; HEADER_WIRE_SIZE];
        out[..32].copy_from_slice(&self.dh);
        out[32..36].copy_from_slice(&self.pn.to_be_bytes());
        out[36..].copy_from_slice(&self.n.to_be_bytes());
        out
    }
}
