//! Handshake, ratchet, and envelope wire records.

use serde::{Deserialize, Serialize};

use crate::header::MessageHeader;

/// A published one-time key offer.
///
/// Published once and consumed at most once by a handshake initiator. The
/// issuer holds the matching secret until consumed, then discards it; the
/// one-time key is never reused across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrekeyCard {
    /// Owner's long-term identity public key.
    pub owner: [u8; 32],
    /// The one-time public key.
    pub one_time: [u8; 32],
}

/// Handshake bundle from the initiator, attached to the first message.
///
/// Carries everything the responder needs to mirror the triple-DH and open
/// the session. Transmitted until the initiator observes a successful peer
/// receive, then dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitBundle {
    /// Initiator's identity public key.
    pub from: [u8; 32],
    /// Initiator's handshake ephemeral public key.
    pub epk: [u8; 32],
    /// The consumed one-time public key, identifying which offer was used.
    pub opk: [u8; 32],
}

/// An encrypted ratchet message.
///
/// The handshake bundle's presence is a compile-time-checked variant, not an
/// optional field probed at runtime: the first message(s) of a session are
/// `Initial`, steady-state traffic is `Steady`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatchetMessage {
    /// Session-opening message carrying the handshake bundle.
    Initial {
        /// Handshake bundle for the responder.
        init: InitBundle,
        /// Ratchet header.
        header: MessageHeader,
        /// AEAD ciphertext (`nonce || ct+tag`).
        ciphertext: Vec<u8>,
    },
    /// Steady-state message.
    Steady {
        /// Ratchet header.
        header: MessageHeader,
        /// AEAD ciphertext (`nonce || ct+tag`).
        ciphertext: Vec<u8>,
    },
}

impl RatchetMessage {
    /// The ratchet header, regardless of variant.
    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Initial { header, .. } | Self::Steady { header, .. } => header,
        }
    }

    /// The ciphertext, regardless of variant.
    pub fn ciphertext(&self) -> &[u8] {
        match self {
            Self::Initial { ciphertext, .. } | Self::Steady { ciphertext, .. } => ciphertext,
        }
    }

    /// The handshake bundle, if this is a session-opening message.
    pub fn init(&self) -> Option<&InitBundle> {
        match self {
            Self::Initial { init, .. } => Some(init),
            Self::Steady { .. } => None,
        }
    }
}

/// A sealed-sender envelope. Immutable once sealed.
///
/// A passive observer sees only the recipient, an ephemeral key, and two
/// opaque ciphertexts; the sender's identity sits inside `seal` and is
/// recoverable only with the recipient's secret key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Recipient's identity public key (routing; cannot be avoided).
    pub recipient: [u8; 32],
    /// Sealing ephemeral public key.
    pub ek: [u8; 32],
    /// Sealed sender identity (AEAD ciphertext).
    pub seal: Vec<u8>,
    /// Message ciphertext.
    pub ciphertext: Vec<u8>,
}
