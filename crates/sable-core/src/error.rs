//! Session error types.

use sable_crypto::CryptoError;
use sable_proto::WireError;
use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed header, payload, or options.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// AEAD authentication failure: wrong key, tampered ciphertext, or
    /// mismatched associated data.
    #[error("decryption failed")]
    DecryptionFailure,

    /// The skip bound was exceeded; rejected before any chain advancement.
    #[error("too many skipped messages: requested {requested}, allowed {allowed}")]
    TooManySkippedMessages {
        /// Message index the sender asked us to skip to.
        requested: u32,
        /// Highest index the configured bound permits.
        allowed: u32,
    },

    /// Wire encoding or decoding failed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// A key derivation failed. Indicates misuse or an internal bug, never a
    /// hostile peer.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl SessionError {
    /// Returns true if this error is fatal to the session.
    ///
    /// `DecryptionFailure` and `TooManySkippedMessages` are terminal for the
    /// specific message only (drop it or request retransmission); the state
    /// machine is guaranteed untouched and the caller may keep using the
    /// session. Everything else indicates misuse or corruption.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidInput { .. } | Self::Wire(_) | Self::Crypto(_) => true,
            Self::DecryptionFailure | Self::TooManySkippedMessages { .. } => false,
        }
    }
}
