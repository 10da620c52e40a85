//! The symmetric suite: HKDF, the chain HMAC, and the AEAD.
//!
//! The session core specifies exact call sequences into these functions; the
//! algorithms themselves come from the RustCrypto crates. Every derivation
//! carries a domain-separating info string supplied by the caller.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// XChaCha20-Poly1305 nonce length. Sealed outputs are `nonce || ct+tag`.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag length.
const TAG_SIZE: usize = 16;

/// Errors from the primitive suite.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD authentication failed: wrong key, tampered ciphertext, or
    /// mismatched associated data. No partial plaintext is ever released.
    #[error("aead authentication failed")]
    Aead,

    /// A key derivation was asked for an unsupported output length.
    #[error("kdf rejected requested output length")]
    Kdf,

    /// Input bytes are too short to contain the expected structure.
    #[error("input truncated: need at least {need} bytes, got {got}")]
    Truncated {
        /// Minimum length required.
        need: usize,
        /// Length actually provided.
        got: usize,
    },
}

/// HKDF-SHA256: extract `secret` with `salt`, expand under `info` into `out`.
///
/// The output length is the buffer length; the session core requests 32 or
/// 64 bytes (256/512 bits).
pub fn kdf(secret: &[u8], salt: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
    Hkdf::<Sha256>::new(Some(salt), secret).expand(info, out).map_err(|_| CryptoError::Kdf)
}

/// HMAC-SHA256 over a single distinguishing byte.
///
/// The symmetric ratchet derives the message key and the next chain key from
/// the same chain key by MACing two different label bytes.
pub fn chain_mac(key: &[u8; 32], label: u8) -> Result<[u8; 32], CryptoError> {
    // Fully qualified: `KeyInit` is also in scope and provides a
    // `new_from_slice` for `Hmac`.
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| CryptoError::Kdf)?;
    mac.update(&[label]);
    Ok(mac.finalize().into_bytes().into())
}

/// AEAD-encrypt `plaintext` under `key`, binding `aad`.
///
/// The nonce is caller-provided randomness. Every key in the session core is
/// single-use, so nonce reuse under one key is impossible by construction;
/// the random nonce guards against key-handling mistakes upstream.
pub fn aead_seal(
    key: &[u8; 32],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let sealed = cipher
        .encrypt(XNonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::Aead)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// AEAD-decrypt a `nonce || ct+tag` buffer, verifying `aad`.
pub fn aead_open(key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Truncated { need: NONCE_SIZE + TAG_SIZE, got: sealed.len() });
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Aead)
}
