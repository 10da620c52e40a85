//! Password-based symmetric envelope for local data at rest.
//!
//! Independent of the ratchet core: PBKDF2-HMAC-SHA256 stretches a password
//! into an AES-256-GCM key plus an HMAC key, and the sealed record is a
//! dotted base64url string `iterations.salt.iv.ciphertext.signature`. The
//! HMAC signature covers the first four segments and is verified before any
//! AES-GCM work, so a wrong password or a tampered record fails closed with
//! [`VaultError::Verification`].

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

/// PBKDF2 rounds used when the caller does not override them.
pub const DEFAULT_ITERATIONS: u32 = 500_000;

/// Salt length in bytes.
pub const SALT_SIZE: usize = 32;

/// AES-GCM nonce length in bytes.
pub const IV_SIZE: usize = 12;

/// Errors from the password vault.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    /// Malformed sealed record or unusable options.
    #[error("invalid vault input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// The HMAC signature did not verify: wrong password or tampered record.
    #[error("password or signature does not match")]
    Verification,

    /// AES-GCM rejected the ciphertext after the signature verified.
    #[error("vault decryption failed")]
    Decryption,
}

/// Tunables for sealing.
#[derive(Debug, Clone)]
pub struct VaultOptions {
    /// PBKDF2 round count.
    pub iterations: u32,
    /// Detached HMAC key. When absent, the lower half of the PBKDF2 output
    /// signs the record.
    pub hmac_key: Option<Vec<u8>>,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self { iterations: DEFAULT_ITERATIONS, hmac_key: None }
    }
}

/// Derived key block: lower half authenticates, upper half encrypts.
struct DerivedKeys {
    bits: [u8; 64],
}

impl DerivedKeys {
    fn derive(password: &[u8], salt: &[u8], iterations: u32) -> Self {
        let mut bits = [0u8; 64];
        pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut bits);
        Self { bits }
    }

    fn hmac_half(&self) -> &[u8] {
        &self.bits[..32]
    }

    fn aes_half(&self) -> &[u8] {
        &self.bits[32..]
    }
}

impl Drop for DerivedKeys {
    fn drop(&mut self) {
        self.bits.zeroize();
    }
}

// `<_ as Mac>` disambiguates from the `KeyInit::new_from_slice` that the
// aes-gcm imports also bring into scope for `Hmac`.
fn sign(key: &[u8], data: &[u8]) -> Result<Vec<u8>, VaultError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| VaultError::InvalidInput { reason: "unusable hmac key".into() })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify(key: &[u8], data: &[u8], signature: &[u8]) -> Result<(), VaultError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| VaultError::InvalidInput { reason: "unusable hmac key".into() })?;
    mac.update(data);
    mac.verify_slice(signature).map_err(|_| VaultError::Verification)
}

/// Seal `plaintext` under `password`.
///
/// `salt` and `iv` are caller-provided randomness, per the pure-function
/// contract of this crate.
pub fn vault_seal(
    password: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_SIZE],
    iv: &[u8; IV_SIZE],
    options: &VaultOptions,
) -> Result<String, VaultError> {
    if password.is_empty() {
        return Err(VaultError::InvalidInput { reason: "empty password".into() });
    }
    if options.iterations == 0 {
        return Err(VaultError::InvalidInput { reason: "zero pbkdf2 iterations".into() });
    }

    let keys = DerivedKeys::derive(password, salt, options.iterations);

    let cipher = Aes256Gcm::new_from_slice(keys.aes_half())
        .map_err(|_| VaultError::InvalidInput { reason: "bad aes key length".into() })?;
    let ciphertext =
        cipher.encrypt(Nonce::from_slice(iv), plaintext).map_err(|_| VaultError::Decryption)?;

    let body = [
        URL_SAFE_NO_PAD.encode(options.iterations.to_string()),
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(&ciphertext),
    ]
    .join(".");

    let hmac_key = options.hmac_key.as_deref().unwrap_or_else(|| keys.hmac_half());
    let signature = sign(hmac_key, body.as_bytes())?;

    Ok(format!("{body}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Open a sealed record with `password`.
///
/// Verifies the HMAC over the first four segments before attempting AES-GCM.
pub fn vault_open(
    password: &[u8],
    sealed: &str,
    options: &VaultOptions,
) -> Result<Vec<u8>, VaultError> {
    if password.is_empty() {
        return Err(VaultError::InvalidInput { reason: "empty password".into() });
    }

    let parts: Vec<&str> = sealed.split('.').collect();
    let [iterations_b64, salt_b64, iv_b64, ct_b64, sig_b64] = parts.as_slice() else {
        return Err(VaultError::InvalidInput { reason: "expected five dotted segments".into() });
    };

    let iterations: u32 = decode_segment(iterations_b64, "iterations")
        .and_then(|bytes| {
            String::from_utf8(bytes).map_err(|_| VaultError::InvalidInput {
                reason: "iterations segment is not utf-8".into(),
            })
        })?
        .parse()
        .map_err(|_| VaultError::InvalidInput { reason: "iterations segment is not a number".into() })?;

    let salt = decode_segment(salt_b64, "salt")?;
    let iv = decode_segment(iv_b64, "iv")?;
    let ciphertext = decode_segment(ct_b64, "ciphertext")?;
    let signature = decode_segment(sig_b64, "signature")?;

    if iv.len() != IV_SIZE {
        return Err(VaultError::InvalidInput { reason: "iv has wrong length".into() });
    }

    let keys = DerivedKeys::derive(password, &salt, iterations);
    let hmac_key = options.hmac_key.as_deref().unwrap_or_else(|| keys.hmac_half());

    // Signature covers everything but itself.
    let body_len = sealed.len() - sig_b64.len() - 1;
    verify(hmac_key, sealed[..body_len].as_bytes(), &signature)?;

    let cipher = Aes256Gcm::new_from_slice(keys.aes_half())
        .map_err(|_| VaultError::InvalidInput { reason: "bad aes key length".into() })?;
    cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map_err(|_| VaultError::Decryption)
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, VaultError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| VaultError::InvalidInput { reason: format!("{name} segment is not base64url") })
}
