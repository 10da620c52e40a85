//! Key material types.
//!
//! X25519 key pairs and zeroizing secret wrappers. Private halves are never
//! serialized by this crate; callers that persist state must extract the raw
//! bytes explicitly and re-wrap on load.

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw X25519 public key bytes as they appear on the wire.
pub type PublicKeyBytes = [u8; 32];

/// A 32-byte secret that zeroizes on drop.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl never prints the contained bytes.
///   Always use this wrapper for chain keys, message keys, and shared
///   secrets so they cannot leak through logging.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes([u8; 32]);

impl SecretBytes {
    /// Wrap raw secret bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the secret bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy the secret bytes out, for persistence snapshots only.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl From<[u8; 32]> for SecretBytes {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBytes(<redacted>)")
    }
}

/// An X25519 key pair.
///
/// Identity keys are long-lived; ephemeral and ratchet keys are single-use
/// per epoch. The secret half lives only in memory and zeroizes on drop
/// (via `x25519-dalek`'s `zeroize` feature).
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Build a key pair from 32 caller-provided random bytes.
    ///
    /// The seed is clamped per X25519 convention by `x25519-dalek`.
    pub fn generate(seed: [u8; 32]) -> Self {
        let secret = StaticSecret::from(seed);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild a key pair from persisted secret bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::generate(bytes)
    }

    /// The public half, as wire bytes.
    pub fn public_bytes(&self) -> PublicKeyBytes {
        self.public.to_bytes()
    }

    /// Copy the secret bytes out, for persistence snapshots only.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// X25519 Diffie-Hellman with a peer public key.
    pub fn diffie_hellman(&self, peer: &PublicKeyBytes) -> SecretBytes {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer));
        SecretBytes::new(shared.to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex_prefix(&self.public.to_bytes()))
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn hex_prefix(bytes: &[u8; 32]) -> String {
    bytes[..4].iter().map(|b| format!("{b:02x}")).collect::<String>() + ".."
}
