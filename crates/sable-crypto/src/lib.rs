//! Sable Cryptographic Primitives
//!
//! This crate provides the cryptographic building blocks for the Sable
//! session layer.
//!
//! # Design
//!
//! All functions in this crate are pure - they have no side effects and
//! produce deterministic outputs given the same inputs. Random bytes required
//! for key generation, nonces, and salts must be provided by the caller,
//! enabling:
//!
//! - Deterministic testing with seeded RNG
//! - Sans-IO architecture compatibility
//! - No coupling to application-level abstractions
//!
//! # Security Properties
//!
//! - Forward Secrecy: Chain keys are one-way ratcheted via HMAC
//! - Domain Separation: Every HKDF derivation carries an info string
//! - Secret Hygiene: Key material zeroizes on drop and never appears in
//!   `Debug` output

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod keys;
pub mod suite;
pub mod vault;

pub use keys::{KeyPair, PublicKeyBytes, SecretBytes};
pub use suite::{CryptoError, NONCE_SIZE, aead_open, aead_seal, chain_mac, kdf};
pub use vault::{VaultError, VaultOptions, vault_open, vault_seal};
