//! Sealed-sender envelopes.
//!
//! Anonymous-sender encryption used to bootstrap a handshake (or carry any
//! payload) without revealing the sender to passive observers: the sender's
//! identity key travels inside an AEAD `seal` that only the recipient's
//! secret can open, and the message key additionally binds the sender's
//! identity so the recovered sender cannot be a lie.

use sable_crypto::{KeyPair, NONCE_SIZE, PublicKeyBytes, aead_open, aead_seal, kdf};
use sable_proto::Envelope;
use zeroize::Zeroize;

use crate::{env::Environment, error::SessionError, handshake::ZERO_SALT};

/// Domain separation for the seal key block.
const INFO_SEAL: &[u8] = b"SEAL";
/// Domain separation for the message key.
const INFO_MESSAGE: &[u8] = b"MESSAGE";

/// A successfully opened envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedEnvelope {
    /// Sender's identity public key, recovered from the seal.
    pub sender: PublicKeyBytes,
    /// Decrypted message bytes.
    pub plaintext: Vec<u8>,
}

/// Seal `plaintext` for `recipient`, hiding the sender's identity.
///
/// An ephemeral DH against the recipient yields a 512-bit block split into
/// the seal key (encrypts the sender's identity, AAD = `ek || recipient`)
/// and a chain key. The message key is then derived from the sender's
/// long-term DH with the recipient, salted by that chain key, so only
/// someone holding the claimed sender's secret could have produced it.
pub fn seal<E: Environment>(
    env: &E,
    identity: &KeyPair,
    recipient: PublicKeyBytes,
    plaintext: &[u8],
) -> Result<Envelope, SessionError> {
    let ek = KeyPair::generate(env.random_array());

    let (seal_key, chain_key) = seal_keys(&ek, &recipient)?;
    let seal_ad = [ek.public_bytes().as_slice(), recipient.as_slice()].concat();
    let nonce: [u8; NONCE_SIZE] = env.random_array();
    let seal = aead_seal(&seal_key, &nonce, &identity.public_bytes(), &seal_ad)?;

    let msg_key = message_key(identity, &recipient, &chain_key)?;
    let msg_ad = [identity.public_bytes().as_slice(), recipient.as_slice()].concat();
    let nonce: [u8; NONCE_SIZE] = env.random_array();
    let ciphertext = aead_seal(&msg_key, &nonce, plaintext, &msg_ad)?;

    Ok(Envelope { recipient, ek: ek.public_bytes(), seal, ciphertext })
}

/// Open an envelope addressed to `identity`.
///
/// Recovers the sender's identity from the seal first, then uses it to
/// derive the message key. Fails with [`SessionError::DecryptionFailure`]
/// on any tamper, without revealing partial plaintext.
pub fn open(identity: &KeyPair, envelope: &Envelope) -> Result<OpenedEnvelope, SessionError> {
    let (seal_key, chain_key) = open_keys(identity, &envelope.ek)?;
    let seal_ad = [envelope.ek.as_slice(), identity.public_bytes().as_slice()].concat();
    let sender_bytes = aead_open(&seal_key, &envelope.seal, &seal_ad)
        .map_err(|_| SessionError::DecryptionFailure)?;

    let sender: PublicKeyBytes = sender_bytes.as_slice().try_into().map_err(|_| {
        SessionError::InvalidInput { reason: "seal did not contain a public key".into() }
    })?;

    let msg_key = message_key(identity, &sender, &chain_key)?;
    let msg_ad = [sender.as_slice(), identity.public_bytes().as_slice()].concat();
    let plaintext = aead_open(&msg_key, &envelope.ciphertext, &msg_ad)
        .map_err(|_| SessionError::DecryptionFailure)?;

    Ok(OpenedEnvelope { sender, plaintext })
}

/// Sender-side seal/chain key derivation from the ephemeral DH.
fn seal_keys(ek: &KeyPair, recipient: &PublicKeyBytes) -> Result<([u8; 32], [u8; 32]), SessionError> {
    let dh = ek.diffie_hellman(recipient);
    split_seal_block(dh.as_bytes())
}

/// Recipient-side derivation of the same block.
fn open_keys(
    identity: &KeyPair,
    ek: &PublicKeyBytes,
) -> Result<([u8; 32], [u8; 32]), SessionError> {
    let dh = identity.diffie_hellman(ek);
    split_seal_block(dh.as_bytes())
}

fn split_seal_block(dh: &[u8; 32]) -> Result<([u8; 32], [u8; 32]), SessionError> {
    let mut block = [0u8; 64];
    kdf(dh, &ZERO_SALT, INFO_SEAL, &mut block)?;

    let mut seal_key = [0u8; 32];
    let mut chain_key = [0u8; 32];
    seal_key.copy_from_slice(&block[..32]);
    chain_key.copy_from_slice(&block[32..]);
    block.zeroize();

    Ok((seal_key, chain_key))
}

/// Message key: DH between the two identities, salted by the chain key.
fn message_key(
    own: &KeyPair,
    peer: &PublicKeyBytes,
    chain_key: &[u8; 32],
) -> Result<[u8; 32], SessionError> {
    let dh = own.diffie_hellman(peer);
    let mut key = [0u8; 32];
    kdf(dh.as_bytes(), chain_key, INFO_MESSAGE, &mut key)?;
    Ok(key)
}
