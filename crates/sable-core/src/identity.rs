//! Long-term identity and its entry points.
//!
//! An [`Identity`] owns the long-lived key pair and hands out everything
//! built on it: one-time prekey issuance, session creation on both sides of
//! the handshake, and sealed-sender envelopes.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use sable_crypto::{KeyPair, PublicKeyBytes};
use sable_proto::{Envelope, InitBundle, PrekeyCard, decode_payload, encode_payload};

use crate::{
    env::Environment,
    envelope,
    error::SessionError,
    handshake,
    session::Session,
};

/// The secret half of an issued one-time prekey.
///
/// Held by the issuer until a handshake consumes it. `accept_session` takes
/// it by value: once a session is built from it the key is gone, which is
/// exactly the reuse-across-sessions guarantee the protocol needs.
pub struct OneTimeKey {
    pair: KeyPair,
}

impl OneTimeKey {
    /// Raw secret bytes, for persisting unconsumed offers.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.pair.secret_bytes()
    }

    /// Rebuild a persisted, still-unconsumed offer.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self { pair: KeyPair::from_secret_bytes(bytes) }
    }

    /// The public half, matching the published card.
    pub fn public_bytes(&self) -> PublicKeyBytes {
        self.pair.public_bytes()
    }
}

impl std::fmt::Debug for OneTimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneTimeKey").field("public", &self.pair.public_bytes()).finish()
    }
}

/// A freshly issued prekey: the card to publish and the secret to keep.
#[derive(Debug)]
pub struct PrekeyIssue {
    /// Publishable card.
    pub card: PrekeyCard,
    /// Matching secret, held until a handshake consumes it.
    pub secret: OneTimeKey,
}

/// A message recovered from a sealed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedMessage<T> {
    /// Sender identity recovered from the seal.
    pub sender: PublicKeyBytes,
    /// Decoded payload.
    pub payload: T,
}

/// A long-term identity: one key pair and the operations built on it.
pub struct Identity<E: Environment> {
    env: E,
    keys: KeyPair,
}

impl<E: Environment> Identity<E> {
    /// Create a fresh identity.
    pub fn new(env: E) -> Self {
        let keys = KeyPair::generate(env.random_array());
        Self { env, keys }
    }

    /// Our identity public key.
    pub fn public_key(&self) -> PublicKeyBytes {
        self.keys.public_bytes()
    }

    /// Issue a one-time prekey offer.
    ///
    /// The card is published; the secret stays here until a peer's init
    /// bundle names it.
    pub fn issue_prekey(&self) -> PrekeyIssue {
        let pair = KeyPair::generate(self.env.random_array());
        let card = PrekeyCard { owner: self.keys.public_bytes(), one_time: pair.public_bytes() };
        PrekeyIssue { card, secret: OneTimeKey { pair } }
    }

    /// Open a session as the handshake initiator against a published card.
    pub fn start_session(&self, card: &PrekeyCard) -> Result<Session<E>, SessionError> {
        let seed = handshake::initiate(&self.env, &self.keys, card)?;
        Session::start(self.env.clone(), seed, card.one_time)
    }

    /// Open a session as the responder, consuming the one-time secret the
    /// initiator's bundle names.
    pub fn accept_session(
        &self,
        init: &InitBundle,
        one_time: OneTimeKey,
    ) -> Result<Session<E>, SessionError> {
        if init.opk != one_time.public_bytes() {
            return Err(SessionError::InvalidInput {
                reason: "init bundle names a different one-time key".into(),
            });
        }
        let seed = handshake::respond(&self.keys, &one_time.pair, init)?;
        Ok(Session::accept(self.env.clone(), seed, one_time.pair))
    }

    /// Seal an arbitrary payload for `recipient` without revealing our
    /// identity to observers.
    pub fn seal_message<T: Serialize>(
        &self,
        recipient: PublicKeyBytes,
        message: &T,
    ) -> Result<Envelope, SessionError> {
        let plaintext = encode_payload(message)?;
        envelope::seal(&self.env, &self.keys, recipient, &plaintext)
    }

    /// Open a sealed envelope addressed to us.
    pub fn open_message<T: DeserializeOwned>(
        &self,
        sealed: &Envelope,
    ) -> Result<OpenedMessage<T>, SessionError> {
        let opened = envelope::open(&self.keys, sealed)?;
        let payload = decode_payload(&opened.plaintext)?;
        Ok(OpenedMessage { sender: opened.sender, payload })
    }

    /// Capture the identity for persistence.
    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot { secret: self.keys.secret_bytes() }
    }

    /// Rebuild a persisted identity.
    pub fn restore(env: E, snapshot: &IdentitySnapshot) -> Self {
        Self { env, keys: KeyPair::from_secret_bytes(snapshot.secret) }
    }
}

impl<E: Environment> std::fmt::Debug for Identity<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("public", &self.keys.public_bytes()).finish()
    }
}

/// Opaque serializable identity record. Contains the long-term secret;
/// protect at rest (the password vault exists for exactly this).
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    secret: [u8; 32],
}

impl std::fmt::Debug for IdentitySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdentitySnapshot(<redacted>)")
    }
}
