//! X3DH-style asynchronous handshake.
//!
//! Three Diffie-Hellman exchanges over identity, ephemeral, and one-time
//! keys produce a shared session secret before any message is sent. The
//! concatenation order `dh1 || dh2 || dh3` is part of the protocol: both
//! sides must feed the KDF identical bytes.

use sable_crypto::{KeyPair, PublicKeyBytes, SecretBytes, kdf};
use sable_proto::{InitBundle, PrekeyCard};
use zeroize::Zeroize;

use crate::{env::Environment, error::SessionError};

/// Domain separation for the session secret derivation.
const INFO_SESSION: &[u8] = b"SESSION";

/// Fixed all-zero HKDF salt used where the protocol specifies one.
pub(crate) const ZERO_SALT: [u8; 32] = [0u8; 32];

/// Output of a completed handshake. Produced once, consumed once to build
/// the ratchet state.
pub struct SessionSeed {
    /// Peer's long-term identity public key.
    pub peer: PublicKeyBytes,
    /// Shared session secret.
    pub sk: SecretBytes,
    /// Associated data, fixed for the session's lifetime:
    /// `initiator_identity || responder_identity` on both sides.
    pub ad: Vec<u8>,
    /// Pending handshake bundle; present only on the initiator side, and
    /// only until the peer's first successful receive.
    pub init: Option<InitBundle>,
}

impl std::fmt::Debug for SessionSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSeed")
            .field("peer", &self.peer)
            .field("sk", &"<redacted>")
            .field("ad", &self.ad.len())
            .field("init", &self.init.is_some())
            .finish()
    }
}

/// Initiate a handshake against a published prekey card.
///
/// Generates a fresh ephemeral pair and computes:
/// `dh1 = DH(identity, card.one_time)`, `dh2 = DH(epk, card.owner)`,
/// `dh3 = DH(epk, card.one_time)`. The returned `init` bundle must reach
/// the responder attached to the first outgoing message.
pub fn initiate<E: Environment>(
    env: &E,
    identity: &KeyPair,
    card: &PrekeyCard,
) -> Result<SessionSeed, SessionError> {
    let epk = KeyPair::generate(env.random_array());

    let dh1 = identity.diffie_hellman(&card.one_time);
    let dh2 = epk.diffie_hellman(&card.owner);
    let dh3 = epk.diffie_hellman(&card.one_time);

    let sk = derive_session_secret(&dh1, &dh2, &dh3)?;
    let ad = [identity.public_bytes().as_slice(), card.owner.as_slice()].concat();

    tracing::debug!("handshake initiated");

    Ok(SessionSeed {
        peer: card.owner,
        sk,
        ad,
        init: Some(InitBundle {
            from: identity.public_bytes(),
            epk: epk.public_bytes(),
            opk: card.one_time,
        }),
    })
}

/// Complete a handshake from a received init bundle.
///
/// Mirrors [`initiate`] with roles swapped: `dh1 = DH(one_time, init.from)`,
/// `dh2 = DH(identity, init.epk)`, `dh3 = DH(one_time, init.epk)`. The AD is
/// `init.from || identity` here and `identity || card.owner` on the
/// initiator side; the two agree because self and peer swap between the call
/// sites. That ordering is load-bearing for AEAD associated data.
pub fn respond(
    identity: &KeyPair,
    one_time: &KeyPair,
    init: &InitBundle,
) -> Result<SessionSeed, SessionError> {
    let dh1 = one_time.diffie_hellman(&init.from);
    let dh2 = identity.diffie_hellman(&init.epk);
    let dh3 = one_time.diffie_hellman(&init.epk);

    let sk = derive_session_secret(&dh1, &dh2, &dh3)?;
    let ad = [init.from.as_slice(), identity.public_bytes().as_slice()].concat();

    tracing::debug!("handshake accepted");

    Ok(SessionSeed { peer: init.from, sk, ad, init: None })
}

fn derive_session_secret(
    dh1: &SecretBytes,
    dh2: &SecretBytes,
    dh3: &SecretBytes,
) -> Result<SecretBytes, SessionError> {
    let mut combined =
        [dh1.as_bytes().as_slice(), dh2.as_bytes().as_slice(), dh3.as_bytes().as_slice()].concat();

    let mut sk = [0u8; 32];
    let result = kdf(&combined, &ZERO_SALT, INFO_SESSION, &mut sk);
    combined.zeroize();
    result?;

    Ok(SecretBytes::new(sk))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::env::SystemEnv;

    #[test]
    fn both_sides_derive_identical_secret_and_ad() {
        let env = SystemEnv::new();
        let alice = KeyPair::generate(env.random_array());
        let bob = KeyPair::generate(env.random_array());
        let one_time = KeyPair::generate(env.random_array());

        let card = PrekeyCard { owner: bob.public_bytes(), one_time: one_time.public_bytes() };

        let initiator = initiate(&env, &alice, &card).expect("initiate");
        let init = initiator.init.expect("initiator carries init bundle");
        let responder = respond(&bob, &one_time, &init).expect("respond");

        assert_eq!(initiator.sk.as_bytes(), responder.sk.as_bytes());
        assert_eq!(initiator.ad, responder.ad);
        assert_eq!(initiator.peer, bob.public_bytes());
        assert_eq!(responder.peer, alice.public_bytes());
        assert!(responder.init.is_none());
    }

    #[test]
    fn different_one_time_keys_give_different_secrets() {
        let env = SystemEnv::new();
        let alice = KeyPair::generate(env.random_array());
        let bob = KeyPair::generate(env.random_array());
        let opk_a = KeyPair::generate(env.random_array());
        let opk_b = KeyPair::generate(env.random_array());

        let seed_a = initiate(
            &env,
            &alice,
            &PrekeyCard { owner: bob.public_bytes(), one_time: opk_a.public_bytes() },
        )
        .expect("initiate");
        let seed_b = initiate(
            &env,
            &alice,
            &PrekeyCard { owner: bob.public_bytes(), one_time: opk_b.public_bytes() },
        )
        .expect("initiate");

        assert_ne!(seed_a.sk.as_bytes(), seed_b.sk.as_bytes());
    }

    #[test]
    fn seed_debug_redacts_secret() {
        let env = SystemEnv::new();
        let alice = KeyPair::generate(env.random_array());
        let bob = KeyPair::generate(env.random_array());
        let one_time = KeyPair::generate(env.random_array());
        let card = PrekeyCard { owner: bob.public_bytes(), one_time: one_time.public_bytes() };

        let seed = initiate(&env, &alice, &card).expect("initiate");
        assert!(format!("{seed:?}").contains("<redacted>"));
    }
}
