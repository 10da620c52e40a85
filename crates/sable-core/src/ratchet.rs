//! Double Ratchet state machine.
//!
//! Owns the per-session forward-secret chains: a root chain advanced by
//! fresh Diffie-Hellman exchanges and symmetric send/receive chains advanced
//! per message. Skipped message keys are cached (bounded) so out-of-order
//! delivery still decrypts, exactly once per message.
//!
//! # Atomicity
//!
//! Every mutating operation stages its work on a cloned state and commits
//! only on success. A failed decrypt or a skip-bound rejection leaves the
//! observable state byte-identical to before the call, so the caller may
//! safely retry with a different payload.

use std::collections::HashMap;

use sable_crypto::{
    KeyPair, NONCE_SIZE, PublicKeyBytes, SecretBytes, aead_open, aead_seal, chain_mac, kdf,
};
use sable_proto::MessageHeader;
use zeroize::Zeroize;

use crate::{
    env::Environment,
    error::SessionError,
    handshake::{SessionSeed, ZERO_SALT},
};

/// Default bound on how far ahead of `recv_n` a header may point.
///
/// A DoS guard: it caps both skipped-key cache growth and per-call chain
/// iteration. Messages further ahead are rejected, not buffered.
pub const DEFAULT_MAX_SKIP: u32 = 10;

/// Domain separation for the root chain.
const INFO_ROOT: &[u8] = b"ROOT";
/// Domain separation for the per-message associated-data key.
const INFO_AEAD: &[u8] = b"AEAD";
/// Domain separation for the per-message encryption key.
const INFO_ENCRYPT: &[u8] = b"ENCRYPT";

/// Chain HMAC label yielding the message key.
const LABEL_MESSAGE_KEY: u8 = 0x01;
/// Chain HMAC label yielding the next chain key.
const LABEL_CHAIN_KEY: u8 = 0x02;

/// Lookup key for cached skipped message keys.
pub(crate) type SkippedKey = (PublicKeyBytes, u32);

/// Mutable per-session ratchet state. Exactly one logical writer at a time;
/// `Session` enforces this through `&mut self`.
#[derive(Clone)]
pub struct RatchetState {
    /// Our current DH ratchet key pair (`DHs`).
    pub(crate) dh_self: KeyPair,
    /// Last known remote DH public key (`DHr`).
    pub(crate) dh_remote: Option<PublicKeyBytes>,
    /// Root key (`RK`).
    pub(crate) root_key: SecretBytes,
    /// Sending chain key (`CKs`).
    pub(crate) chain_send: Option<SecretBytes>,
    /// Receiving chain key (`CKr`).
    pub(crate) chain_recv: Option<SecretBytes>,
    /// Index of the next outgoing message in the current sending chain.
    pub(crate) send_n: u32,
    /// Index of the next expected message in the current receiving chain.
    pub(crate) recv_n: u32,
    /// Length of the previous sending chain (`PN`).
    pub(crate) prev_chain_len: u32,
    /// Cached message keys for out-of-order delivery.
    pub(crate) skipped: HashMap<SkippedKey, SecretBytes>,
}

impl RatchetState {
    /// Initialize the initiator side from a handshake seed.
    ///
    /// The initiator can ratchet immediately: it knows the responder's
    /// one-time key and derives a sending chain from the first DH.
    pub fn init_initiator<E: Environment>(
        env: &E,
        seed: &SessionSeed,
        remote_one_time: PublicKeyBytes,
    ) -> Result<Self, SessionError> {
        let dh_self = KeyPair::generate(env.random_array());
        let dh = dh_self.diffie_hellman(&remote_one_time);
        let (root_key, chain_send) = root_kdf(&seed.sk, &dh)?;

        Ok(Self {
            dh_self,
            dh_remote: Some(remote_one_time),
            root_key,
            chain_send: Some(chain_send),
            chain_recv: None,
            send_n: 0,
            recv_n: 0,
            prev_chain_len: 0,
            skipped: HashMap::new(),
        })
    }

    /// Initialize the responder side from a handshake seed.
    ///
    /// The responder adopts the consumed one-time pair as its first ratchet
    /// key and waits: its first DH-ratchet advance happens lazily on the
    /// first receive.
    pub fn init_responder(seed: &SessionSeed, one_time: KeyPair) -> Self {
        Self {
            dh_self: one_time,
            dh_remote: None,
            root_key: seed.sk.clone(),
            chain_send: None,
            chain_recv: None,
            send_n: 0,
            recv_n: 0,
            prev_chain_len: 0,
            skipped: HashMap::new(),
        }
    }

    /// Our current ratchet public key.
    pub fn public_key(&self) -> PublicKeyBytes {
        self.dh_self.public_bytes()
    }

    /// Encrypt one message, advancing the sending chain.
    pub fn encrypt<E: Environment>(
        &mut self,
        env: &E,
        plaintext: &[u8],
        ad: &[u8],
    ) -> Result<(MessageHeader, Vec<u8>), SessionError> {
        let mut staged = self.clone();

        let ck = staged
            .chain_send
            .as_ref()
            .ok_or_else(|| SessionError::InvalidInput { reason: "no sending chain".into() })?;
        let (next_ck, mk) = chain_kdf(ck)?;
        staged.chain_send = Some(next_ck);

        let header = MessageHeader {
            dh: staged.dh_self.public_bytes(),
            pn: staged.prev_chain_len,
            n: staged.send_n,
        };
        staged.send_n += 1;

        let aead_key = bound_key(ad, &header, INFO_AEAD)?;
        let enc_key = bound_key(mk.as_bytes(), &header, INFO_ENCRYPT)?;

        let nonce: [u8; NONCE_SIZE] = env.random_array();
        let sealed = aead_seal(&enc_key, &nonce, plaintext, &aead_key)?;

        tracing::trace!(n = header.n, "sending chain advanced");

        *self = staged;
        Ok((header, sealed))
    }

    /// Decrypt one message, performing skips and the DH-ratchet step as the
    /// header demands. Commits state only on success.
    pub fn decrypt<E: Environment>(
        &mut self,
        env: &E,
        header: &MessageHeader,
        ciphertext: &[u8],
        ad: &[u8],
        max_skip: u32,
    ) -> Result<Vec<u8>, SessionError> {
        let aead_key = bound_key(ad, header, INFO_AEAD)?;
        let mut staged = self.clone();

        // A cached skipped key decrypts without touching the chains. A
        // lookup hit that fails authentication falls through as if absent;
        // the normal ratchet path is the correct recovery.
        if let Some(mk) = staged.skipped.get(&(header.dh, header.n)) {
            let enc_key = bound_key(mk.as_bytes(), header, INFO_ENCRYPT)?;
            if let Ok(plaintext) = aead_open(&enc_key, ciphertext, &aead_key) {
                staged.skipped.remove(&(header.dh, header.n));
                tracing::trace!(n = header.n, "skipped key consumed");
                *self = staged;
                return Ok(plaintext);
            }
        }

        if staged.dh_remote != Some(header.dh) {
            staged.skip_to(header.pn, max_skip)?;
            staged.dh_ratchet(env, header)?;
        }
        staged.skip_to(header.n, max_skip)?;

        let ck = staged
            .chain_recv
            .as_ref()
            .ok_or_else(|| SessionError::InvalidInput { reason: "no receiving chain".into() })?;
        let (next_ck, mk) = chain_kdf(ck)?;
        staged.chain_recv = Some(next_ck);
        staged.recv_n += 1;

        let enc_key = bound_key(mk.as_bytes(), header, INFO_ENCRYPT)?;
        let plaintext = aead_open(&enc_key, ciphertext, &aead_key).map_err(|_| {
            tracing::warn!(n = header.n, "message failed authentication");
            SessionError::DecryptionFailure
        })?;

        *self = staged;
        Ok(plaintext)
    }

    /// Advance the receiving chain to `until`, caching the passed-over
    /// message keys. Rejects before touching anything if the bound is
    /// exceeded.
    fn skip_to(&mut self, until: u32, max_skip: u32) -> Result<(), SessionError> {
        if self.recv_n.saturating_add(max_skip) < until {
            return Err(SessionError::TooManySkippedMessages {
                requested: until,
                allowed: self.recv_n.saturating_add(max_skip),
            });
        }

        let Some(mut ck) = self.chain_recv.clone() else {
            return Ok(());
        };
        while self.recv_n < until {
            let (next_ck, mk) = chain_kdf(&ck)?;
            ck = next_ck;
            if let Some(remote) = self.dh_remote {
                self.skipped.insert((remote, self.recv_n), mk);
            }
            self.recv_n += 1;
        }
        self.chain_recv = Some(ck);

        tracing::trace!(cached = self.skipped.len(), "skipped ahead to {until}");
        Ok(())
    }

    /// The DH-ratchet step: adopt the sender's new key, turn the root chain
    /// twice, and mint a fresh sending identity. This is what gives
    /// post-compromise healing.
    fn dh_ratchet<E: Environment>(
        &mut self,
        env: &E,
        header: &MessageHeader,
    ) -> Result<(), SessionError> {
        self.prev_chain_len = self.send_n;
        self.send_n = 0;
        self.recv_n = 0;
        self.dh_remote = Some(header.dh);

        let dh = self.dh_self.diffie_hellman(&header.dh);
        let (root_key, chain_recv) = root_kdf(&self.root_key, &dh)?;
        self.root_key = root_key;
        self.chain_recv = Some(chain_recv);

        self.dh_self = KeyPair::generate(env.random_array());
        let dh = self.dh_self.diffie_hellman(&header.dh);
        let (root_key, chain_send) = root_kdf(&self.root_key, &dh)?;
        self.root_key = root_key;
        self.chain_send = Some(chain_send);

        tracing::debug!(pn = self.prev_chain_len, "dh ratchet step");
        Ok(())
    }
}

/// Root KDF: 512 bits from `HKDF(dh, salt = rk, info = "ROOT")`; first half
/// is the new root key, second half the new chain key.
fn root_kdf(rk: &SecretBytes, dh: &SecretBytes) -> Result<(SecretBytes, SecretBytes), SessionError> {
    let mut out = [0u8; 64];
    kdf(dh.as_bytes(), rk.as_bytes(), INFO_ROOT, &mut out)?;

    let mut root = [0u8; 32];
    let mut chain = [0u8; 32];
    root.copy_from_slice(&out[..32]);
    chain.copy_from_slice(&out[32..]);
    out.zeroize();

    Ok((SecretBytes::new(root), SecretBytes::new(chain)))
}

/// Chain KDF: two HMAC calls over distinguishing single-byte labels. One
/// yields the message key, the other the next chain key; deterministic and
/// one-way, which is the forward-secrecy step.
fn chain_kdf(ck: &SecretBytes) -> Result<(SecretBytes, SecretBytes), SessionError> {
    let mk = chain_mac(ck.as_bytes(), LABEL_MESSAGE_KEY)?;
    let next = chain_mac(ck.as_bytes(), LABEL_CHAIN_KEY)?;
    Ok((SecretBytes::new(next), SecretBytes::new(mk)))
}

/// Bind a secret to a header: `HKDF(secret || header_bytes, zero salt,
/// info)`. Used for both the associated-data key (secret = session AD) and
/// the encryption key (secret = message key).
fn bound_key(secret: &[u8], header: &MessageHeader, info: &[u8]) -> Result<[u8; 32], SessionError> {
    let mut input = [secret, header.to_bytes().as_slice()].concat();
    let mut key = [0u8; 32];
    let result = kdf(&input, &ZERO_SALT, info, &mut key);
    input.zeroize();
    result?;
    Ok(key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{env::SystemEnv, handshake};
    use sable_proto::PrekeyCard;

    /// Build a synchronized initiator/responder pair plus the shared AD.
    fn ratchet_pair() -> (RatchetState, RatchetState, Vec<u8>) {
        let env = SystemEnv::new();
        let alice = KeyPair::generate(env.random_array());
        let bob = KeyPair::generate(env.random_array());
        let one_time = KeyPair::generate(env.random_array());
        let card = PrekeyCard { owner: bob.public_bytes(), one_time: one_time.public_bytes() };

        let seed_a = handshake::initiate(&env, &alice, &card).expect("initiate");
        let init = seed_a.init.expect("init bundle");
        let seed_b = handshake::respond(&bob, &one_time, &init).expect("respond");

        let state_a =
            RatchetState::init_initiator(&env, &seed_a, card.one_time).expect("initiator");
        let state_b = RatchetState::init_responder(&seed_b, one_time);

        (state_a, state_b, seed_a.ad)
    }

    #[test]
    fn in_order_round_trip() {
        let env = SystemEnv::new();
        let (mut alice, mut bob, ad) = ratchet_pair();

        for text in [&b"first"[..], b"second", b"third"] {
            let (header, ct) = alice.encrypt(&env, text, &ad).expect("encrypt");
            let pt = bob.decrypt(&env, &header, &ct, &ad, DEFAULT_MAX_SKIP).expect("decrypt");
            assert_eq!(pt, text);
        }
    }

    #[test]
    fn counters_reset_on_dh_ratchet() {
        let env = SystemEnv::new();
        let (mut alice, mut bob, ad) = ratchet_pair();

        let (h1, c1) = alice.encrypt(&env, b"a1", &ad).expect("encrypt");
        bob.decrypt(&env, &h1, &c1, &ad, DEFAULT_MAX_SKIP).expect("decrypt");
        assert_eq!(bob.recv_n, 1);

        // Bob's reply triggers Alice's DH ratchet on receive.
        let (h2, c2) = bob.encrypt(&env, b"b1", &ad).expect("encrypt");
        let alice_key_before = alice.public_key();
        alice.decrypt(&env, &h2, &c2, &ad, DEFAULT_MAX_SKIP).expect("decrypt");

        assert_eq!(alice.recv_n, 1);
        assert_eq!(alice.send_n, 0);
        assert_eq!(alice.prev_chain_len, 1);
        assert_ne!(alice.public_key(), alice_key_before, "fresh sending identity");
    }

    #[test]
    fn out_of_order_within_epoch() {
        let env = SystemEnv::new();
        let (mut alice, mut bob, ad) = ratchet_pair();

        let (h1, c1) = alice.encrypt(&env, b"one", &ad).expect("encrypt");
        let (h2, c2) = alice.encrypt(&env, b"two", &ad).expect("encrypt");
        let (h3, c3) = alice.encrypt(&env, b"three", &ad).expect("encrypt");

        // Delivered 2, 3, 1: each decrypts exactly once.
        assert_eq!(bob.decrypt(&env, &h2, &c2, &ad, DEFAULT_MAX_SKIP).expect("2"), b"two");
        assert_eq!(bob.decrypt(&env, &h3, &c3, &ad, DEFAULT_MAX_SKIP).expect("3"), b"three");
        assert_eq!(bob.decrypt(&env, &h1, &c1, &ad, DEFAULT_MAX_SKIP).expect("1"), b"one");

        // Replay: the cached key was deleted on use.
        assert!(matches!(
            bob.decrypt(&env, &h1, &c1, &ad, DEFAULT_MAX_SKIP),
            Err(SessionError::DecryptionFailure)
        ));
    }

    #[test]
    fn skip_bound_rejection_leaves_state_unchanged() {
        let env = SystemEnv::new();
        let (mut alice, mut bob, ad) = ratchet_pair();

        let (h1, c1) = alice.encrypt(&env, b"seed recv chain", &ad).expect("encrypt");
        bob.decrypt(&env, &h1, &c1, &ad, DEFAULT_MAX_SKIP).expect("decrypt");

        // Forge a header far beyond the bound on the same chain.
        let forged = MessageHeader { dh: h1.dh, pn: h1.pn, n: h1.n + DEFAULT_MAX_SKIP + 2 };
        let recv_before = bob.recv_n;
        let chain_before = bob.chain_recv.clone().expect("chain").to_bytes();

        let err = bob
            .decrypt(&env, &forged, &c1, &ad, DEFAULT_MAX_SKIP)
            .expect_err("must reject");
        assert!(matches!(err, SessionError::TooManySkippedMessages { .. }));

        assert_eq!(bob.recv_n, recv_before);
        assert_eq!(bob.chain_recv.clone().expect("chain").to_bytes(), chain_before);

        // Session remains usable afterwards.
        let (h2, c2) = alice.encrypt(&env, b"still fine", &ad).expect("encrypt");
        assert_eq!(
            bob.decrypt(&env, &h2, &c2, &ad, DEFAULT_MAX_SKIP).expect("decrypt"),
            b"still fine"
        );
    }

    #[test]
    fn failed_decrypt_leaves_state_unchanged() {
        let env = SystemEnv::new();
        let (mut alice, mut bob, ad) = ratchet_pair();

        let (header, mut ct) = alice.encrypt(&env, b"payload", &ad).expect("encrypt");
        let last = ct.len() - 1;
        ct[last] ^= 0x01;

        let recv_before = bob.recv_n;
        assert!(matches!(
            bob.decrypt(&env, &header, &ct, &ad, DEFAULT_MAX_SKIP),
            Err(SessionError::DecryptionFailure)
        ));
        assert_eq!(bob.recv_n, recv_before, "failed decrypt must not advance the chain");

        // The untampered message still decrypts.
        ct[last] ^= 0x01;
        assert_eq!(
            bob.decrypt(&env, &header, &ct, &ad, DEFAULT_MAX_SKIP).expect("decrypt"),
            b"payload"
        );
    }

    #[test]
    fn wrong_ad_fails_authentication() {
        let env = SystemEnv::new();
        let (mut alice, mut bob, ad) = ratchet_pair();

        let (header, ct) = alice.encrypt(&env, b"payload", &ad).expect("encrypt");
        assert!(matches!(
            bob.decrypt(&env, &header, &ct, b"different ad", DEFAULT_MAX_SKIP),
            Err(SessionError::DecryptionFailure)
        ));
    }
}
