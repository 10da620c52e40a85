//! Session façade: the stateful send/read/snapshot surface.
//!
//! Composes a handshake seed and the ratchet state machine into one owned
//! object. `&mut self` on every mutating operation is the single-writer
//! boundary: the borrow checker serializes sends and reads on one session,
//! while distinct sessions proceed in unbounded parallelism.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use sable_crypto::{KeyPair, PublicKeyBytes, SecretBytes};
use sable_proto::{InitBundle, MessageHeader, RatchetMessage, decode_payload, encode_payload};

use crate::{
    env::Environment,
    error::SessionError,
    handshake::SessionSeed,
    ratchet::{DEFAULT_MAX_SKIP, RatchetState},
};

/// A decrypted incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage<T> {
    /// The cleartext ratchet header the message arrived under.
    pub header: MessageHeader,
    /// The decoded application payload.
    pub plaintext: T,
    /// The peer this session is bound to.
    pub sender: PublicKeyBytes,
}

/// A live messaging session with one peer.
pub struct Session<E: Environment> {
    env: E,
    state: RatchetState,
    ad: Vec<u8>,
    peer: PublicKeyBytes,
    pending_init: Option<InitBundle>,
    max_skip: u32,
}

impl<E: Environment> Session<E> {
    /// Start a session as the handshake initiator.
    pub(crate) fn start(
        env: E,
        seed: SessionSeed,
        remote_one_time: PublicKeyBytes,
    ) -> Result<Self, SessionError> {
        let state = RatchetState::init_initiator(&env, &seed, remote_one_time)?;
        Ok(Self {
            env,
            state,
            ad: seed.ad,
            peer: seed.peer,
            pending_init: seed.init,
            max_skip: DEFAULT_MAX_SKIP,
        })
    }

    /// Accept a session as the handshake responder.
    pub(crate) fn accept(env: E, seed: SessionSeed, one_time: KeyPair) -> Self {
        let state = RatchetState::init_responder(&seed, one_time);
        Self {
            env,
            state,
            ad: seed.ad,
            peer: seed.peer,
            pending_init: None,
            max_skip: DEFAULT_MAX_SKIP,
        }
    }

    /// Override the out-of-order skip bound for this session.
    pub fn with_max_skip(mut self, max_skip: u32) -> Self {
        self.max_skip = max_skip;
        self
    }

    /// The peer identity this session talks to.
    pub fn peer(&self) -> PublicKeyBytes {
        self.peer
    }

    /// Whether the handshake bundle is still attached to outgoing messages.
    pub fn init_pending(&self) -> bool {
        self.pending_init.is_some()
    }

    /// Encrypt `message` for the peer.
    ///
    /// The handshake bundle rides along while it has not yet been consumed
    /// by a successful peer receive.
    pub fn send<T: Serialize>(&mut self, message: &T) -> Result<RatchetMessage, SessionError> {
        let plaintext = encode_payload(message)?;
        let (header, ciphertext) = self.state.encrypt(&self.env, &plaintext, &self.ad)?;

        Ok(match self.pending_init {
            Some(init) => RatchetMessage::Initial { init, header, ciphertext },
            None => RatchetMessage::Steady { header, ciphertext },
        })
    }

    /// Decrypt an incoming message.
    ///
    /// All-or-nothing: on any failure the session state is byte-identical to
    /// before the call. The first successful read clears the pending
    /// handshake bundle (the peer evidently has it).
    pub fn read<T: DeserializeOwned>(
        &mut self,
        message: &RatchetMessage,
    ) -> Result<ReceivedMessage<T>, SessionError> {
        let header = message.header();

        let mut staged = self.state.clone();
        let plaintext =
            staged.decrypt(&self.env, header, message.ciphertext(), &self.ad, self.max_skip)?;
        let payload = decode_payload(&plaintext)?;

        self.state = staged;
        self.pending_init = None;

        Ok(ReceivedMessage { header: *header, plaintext: payload, sender: self.peer })
    }

    /// Produce an independent deep copy of the session for persistence.
    ///
    /// The snapshot shares nothing with the live session; restoring it and
    /// continuing produces behavior identical to continuing the original.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            ratchet: RatchetSnapshot::capture(&self.state),
            ad: self.ad.clone(),
            peer: self.peer,
            init: self.pending_init,
            max_skip: self.max_skip,
        }
    }

    /// Rebuild a session from a persistence snapshot.
    pub fn restore(env: E, snapshot: &SessionSnapshot) -> Self {
        Self {
            env,
            state: snapshot.ratchet.rebuild(),
            ad: snapshot.ad.clone(),
            peer: snapshot.peer,
            pending_init: snapshot.init,
            max_skip: snapshot.max_skip,
        }
    }
}

impl<E: Environment> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("init_pending", &self.pending_init.is_some())
            .field("max_skip", &self.max_skip)
            .finish_non_exhaustive()
    }
}

/// Opaque serializable session record.
///
/// Round-trip fidelity is the only contract; there is no stable external
/// format promise. Contains raw key material: callers persisting snapshots
/// should wrap them in the password vault or equivalent protection.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    ratchet: RatchetSnapshot,
    ad: Vec<u8>,
    peer: PublicKeyBytes,
    init: Option<InitBundle>,
    max_skip: u32,
}

impl std::fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("peer", &self.peer)
            .field("keys", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct RatchetSnapshot {
    dh_secret: [u8; 32],
    dh_remote: Option<PublicKeyBytes>,
    root_key: [u8; 32],
    chain_send: Option<[u8; 32]>,
    chain_recv: Option<[u8; 32]>,
    send_n: u32,
    recv_n: u32,
    prev_chain_len: u32,
    skipped: Vec<SkippedEntry>,
}

#[derive(Clone, Serialize, Deserialize)]
struct SkippedEntry {
    dh: PublicKeyBytes,
    n: u32,
    key: [u8; 32],
}

impl RatchetSnapshot {
    fn capture(state: &RatchetState) -> Self {
        Self {
            dh_secret: state.dh_self.secret_bytes(),
            dh_remote: state.dh_remote,
            root_key: state.root_key.to_bytes(),
            chain_send: state.chain_send.as_ref().map(SecretBytes::to_bytes),
            chain_recv: state.chain_recv.as_ref().map(SecretBytes::to_bytes),
            send_n: state.send_n,
            recv_n: state.recv_n,
            prev_chain_len: state.prev_chain_len,
            skipped: state
                .skipped
                .iter()
                .map(|(&(dh, n), key)| SkippedEntry { dh, n, key: key.to_bytes() })
                .collect(),
        }
    }

    fn rebuild(&self) -> RatchetState {
        RatchetState {
            dh_self: KeyPair::from_secret_bytes(self.dh_secret),
            dh_remote: self.dh_remote,
            root_key: SecretBytes::new(self.root_key),
            chain_send: self.chain_send.map(SecretBytes::new),
            chain_recv: self.chain_recv.map(SecretBytes::new),
            send_n: self.send_n,
            recv_n: self.recv_n,
            prev_chain_len: self.prev_chain_len,
            skipped: self
                .skipped
                .iter()
                .map(|entry| ((entry.dh, entry.n), SecretBytes::new(entry.key)))
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{env::SystemEnv, handshake};
    use sable_proto::PrekeyCard;

    fn session_pair() -> (Session<SystemEnv>, Session<SystemEnv>) {
        let env = SystemEnv::new();
        let alice = KeyPair::generate(env.random_array());
        let bob = KeyPair::generate(env.random_array());
        let one_time = KeyPair::generate(env.random_array());
        let card = PrekeyCard { owner: bob.public_bytes(), one_time: one_time.public_bytes() };

        let seed_a = handshake::initiate(&env, &alice, &card).expect("initiate");
        let init = seed_a.init.expect("init");
        let seed_b = handshake::respond(&bob, &one_time, &init).expect("respond");

        let session_a = Session::start(env.clone(), seed_a, card.one_time).expect("start");
        let session_b = Session::accept(env, seed_b, one_time);
        (session_a, session_b)
    }

    #[test]
    fn init_rides_until_first_read() {
        let (mut alice, mut bob) = session_pair();
        assert!(alice.init_pending());

        let p1 = alice.send(&"hi").expect("send");
        assert!(p1.init().is_some(), "first message carries the init bundle");

        let got: ReceivedMessage<String> = bob.read(&p1).expect("read");
        assert_eq!(got.plaintext, "hi");

        let p2 = bob.send(&"hello").expect("send");
        let got: ReceivedMessage<String> = alice.read(&p2).expect("read");
        assert_eq!(got.plaintext, "hello");
        assert!(!alice.init_pending(), "reply consumed the pending init");

        let p3 = alice.send(&"again").expect("send");
        assert!(p3.init().is_none());
    }

    #[test]
    fn snapshot_restore_is_equivalent() {
        let (mut alice, mut bob) = session_pair();

        let p1 = alice.send(&"before snapshot").expect("send");
        let _: ReceivedMessage<String> = bob.read(&p1).expect("read");

        let saved = bob.snapshot();
        let mut restored = Session::restore(SystemEnv::new(), &saved);

        // Both the original and the restored copy must read the next message.
        let p2 = alice.send(&"after snapshot").expect("send");
        let from_live: ReceivedMessage<String> = bob.read(&p2).expect("live read");
        let from_restored: ReceivedMessage<String> = restored.read(&p2).expect("restored read");

        assert_eq!(from_live.plaintext, "after snapshot");
        assert_eq!(from_restored.plaintext, "after snapshot");
    }

    #[test]
    fn snapshot_does_not_alias_live_state() {
        let (mut alice, mut bob) = session_pair();

        let saved = bob.snapshot();
        let p1 = alice.send(&"advance the live session").expect("send");
        let _: ReceivedMessage<String> = bob.read(&p1).expect("read");

        // The snapshot still reflects the pre-read state.
        let mut restored = Session::restore(SystemEnv::new(), &saved);
        let got: ReceivedMessage<String> = restored.read(&p1).expect("restored read");
        assert_eq!(got.plaintext, "advance the live session");
    }

    #[test]
    fn snapshot_serde_round_trip() {
        let (_, bob) = session_pair();
        let saved = bob.snapshot();

        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&saved, &mut bytes).expect("encode");
        let decoded: SessionSnapshot = ciborium::de::from_reader(&bytes[..]).expect("decode");

        assert_eq!(decoded.peer, saved.peer);
        assert_eq!(decoded.ratchet.root_key, saved.ratchet.root_key);
    }

    #[test]
    fn snapshot_debug_redacts_keys() {
        let (_, bob) = session_pair();
        let rendered = format!("{:?}", bob.snapshot());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("root_key"));
    }
}
