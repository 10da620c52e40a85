//! Session protocol engine.
//!
//! Everything that turns the primitives in `sable-crypto` and the wire types
//! in `sable-proto` into a working secure channel: the triple-DH handshake,
//! the double ratchet with out-of-order tolerance, sealed-sender envelopes,
//! and the [`Identity`]/[`Session`] surface applications actually call.
//!
//! State mutation is all-or-nothing. Every operation that can fail stages
//! its work on a copy and commits only on success, so a rejected message
//! never corrupts a session.
//!
//! Randomness enters through the [`Environment`] seam; production code uses
//! [`SystemEnv`], tests substitute deterministic sources.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod ratchet;
pub mod session;

pub use env::{Environment, SystemEnv};
pub use envelope::OpenedEnvelope;
pub use error::SessionError;
pub use handshake::SessionSeed;
pub use identity::{Identity, IdentitySnapshot, OneTimeKey, OpenedMessage, PrekeyIssue};
pub use ratchet::{DEFAULT_MAX_SKIP, RatchetState};
pub use session::{ReceivedMessage, Session, SessionSnapshot};
