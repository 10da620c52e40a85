//! Fuzz target for wire decoding
//!
//! Arbitrary bytes fed to every deserializable wire type
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - Successful decode followed by encode must round-trip

#![no_main]

use libfuzzer_sys::fuzz_target;
use sable_proto::{Envelope, MessageHeader, PrekeyCard, RatchetMessage, decode, encode};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = decode::<RatchetMessage>(data) {
        let bytes = encode(&message).expect("re-encode of decoded message");
        let again = decode::<RatchetMessage>(&bytes).expect("decode of re-encoded message");
        assert_eq!(message, again);
    }

    let _ = decode::<Envelope>(data);
    let _ = decode::<PrekeyCard>(data);
    let _ = decode::<MessageHeader>(data);
});
