//! Fuzz target for vault record parsing
//!
//! Hostile five-segment records fed to [`vault_open`]
//!
//! # Strategy
//!
//! - Arbitrary segment bytes: wrong lengths, empty fields, junk signatures
//! - Iteration counts kept small so each execution stays cheap
//!
//! # Invariants
//!
//! - NEVER panic on malformed records
//! - No fuzzer-built signature verifies, so nothing ever opens

#![no_main]

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use libfuzzer_sys::fuzz_target;
use sable_crypto::{VaultOptions, vault_open};

#[derive(Debug, Arbitrary)]
struct VaultInput {
    password: Vec<u8>,
    iterations: u8,
    salt: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    signature: Vec<u8>,
}

fuzz_target!(|input: VaultInput| {
    let record = format!(
        "{}.{}.{}.{}.{}",
        URL_SAFE_NO_PAD.encode(input.iterations.to_string()),
        URL_SAFE_NO_PAD.encode(&input.salt),
        URL_SAFE_NO_PAD.encode(&input.iv),
        URL_SAFE_NO_PAD.encode(&input.ciphertext),
        URL_SAFE_NO_PAD.encode(&input.signature),
    );

    let options = VaultOptions { iterations: u32::from(input.iterations), ..VaultOptions::default() };
    if vault_open(&input.password, &record, &options).is_ok() {
        panic!("unauthenticated record opened");
    }

    // Mangled variant exercises the segment parser itself.
    let mangled = record.replace('.', "");
    let _ = vault_open(&input.password, &mangled, &options);
});
