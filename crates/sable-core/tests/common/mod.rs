//! Shared test fixtures.

use std::sync::{Arc, Mutex};

use sable_core::Environment;

/// Deterministic randomness source. Same seed, same byte stream, so every
/// test failure reproduces exactly.
#[derive(Clone)]
pub struct SeededEnv {
    state: Arc<Mutex<u64>>,
}

impl SeededEnv {
    pub fn new(seed: u64) -> Self {
        Self { state: Arc::new(Mutex::new(seed | 1)) }
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for byte in buffer.iter_mut() {
            // xorshift64
            *state ^= *state << 13;
            *state ^= *state >> 7;
            *state ^= *state << 17;
            *byte = (*state >> 32) as u8;
        }
    }
}
