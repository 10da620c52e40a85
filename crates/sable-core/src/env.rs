//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the session core from the system RNG.
//! Every ephemeral key pair and AEAD nonce flows through it, so tests can
//! seed the randomness and replay a session byte-for-byte while production
//! code uses OS entropy without any change to the protocol logic.
//!
//! Time and sleeping are deliberately absent: no operation in this layer is
//! time-dependent, and callers own timeouts around suspending calls.

/// Abstract source of cryptographic randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// 1. RNG quality: `random_bytes()` uses cryptographically secure entropy in
///    production
/// 2. Determinism in tests: given the same seed, a test implementation
///    produces the same sequence
/// 3. Isolation: implementations must not share global mutable state
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a fixed-size random array.
    ///
    /// Convenience for key seeds (32 bytes) and AEAD nonces (24 bytes).
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Production environment using OS cryptographic randomness.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // NOTE: This should never fail on supported platforms; if it
            // does it's a critical error. Zero-fill rather than panic so the
            // resulting keys fail loudly downstream instead of aborting.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];
        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_random_array_fills() {
        let env = SystemEnv::new();
        let bytes: [u8; 64] = env.random_array();

        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 32, "Most bytes should be non-zero");
    }
}
