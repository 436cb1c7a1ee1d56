//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the delivery engine from system
//! resources (time, randomness, async sleeping). This enables:
//!
//! - Deterministic tests: a paused virtual clock makes debounce windows and
//!   completion races perfectly reproducible.
//!
//! - Production runtime: the tokio implementation in `palaver-client` uses
//!   real system resources without any change to engine logic.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleeping.
///
/// Every time read and every generated message id in the engine goes through
/// this trait, so a test environment controls exactly when typing indicators
/// expire and which ids get minted.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: subsequent calls must return times >= previous calls
    ///   within a single execution context.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait. It backs the typing
    /// debounce timer and should only be called by driver code, never by the
    /// pure state machines.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Production implementations use OS entropy; test implementations may
    /// be deterministic. Message ids are minted from this source, so a test
    /// environment can make ids predictable (or deliberately collide them).
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Used for message ids.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}
