//! Production Environment implementation using system time and RNG.

use std::time::Duration;

use palaver_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// This implementation:
/// - Uses `std::time::Instant::now()` for time
/// - Uses `tokio::time::sleep()` for async sleeping (which means the typing
///   debounce obeys tokio's paused clock under `#[tokio::test(start_paused)]`)
/// - Uses `getrandom` for message-id entropy
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
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Should never fail on supported platforms. Ids minted from a
            // zeroed buffer collide and get rejected as duplicates, which is
            // still better than a panic in the send path.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
