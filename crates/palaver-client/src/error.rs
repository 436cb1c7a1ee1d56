//! Session-level error types.

use palaver_core::{AuthError, DeliveryError, LedgerError};
use thiserror::Error;

/// Errors from [`ChatSession`](crate::ChatSession) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The operation requires an authenticated identity.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The session ended while the operation was in flight; its result was
    /// discarded.
    #[error("session ended")]
    SessionEnded,

    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Delivery coordination rejected the operation.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// A ledger mutation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SessionError {
    /// Returns true if this error is fatal (a programming-contract
    /// violation).
    ///
    /// Fatal errors indicate a bug in the caller: retrying the same call
    /// cannot succeed. Transient errors resolve through user action —
    /// re-entering a credential, logging back in, or retrying a failed
    /// message.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Transient: the user acts and tries again.
            Self::NotAuthenticated | Self::SessionEnded | Self::Auth(_) => false,

            // Fatal: contract violations.
            Self::Delivery(_) | Self::Ledger(_) => true,
        }
    }
}
