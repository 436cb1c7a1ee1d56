//! Core error types.
//!
//! The taxonomy separates transient failures (network rejections, bad
//! credentials — the user acts and tries again) from programming-contract
//! violations (duplicate ids, impossible state transitions — fatal to the
//! call, never retried).

use thiserror::Error;

use crate::message::MessageId;

/// Errors from ledger mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A message with this id is already present (deleted ids stay reserved).
    #[error("duplicate message id: {id}")]
    DuplicateId {
        /// The colliding id.
        id: MessageId,
    },

    /// No live entry with this id.
    #[error("unknown message: {id}")]
    UnknownMessage {
        /// The id that was not found (or already deleted).
        id: MessageId,
    },

    /// The requested transition is not legal from the entry's current state.
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// The entry being mutated.
        id: MessageId,
        /// State the entry is currently in.
        from: &'static str,
        /// State the caller asked for.
        to: &'static str,
    },
}

/// Errors from delivery coordination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Retry requested for a message that is not currently `Failed`.
    #[error("invalid state for {id}: expected failed, found {state}")]
    InvalidState {
        /// The message the caller tried to retry.
        id: MessageId,
        /// Its actual state.
        state: &'static str,
    },

    /// The underlying ledger mutation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors from the authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The backend rejected the credential. Terminal for this attempt; the
    /// user must retry explicitly.
    #[error("invalid credential")]
    InvalidCredential,

    /// The handshake itself could not complete.
    #[error("authentication transport failure: {reason}")]
    Network {
        /// Description of the transport failure.
        reason: String,
    },
}

/// Errors from transport operations after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Transient network failure. Surfaced as a `Failed` message state and
    /// recoverable via explicit retry; the core never retries on its own.
    #[error("network failure: {reason}")]
    Network {
        /// Description of the network failure.
        reason: String,
    },
}
