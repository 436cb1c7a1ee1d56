//! Message data model.
//!
//! A [`Message`] is born locally with a client-generated id and a per-session
//! sequence number, then moves through a small lifecycle as the transport
//! acknowledges (or fails) it. Render order is always `client_seq` order —
//! acknowledgment arrival order never reorders the timeline.

use std::time::Instant;

/// Per-session monotone sequence number, the authoritative ordering key.
pub type ClientSeq = u64;

/// Stable user identifier assigned by the authentication backend.
pub type UserId = u64;

/// Locally-generated unique message token.
///
/// Minted from the [`Environment`](crate::env::Environment) at creation time,
/// never waiting on the server, so the optimistic local echo can render
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u128);

impl MessageId {
    /// Wrap a raw 128-bit token.
    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// The raw token value.
    pub fn as_u128(self) -> u128 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Delivery lifecycle of a message.
///
/// `Pending → Confirmed` and `Pending → Failed` each happen at most once per
/// attempt; a `Failed` message may be explicitly retried, which starts a new
/// attempt (back to `Pending`) with the same id and sequence. `Deleted` is
/// terminal and reachable from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageState {
    /// Appended locally, transmission outcome not yet known.
    Pending,
    /// Acknowledged by the server.
    Confirmed,
    /// Transmission failed; recoverable via explicit retry.
    Failed {
        /// Why the transport rejected the attempt.
        reason: String,
    },
    /// Removed from the timeline. Terminal.
    Deleted,
}

impl MessageState {
    /// Short state name for errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed { .. } => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// True for `Deleted`, the only terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

/// A single chat message as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Locally-generated unique token.
    pub id: MessageId,
    /// Per-session ordering key; assigned at creation, never changes.
    pub client_seq: ClientSeq,
    /// Author of the message.
    pub sender_id: UserId,
    /// Plain text content.
    pub content: String,
    /// When the message entered the ledger.
    pub created_at: Instant,
    /// Current delivery state.
    pub state: MessageState,
}

impl Message {
    /// True while the current attempt is awaiting its transport outcome.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, MessageState::Pending)
    }

    /// True once the server has acknowledged the message.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, MessageState::Confirmed)
    }

    /// True if the last attempt failed and the message awaits a retry.
    pub fn is_failed(&self) -> bool {
        matches!(self.state, MessageState::Failed { .. })
    }
}
