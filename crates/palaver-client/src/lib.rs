//! Palaver client
//!
//! Async driver for the Palaver chat engine. The pure state machines from
//! `palaver-core` are composed behind a single [`ChatSession`] that the
//! presentation layer talks to:
//!
//! ```text
//! palaver-client
//!   ├─ ChatSession        (orchestrator: single-writer lock + spawned I/O)
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ SessionStore       (identity + session epoch)
//!   ├─ DeliveryCoordinator (sequencing + acknowledgment reconciliation)
//!   ├─ MessageLedger      (ordered message record)
//!   └─ PresenceSignal     (typing debounce)
//! ```
//!
//! All mutations are serialized through one lock; transport calls run as
//! concurrent tasks whose completions are applied in arrival order, guarded
//! by the session epoch. Rendered order is always `client_seq` order, so
//! completion races never reorder the timeline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chat_session;
mod error;
mod system_env;

pub use chat_session::{ChatSession, SessionConfig, SessionSnapshot, Subscription};
pub use error::SessionError;
pub use palaver_core::{
    AuthError, DeliveryError, Environment, Identity, LedgerError, Message, MessageId,
    MessageState, Transport, TransportError, TypingState, UserId,
};
pub use system_env::SystemEnv;
