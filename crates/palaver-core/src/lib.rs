//! Palaver core
//!
//! Pure state machines for a client-side chat delivery engine. Everything in
//! this crate is runtime-free: components receive time and randomness through
//! the [`Environment`] trait and never perform I/O themselves. The async
//! driver that wires these machines to a real transport lives in
//! `palaver-client`.
//!
//! # Components
//!
//! - [`SessionStore`]: authenticated identity and the session epoch used to
//!   discard stale transport completions
//! - [`MessageLedger`]: ordered, deduplicated record of every message the
//!   client knows about
//! - [`DeliveryCoordinator`]: sequencing and acknowledgment reconciliation
//!   for outgoing messages
//! - [`PresenceSignal`]: debounced, self-expiring typing indicator
//! - [`Transport`]: the async collaborator contract the driver executes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod delivery;
pub mod env;
pub mod error;
pub mod ledger;
pub mod message;
pub mod presence;
pub mod session;
pub mod transport;

pub use delivery::DeliveryCoordinator;
pub use env::Environment;
pub use error::{AuthError, DeliveryError, LedgerError, TransportError};
pub use ledger::MessageLedger;
pub use message::{ClientSeq, Message, MessageId, MessageState, UserId};
pub use presence::{PresenceEdge, PresenceSignal, TimerGeneration, TypingState};
pub use session::{Identity, SessionEpoch, SessionStore};
pub use transport::Transport;
