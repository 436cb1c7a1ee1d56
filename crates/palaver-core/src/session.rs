//! Session identity and lifecycle state.
//!
//! The `SessionStore` owns the authenticated identity and the session epoch.
//! The epoch is the stale-result guard: every spawned transport task captures
//! it at launch, and a completion whose epoch no longer matches the store's
//! is discarded — a late acknowledgment from before a logout can never
//! mutate the ledger of the session that follows it.

use crate::message::UserId;

/// Authenticated user identity.
///
/// Created on successful authentication, owned exclusively by
/// [`SessionStore`], destroyed on logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier assigned by the backend.
    pub user_id: UserId,
    /// Human-readable name for rendering.
    pub display_name: String,
}

/// Token identifying one authenticated session span.
///
/// Bumped on every [`SessionStore::clear`]; completions carrying an old
/// epoch are stale and must be discarded.
pub type SessionEpoch = u64;

/// Holds the authenticated identity and connection lifecycle state.
#[derive(Debug, Default)]
pub struct SessionStore {
    identity: Option<Identity>,
    epoch: SessionEpoch,
}

impl SessionStore {
    /// Create a store with no identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an authenticated identity.
    ///
    /// At most one identity is active at a time: a second install replaces
    /// the previous one in a single mutation, so the orchestrator never
    /// observes a transient empty window.
    pub fn install(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// The active identity, if any. Pure read, never blocks.
    pub fn current(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// End the session: clear the identity and bump the epoch so in-flight
    /// transport completions from this session are discarded on arrival.
    pub fn clear(&mut self) {
        self.identity = None;
        self.epoch += 1;
    }

    /// The current session epoch.
    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }
}
