//! Transport collaborator contract.
//!
//! The engine never talks to the network itself: the driver executes these
//! async operations and feeds completions back into the pure machines.
//! Timeout policy belongs to the implementation behind this trait, not to
//! the engine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{AuthError, TransportError},
    message::{Message, MessageId},
    session::Identity,
};

/// Async transport substrate consumed by the engine.
///
/// Implementations are expected to be cheap to share (`&self` methods,
/// internally synchronized); the driver holds one instance per session and
/// calls it from spawned tasks.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Verify a credential and resolve the caller's identity.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidCredential` on rejection, `AuthError::Network` if
    /// the handshake itself could not complete.
    async fn authenticate(
        &self,
        username: &str,
        credential: &str,
    ) -> Result<Identity, AuthError>;

    /// Transmit an outgoing message attempt.
    ///
    /// # Errors
    ///
    /// `TransportError::Network` on transient failure; the engine surfaces
    /// this as a `Failed` ledger state for user-driven retry.
    async fn transmit(&self, message: &Message) -> Result<(), TransportError>;

    /// Ask the server to delete a message. Best-effort: the engine removes
    /// the message locally regardless of this call's outcome.
    ///
    /// # Errors
    ///
    /// `TransportError::Network` on transient failure (logged by the driver,
    /// never surfaced).
    async fn delete_remote(&self, id: MessageId) -> Result<(), TransportError>;
}

/// Delegation so drivers and tests can share one transport instance.
#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn authenticate(
        &self,
        username: &str,
        credential: &str,
    ) -> Result<Identity, AuthError> {
        (**self).authenticate(username, credential).await
    }

    async fn transmit(&self, message: &Message) -> Result<(), TransportError> {
        (**self).transmit(message).await
    }

    async fn delete_remote(&self, id: MessageId) -> Result<(), TransportError> {
        (**self).delete_remote(id).await
    }
}
