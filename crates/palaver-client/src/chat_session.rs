//! Chat session orchestrator.
//!
//! `ChatSession` composes the core machines behind one `tokio::sync::Mutex`
//! (single-writer discipline) and exposes the session contract the
//! presentation layer consumes. Transport operations run as spawned tasks;
//! their completions re-acquire the lock and are applied in arrival order,
//! each guarded by the session epoch captured at launch. Rendered order is
//! always `client_seq` order, so completion races never reorder the
//! timeline.
//!
//! ## Change notification
//!
//! Subscribers receive an immutable [`SessionSnapshot`] on every observable
//! change, published while the writer lock is held so snapshots arrive in
//! mutation order. Listeners must be fast and must not call back into the
//! session.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError, Weak},
    time::Duration,
};

use palaver_core::{
    DeliveryCoordinator, Environment, Identity, Message, MessageId, MessageLedger,
    PresenceSignal, SessionEpoch, SessionStore, Transport, TypingState, UserId,
    presence::DEFAULT_TYPING_WINDOW,
};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::error::SessionError;

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet window before the typing indicator self-expires.
    pub typing_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { typing_window: DEFAULT_TYPING_WINDOW }
    }
}

/// Immutable view of the session handed to subscribers on every change.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// The authenticated identity, if any.
    pub identity: Option<Identity>,
    /// The timeline in `client_seq` order, deleted messages excluded.
    pub messages: Vec<Message>,
    /// Current typing-indicator state.
    pub presence: TypingState,
}

type Listener = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: HashMap<u64, Listener>,
}

/// Handle for one [`ChatSession::on_change`] registration.
///
/// The listener stays registered until `unsubscribe` is called; dropping the
/// handle without unsubscribing leaves the listener active for the life of
/// the session.
pub struct Subscription {
    registry: Weak<StdMutex<ListenerRegistry>>,
    id: u64,
}

impl Subscription {
    /// Remove the listener.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap_or_else(PoisonError::into_inner).entries.remove(&self.id);
        }
    }
}

/// Mutable session state. Single writer: every mutation happens under the
/// one lock in [`Shared`].
struct SessionState {
    store: SessionStore,
    ledger: MessageLedger,
    delivery: DeliveryCoordinator,
    presence: PresenceSignal,
    /// Single-slot debounce timer; aborted on every re-trigger and on reset.
    typing_timer: Option<JoinHandle<()>>,
}

struct Shared<T, E> {
    transport: T,
    env: E,
    state: Mutex<SessionState>,
    listeners: Arc<StdMutex<ListenerRegistry>>,
}

impl<T, E> Shared<T, E> {
    /// Publish the current state to subscribers. Called with the writer lock
    /// held so snapshots reach listeners in mutation order.
    fn publish(&self, state: &SessionState) {
        let snapshot = SessionSnapshot {
            identity: state.store.current().cloned(),
            messages: state.ledger.snapshot(),
            presence: state.presence.state(),
        };

        let listeners: Vec<Listener> = {
            let registry = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            registry.entries.values().cloned().collect()
        };

        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// The single public contract between the engine and the presentation layer.
///
/// Cheap to clone; clones share the same session. Requires a tokio runtime:
/// transport completions and the typing debounce run as spawned tasks.
pub struct ChatSession<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for ChatSession<T, E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T, E> ChatSession<T, E>
where
    T: Transport,
    E: Environment,
{
    /// Create a session over the given transport and environment.
    pub fn new(transport: T, env: E, config: SessionConfig) -> Self {
        let state = SessionState {
            store: SessionStore::new(),
            ledger: MessageLedger::new(),
            delivery: DeliveryCoordinator::new(),
            presence: PresenceSignal::new(config.typing_window),
            typing_timer: None,
        };

        Self {
            shared: Arc::new(Shared {
                transport,
                env,
                state: Mutex::new(state),
                listeners: Arc::new(StdMutex::new(ListenerRegistry::default())),
            }),
        }
    }

    /// Authenticate and install the resulting identity.
    ///
    /// A second successful login replaces the identity atomically. If the
    /// session is ended while the handshake is in flight, the late result is
    /// discarded and the call fails with `SessionError::SessionEnded`.
    ///
    /// # Errors
    ///
    /// `SessionError::Auth` on rejection or handshake failure.
    pub async fn login(
        &self,
        username: &str,
        credential: &str,
    ) -> Result<Identity, SessionError> {
        let epoch = self.shared.state.lock().await.store.epoch();

        let identity = self.shared.transport.authenticate(username, credential).await?;

        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;
        if state.store.epoch() != epoch {
            tracing::debug!(username, "discarding stale authentication result");
            return Err(SessionError::SessionEnded);
        }

        state.store.install(identity.clone());
        tracing::info!(user_id = identity.user_id, "session authenticated");
        self.shared.publish(state);
        Ok(identity)
    }

    /// End the session: clear the identity, cancel the typing timer, and
    /// bump the session epoch so in-flight transport completions are
    /// discarded on arrival. The ledger stays readable.
    pub async fn logout(&self) {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        state.store.clear();
        if let Some(timer) = state.typing_timer.take() {
            timer.abort();
        }
        let _ = state.presence.reset();

        tracing::info!("session ended");
        self.shared.publish(state);
    }

    /// The active identity, if any.
    pub async fn current_identity(&self) -> Option<Identity> {
        self.shared.state.lock().await.store.current().cloned()
    }

    /// Send a message.
    ///
    /// Appends the `Pending` message to the ledger (optimistic local echo)
    /// and returns it immediately — the UI renders without waiting for the
    /// server. A background task transmits the message and flips it to
    /// `Confirmed` or `Failed`; transport failure is reported through the
    /// ledger, never through this call, and is only retried when the caller
    /// invokes [`retry_message`](Self::retry_message) explicitly.
    ///
    /// # Errors
    ///
    /// `SessionError::NotAuthenticated` without a logged-in identity;
    /// `SessionError::Ledger` if the local append fails (duplicate id).
    pub async fn send_message(
        &self,
        content: impl Into<String>,
    ) -> Result<Message, SessionError> {
        let content = content.into();
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        let sender =
            state.store.current().cloned().ok_or(SessionError::NotAuthenticated)?;
        let epoch = state.store.epoch();
        let id = MessageId::new(self.shared.env.random_u128());
        let now = self.shared.env.now();

        let message =
            state.delivery.begin_send(&mut state.ledger, &sender, id, content, now)?;

        // Sending is the end of the current typing burst.
        if let Some(timer) = state.typing_timer.take() {
            timer.abort();
        }
        let _ = state.presence.reset();

        self.shared.publish(state);
        drop(guard);

        self.spawn_transmit(epoch, message.clone());
        Ok(message)
    }

    /// Re-attempt transmission of a failed message with its original
    /// content, id, and `client_seq`.
    ///
    /// # Errors
    ///
    /// `SessionError::Delivery(InvalidState)` unless the message is
    /// currently `Failed` (the ledger is not mutated);
    /// `SessionError::NotAuthenticated` after logout — an attempt started
    /// without a session could never settle.
    pub async fn retry_message(&self, id: MessageId) -> Result<(), SessionError> {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        if state.store.current().is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        let epoch = state.store.epoch();

        let message = state.delivery.begin_retry(&mut state.ledger, id)?;

        self.shared.publish(state);
        drop(guard);

        self.spawn_transmit(epoch, message);
        Ok(())
    }

    /// Delete a message.
    ///
    /// Local removal is immediate and idempotent — never blocked by the
    /// network. The remote delete is fire-and-forget: failures are logged
    /// and never surfaced, the local removal stands.
    ///
    /// # Errors
    ///
    /// Infallible today; the `Result` is part of the session contract.
    pub async fn delete_message(&self, id: MessageId) -> Result<(), SessionError> {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        if state.ledger.remove(id) {
            self.shared.publish(state);
        }
        drop(guard);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            if let Err(error) = shared.transport.delete_remote(id).await {
                tracing::warn!(%error, %id, "remote delete failed; local removal stands");
            }
        });

        Ok(())
    }

    /// Record a keystroke for the typing indicator.
    ///
    /// Debounce, not throttle: each call cancels the outstanding expiry
    /// timer and arms a new one for the full quiet window. Only the
    /// `Idle -> Typing` edge publishes a change; refreshes are silent.
    pub async fn notify_typing(&self) {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        let now = self.shared.env.now();
        let (generation, edge) = state.presence.on_input(now);

        if let Some(timer) = state.typing_timer.take() {
            timer.abort();
        }

        let window = state.presence.window();
        let shared = Arc::clone(&self.shared);
        state.typing_timer = Some(tokio::spawn(async move {
            shared.env.sleep(window).await;

            let mut guard = shared.state.lock().await;
            let state = &mut *guard;
            // The abort above can lose the race with an already-sleeping
            // timer; the generation check makes the stale expiry inert.
            if state.presence.on_expiry(generation).is_some() {
                state.typing_timer = None;
                shared.publish(state);
            }
        }));

        if edge.is_some() {
            self.shared.publish(state);
        }
    }

    /// Ingest a message authored by a remote peer.
    ///
    /// The message is sequenced at arrival with the same counter as local
    /// sends (one total order drives rendering) and enters `Confirmed`.
    ///
    /// # Errors
    ///
    /// `SessionError::Ledger` on an id collision.
    pub async fn receive_message(
        &self,
        sender_id: UserId,
        content: impl Into<String>,
    ) -> Result<Message, SessionError> {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        let id = MessageId::new(self.shared.env.random_u128());
        let now = self.shared.env.now();
        let message = state.delivery.accept_remote(
            &mut state.ledger,
            sender_id,
            content.into(),
            id,
            now,
        )?;

        self.shared.publish(state);
        Ok(message)
    }

    /// Current immutable view of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.shared.state.lock().await;
        SessionSnapshot {
            identity: guard.store.current().cloned(),
            messages: guard.ledger.snapshot(),
            presence: guard.presence.state(),
        }
    }

    /// Register a change listener.
    ///
    /// The listener receives a [`SessionSnapshot`] on every observable
    /// change, in mutation order. It runs on whichever task performed the
    /// mutation while the writer lock is held: keep it fast, and never call
    /// back into the session from inside it.
    pub fn on_change(
        &self,
        listener: impl Fn(&SessionSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry =
            self.shared.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.insert(id, Arc::new(listener));

        Subscription { registry: Arc::downgrade(&self.shared.listeners), id }
    }

    /// Launch the transmission task for one attempt. The completion is
    /// applied under the writer lock and discarded if the session epoch
    /// moved (logout raced the send).
    fn spawn_transmit(&self, epoch: SessionEpoch, message: Message) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let outcome = shared.transport.transmit(&message).await;

            let mut guard = shared.state.lock().await;
            let state = &mut *guard;

            if state.store.epoch() != epoch {
                tracing::debug!(id = %message.id, "discarding stale transmit completion");
                return;
            }

            match state.delivery.complete(&mut state.ledger, message.id, outcome) {
                Ok(()) => shared.publish(state),
                Err(error) => {
                    // Deleting a message while its attempt is in flight
                    // lands here; nothing left to update.
                    tracing::debug!(%error, id = %message.id, "transmit completion not applied");
                },
            }
        });
    }
}
