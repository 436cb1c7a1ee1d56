//! Scripted transport double.
//!
//! Outcomes are scripted per operation (defaulting to success when the
//! script runs dry) and transmissions can be held at the wire and released
//! individually, which turns completion order into a test input.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use palaver_core::{
    AuthError, ClientSeq, Identity, Message, MessageId, Transport, TransportError,
};
use tokio::sync::Notify;

/// One recorded transport invocation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// An authentication handshake.
    Authenticate {
        /// Username presented by the client.
        username: String,
    },
    /// A message transmission attempt.
    Transmit {
        /// Id of the attempted message.
        id: MessageId,
        /// Its sequence number.
        client_seq: ClientSeq,
        /// Its content.
        content: String,
    },
    /// A remote delete request.
    DeleteRemote {
        /// Id of the message to delete.
        id: MessageId,
    },
}

/// Transport double with scripted outcomes and completion gates.
///
/// Share it with the session under test via `Arc` (the engine's `Transport`
/// blanket impl delegates through `Arc`), keep a handle in the test, and
/// script it from there.
///
/// Outcome scripts are consumed in **completion** order: a held transmit
/// takes its outcome when released, not when called.
#[derive(Default)]
pub struct ScriptedTransport {
    auth_outcomes: Mutex<VecDeque<Result<Identity, AuthError>>>,
    transmit_outcomes: Mutex<VecDeque<Result<(), TransportError>>>,
    delete_outcomes: Mutex<VecDeque<Result<(), TransportError>>>,
    calls: Mutex<Vec<TransportCall>>,

    transmits_held: AtomicBool,
    transmit_gates: Mutex<HashMap<MessageId, Arc<Notify>>>,

    auth_held: AtomicBool,
    auth_gate: Arc<Notify>,
}

impl ScriptedTransport {
    /// Create a transport where every operation succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome of the next unscripted authentication.
    pub fn queue_auth(&self, outcome: Result<Identity, AuthError>) {
        lock(&self.auth_outcomes).push_back(outcome);
    }

    /// Script the outcome of the next unscripted transmit completion.
    pub fn queue_transmit(&self, outcome: Result<(), TransportError>) {
        lock(&self.transmit_outcomes).push_back(outcome);
    }

    /// Script the outcome of the next unscripted remote delete.
    pub fn queue_delete(&self, outcome: Result<(), TransportError>) {
        lock(&self.delete_outcomes).push_back(outcome);
    }

    /// Park every subsequent transmit at the wire until its id is released.
    ///
    /// Call before the sends under test begin.
    pub fn hold_transmits(&self) {
        self.transmits_held.store(true, Ordering::SeqCst);
    }

    /// Release one held transmit. Releasing before the transmit reaches the
    /// gate is fine — the permit is stored.
    pub fn release_transmit(&self, id: MessageId) {
        self.gate_for(id).notify_one();
    }

    /// Park the next authentication until [`release_auth`](Self::release_auth).
    pub fn hold_auth(&self) {
        self.auth_held.store(true, Ordering::SeqCst);
    }

    /// Release a held authentication.
    pub fn release_auth(&self) {
        self.auth_held.store(false, Ordering::SeqCst);
        self.auth_gate.notify_one();
    }

    /// Every invocation so far, in call order.
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    /// Number of transmission attempts so far.
    pub fn transmit_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, TransportCall::Transmit { .. }))
            .count()
    }

    fn gate_for(&self, id: MessageId) -> Arc<Notify> {
        Arc::clone(lock(&self.transmit_gates).entry(id).or_default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn authenticate(
        &self,
        username: &str,
        _credential: &str,
    ) -> Result<Identity, AuthError> {
        lock(&self.calls).push(TransportCall::Authenticate { username: username.to_string() });

        if self.auth_held.load(Ordering::SeqCst) {
            self.auth_gate.notified().await;
        }

        lock(&self.auth_outcomes)
            .pop_front()
            .unwrap_or_else(|| Ok(Identity { user_id: 1, display_name: username.to_string() }))
    }

    async fn transmit(&self, message: &Message) -> Result<(), TransportError> {
        lock(&self.calls).push(TransportCall::Transmit {
            id: message.id,
            client_seq: message.client_seq,
            content: message.content.clone(),
        });

        if self.transmits_held.load(Ordering::SeqCst) {
            let gate = self.gate_for(message.id);
            gate.notified().await;
        }

        lock(&self.transmit_outcomes).pop_front().unwrap_or(Ok(()))
    }

    async fn delete_remote(&self, id: MessageId) -> Result<(), TransportError> {
        lock(&self.calls).push(TransportCall::DeleteRemote { id });
        lock(&self.delete_outcomes).pop_front().unwrap_or(Ok(()))
    }
}
