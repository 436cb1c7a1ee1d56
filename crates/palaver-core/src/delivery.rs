//! Delivery coordination.
//!
//! Turns a user's intent to send into a durable, eventually-acknowledged
//! ledger entry. The coordinator owns the per-session `client_seq` counter
//! (single writer) and reconciles transport completions against the ledger;
//! the async transmission itself is the driver's job.
//!
//! ## Retry policy
//!
//! Transport failure is never retried implicitly. The failed attempt stays
//! visible in the ledger until the caller invokes retry explicitly — this
//! keeps failure observable to the user and rules out duplicate-send storms.

use std::time::Instant;

use crate::{
    error::{DeliveryError, LedgerError, TransportError},
    ledger::MessageLedger,
    message::{Message, MessageId, MessageState, UserId},
    session::Identity,
};

/// Sequencing and acknowledgment reconciliation for one session.
///
/// Never retains message copies beyond the duration of a call; all durable
/// state lives in the [`MessageLedger`].
#[derive(Debug, Default)]
pub struct DeliveryCoordinator {
    /// Next `client_seq` to assign. Consumed only on successful append.
    next_seq: u64,
}

impl DeliveryCoordinator {
    /// Create a coordinator with the sequence counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence and append an outgoing message as the optimistic local echo.
    ///
    /// The returned copy (state `Pending`) is what the driver hands to the
    /// transport. The sequence counter only advances when the append
    /// succeeds, so a rejected duplicate leaves no gap.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateId` if the id is already present; the
    /// ledger is left untouched.
    pub fn begin_send(
        &mut self,
        ledger: &mut MessageLedger,
        sender: &Identity,
        id: MessageId,
        content: String,
        now: Instant,
    ) -> Result<Message, LedgerError> {
        let message = Message {
            id,
            client_seq: self.next_seq,
            sender_id: sender.user_id,
            content,
            created_at: now,
            state: MessageState::Pending,
        };

        ledger.append(message.clone())?;
        self.next_seq += 1;

        tracing::trace!(%id, client_seq = message.client_seq, "message sequenced");
        Ok(message)
    }

    /// Begin a new transmission attempt for a failed message.
    ///
    /// Returns a copy carrying the original content, id, and `client_seq`
    /// for the driver to retransmit.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::InvalidState` unless the message is currently
    /// `Failed`; the ledger is never mutated on failure.
    pub fn begin_retry(
        &self,
        ledger: &mut MessageLedger,
        id: MessageId,
    ) -> Result<Message, DeliveryError> {
        match ledger.get(id) {
            None => Err(DeliveryError::Ledger(LedgerError::UnknownMessage { id })),
            Some(message) if !message.is_failed() => {
                Err(DeliveryError::InvalidState { id, state: message.state.name() })
            },
            Some(_) => Ok(ledger.mark_retrying(id)?),
        }
    }

    /// Apply a transport completion to the ledger: success confirms, a
    /// network failure records the reason for user-driven retry.
    ///
    /// # Errors
    ///
    /// Propagates the ledger's transition errors — `UnknownMessage` when the
    /// entry was deleted while the attempt was in flight, `InvalidTransition`
    /// when the attempt already settled.
    pub fn complete(
        &self,
        ledger: &mut MessageLedger,
        id: MessageId,
        outcome: Result<(), TransportError>,
    ) -> Result<(), LedgerError> {
        match outcome {
            Ok(()) => ledger.mark_confirmed(id),
            Err(TransportError::Network { reason }) => ledger.mark_failed(id, reason),
        }
    }

    /// Ingest a message authored by a remote peer.
    ///
    /// Remote messages are sequenced at arrival time with the same counter
    /// as local sends, so one total order drives rendering. They enter
    /// already `Confirmed` — the server accepted them before relaying.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateId` on an id collision (e.g. a relayed
    /// echo of a message already in the ledger).
    pub fn accept_remote(
        &mut self,
        ledger: &mut MessageLedger,
        sender_id: UserId,
        content: String,
        id: MessageId,
        now: Instant,
    ) -> Result<Message, LedgerError> {
        let message = Message {
            id,
            client_seq: self.next_seq,
            sender_id,
            content,
            created_at: now,
            state: MessageState::Confirmed,
        };

        ledger.append(message.clone())?;
        self.next_seq += 1;
        Ok(message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sender() -> Identity {
        Identity { user_id: 7, display_name: "ada".to_string() }
    }

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn sends_get_monotone_sequence_numbers() {
        let mut coordinator = DeliveryCoordinator::new();
        let mut ledger = MessageLedger::new();

        for i in 0..5u128 {
            let message = coordinator
                .begin_send(&mut ledger, &sender(), MessageId::new(i), format!("m{i}"), now())
                .unwrap();
            assert_eq!(message.client_seq, i as u64);
            assert!(message.is_pending());
        }
    }

    #[test]
    fn rejected_duplicate_does_not_consume_a_sequence() {
        let mut coordinator = DeliveryCoordinator::new();
        let mut ledger = MessageLedger::new();

        coordinator
            .begin_send(&mut ledger, &sender(), MessageId::new(1), "a".to_string(), now())
            .unwrap();

        let result = coordinator.begin_send(
            &mut ledger,
            &sender(),
            MessageId::new(1),
            "b".to_string(),
            now(),
        );
        assert!(matches!(result, Err(LedgerError::DuplicateId { .. })));

        let next = coordinator
            .begin_send(&mut ledger, &sender(), MessageId::new(2), "c".to_string(), now())
            .unwrap();
        assert_eq!(next.client_seq, 1);
    }

    #[test]
    fn completion_confirms_or_fails() {
        let mut coordinator = DeliveryCoordinator::new();
        let mut ledger = MessageLedger::new();
        let id = MessageId::new(1);

        coordinator.begin_send(&mut ledger, &sender(), id, "hi".to_string(), now()).unwrap();
        coordinator
            .complete(
                &mut ledger,
                id,
                Err(TransportError::Network { reason: "connection reset".to_string() }),
            )
            .unwrap();

        let entry = ledger.get(id).unwrap();
        assert_eq!(
            entry.state,
            MessageState::Failed { reason: "connection reset".to_string() }
        );
    }

    #[test]
    fn retry_preserves_id_and_sequence() {
        let mut coordinator = DeliveryCoordinator::new();
        let mut ledger = MessageLedger::new();
        let id = MessageId::new(1);

        let original = coordinator
            .begin_send(&mut ledger, &sender(), id, "hi".to_string(), now())
            .unwrap();
        coordinator
            .complete(&mut ledger, id, Err(TransportError::Network { reason: "down".to_string() }))
            .unwrap();

        let attempt = coordinator.begin_retry(&mut ledger, id).unwrap();
        assert_eq!(attempt.id, original.id);
        assert_eq!(attempt.client_seq, original.client_seq);
        assert_eq!(attempt.content, original.content);

        coordinator.complete(&mut ledger, id, Ok(())).unwrap();
        assert!(ledger.get(id).unwrap().is_confirmed());
    }

    #[test]
    fn retry_on_non_failed_is_invalid_state_and_mutates_nothing() {
        let mut coordinator = DeliveryCoordinator::new();
        let mut ledger = MessageLedger::new();
        let id = MessageId::new(1);

        coordinator.begin_send(&mut ledger, &sender(), id, "hi".to_string(), now()).unwrap();
        let before = ledger.snapshot();

        let result = coordinator.begin_retry(&mut ledger, id);
        assert_eq!(result, Err(DeliveryError::InvalidState { id, state: "pending" }));
        assert_eq!(ledger.snapshot(), before);

        coordinator.complete(&mut ledger, id, Ok(())).unwrap();
        let result = coordinator.begin_retry(&mut ledger, id);
        assert_eq!(result, Err(DeliveryError::InvalidState { id, state: "confirmed" }));
    }

    #[test]
    fn remote_messages_share_the_sequence_space() {
        let mut coordinator = DeliveryCoordinator::new();
        let mut ledger = MessageLedger::new();

        coordinator
            .begin_send(&mut ledger, &sender(), MessageId::new(1), "a".to_string(), now())
            .unwrap();
        let remote = coordinator
            .accept_remote(&mut ledger, 99, "b".to_string(), MessageId::new(2), now())
            .unwrap();
        coordinator
            .begin_send(&mut ledger, &sender(), MessageId::new(3), "c".to_string(), now())
            .unwrap();

        assert_eq!(remote.client_seq, 1);
        assert!(remote.is_confirmed());
        assert_eq!(remote.sender_id, 99);

        let seqs: Vec<_> = ledger.snapshot().iter().map(|m| m.client_seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn completion_for_deleted_message_reports_unknown() {
        let mut coordinator = DeliveryCoordinator::new();
        let mut ledger = MessageLedger::new();
        let id = MessageId::new(1);

        coordinator.begin_send(&mut ledger, &sender(), id, "hi".to_string(), now()).unwrap();
        ledger.remove(id);

        let result = coordinator.complete(&mut ledger, id, Ok(()));
        assert_eq!(result, Err(LedgerError::UnknownMessage { id }));
    }
}
