//! Message ledger.
//!
//! Ordered, deduplicated record of every message the client knows about.
//! Entries are keyed by `client_seq`, so iteration order is creation order no
//! matter when (or whether) the transport acknowledges each message.
//!
//! ## Transition discipline
//!
//! Acknowledgments only apply to `Pending` entries. An acknowledgment for an
//! entry that has already settled fails with `InvalidTransition` instead of
//! silently reapplying — the caller decides whether that is a race worth
//! logging (e.g. a delete beat the confirmation) or a bug.

use std::collections::{BTreeMap, HashMap};

use crate::{
    error::LedgerError,
    message::{ClientSeq, Message, MessageId, MessageState},
};

/// Ordered, deduplicated message record.
///
/// Exclusively owns every [`Message`]; collaborators mutate entries through
/// id-based operations and observe them through [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct MessageLedger {
    /// Entries in `client_seq` order.
    entries: BTreeMap<ClientSeq, Message>,
    /// Id lookup. Deleted ids stay in this index so a replayed append is
    /// rejected as a duplicate rather than resurrecting the message.
    by_id: HashMap<MessageId, ClientSeq>,
}

impl MessageLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, preserving `client_seq` ordering.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateId` if the id is already present,
    /// including ids of deleted messages.
    pub fn append(&mut self, message: Message) -> Result<(), LedgerError> {
        if self.by_id.contains_key(&message.id) {
            return Err(LedgerError::DuplicateId { id: message.id });
        }

        self.by_id.insert(message.id, message.client_seq);
        self.entries.insert(message.client_seq, message);
        Ok(())
    }

    /// Look up a live or settled entry by id. Deleted entries are invisible.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.entry(id).filter(|m| !m.state.is_terminal())
    }

    /// Mark the current attempt acknowledged by the server.
    ///
    /// # Errors
    ///
    /// `UnknownMessage` if the id is absent or already deleted;
    /// `InvalidTransition` if the attempt has already settled.
    pub fn mark_confirmed(&mut self, id: MessageId) -> Result<(), LedgerError> {
        self.transition(id, MessageState::Confirmed)
    }

    /// Mark the current attempt failed with the transport's reason.
    ///
    /// # Errors
    ///
    /// `UnknownMessage` if the id is absent or already deleted;
    /// `InvalidTransition` if the attempt has already settled.
    pub fn mark_failed(&mut self, id: MessageId, reason: String) -> Result<(), LedgerError> {
        self.transition(id, MessageState::Failed { reason })
    }

    /// Begin a new attempt for a failed message, flipping it back to
    /// `Pending` and returning a copy for transmission (same id, same
    /// `client_seq`, original content).
    ///
    /// # Errors
    ///
    /// `UnknownMessage` if the id is absent or already deleted;
    /// `InvalidTransition` unless the entry is currently `Failed`.
    pub fn mark_retrying(&mut self, id: MessageId) -> Result<Message, LedgerError> {
        let entry = self.entry_mut(id)?;
        match entry.state {
            MessageState::Failed { .. } => {
                entry.state = MessageState::Pending;
                Ok(entry.clone())
            },
            ref state => Err(LedgerError::InvalidTransition {
                id,
                from: state.name(),
                to: MessageState::Pending.name(),
            }),
        }
    }

    /// Transition to `Deleted`.
    ///
    /// Idempotent: removing an unknown or already-deleted id is a silent
    /// no-op (at-least-once delete contract). Returns whether anything
    /// observable changed.
    pub fn remove(&mut self, id: MessageId) -> bool {
        let Some(seq) = self.by_id.get(&id).copied() else {
            return false;
        };
        let Some(entry) = self.entries.get_mut(&seq) else {
            return false;
        };
        if entry.state.is_terminal() {
            return false;
        }

        entry.state = MessageState::Deleted;
        true
    }

    /// Ordered view of the timeline at call time: `client_seq` ascending,
    /// excluding deleted entries. Not a live view.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.values().filter(|m| !m.state.is_terminal()).cloned().collect()
    }

    /// Number of live (non-deleted) entries.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|m| !m.state.is_terminal()).count()
    }

    /// True if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: MessageId) -> Option<&Message> {
        self.by_id.get(&id).and_then(|seq| self.entries.get(seq))
    }

    fn entry_mut(&mut self, id: MessageId) -> Result<&mut Message, LedgerError> {
        let seq = *self.by_id.get(&id).ok_or(LedgerError::UnknownMessage { id })?;
        let entry = self.entries.get_mut(&seq).ok_or(LedgerError::UnknownMessage { id })?;
        if entry.state.is_terminal() {
            return Err(LedgerError::UnknownMessage { id });
        }
        Ok(entry)
    }

    fn transition(&mut self, id: MessageId, to: MessageState) -> Result<(), LedgerError> {
        let entry = self.entry_mut(id)?;
        match entry.state {
            MessageState::Pending => {
                entry.state = to;
                Ok(())
            },
            ref state => {
                Err(LedgerError::InvalidTransition { id, from: state.name(), to: to.name() })
            },
        }
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod props {
    use std::time::Instant;

    use proptest::prelude::*;

    use super::*;

    /// Operations proptest drives against the ledger. Ids are drawn from a
    /// small space so collisions and replays actually happen.
    #[derive(Debug, Clone)]
    enum Op {
        Append { id: u8 },
        Confirm { id: u8 },
        Fail { id: u8 },
        Retry { id: u8 },
        Remove { id: u8 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(|id| Op::Append { id }),
            any::<u8>().prop_map(|id| Op::Confirm { id }),
            any::<u8>().prop_map(|id| Op::Fail { id }),
            any::<u8>().prop_map(|id| Op::Retry { id }),
            any::<u8>().prop_map(|id| Op::Remove { id }),
        ]
    }

    proptest! {
        /// Snapshot order always equals `client_seq` order, strictly
        /// increasing, with no deleted entries — for any operation sequence.
        #[test]
        fn snapshot_order_is_invariant(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut ledger = MessageLedger::new();
            let mut next_seq: ClientSeq = 0;

            for op in ops {
                match op {
                    Op::Append { id } => {
                        let message = Message {
                            id: MessageId::new(u128::from(id)),
                            client_seq: next_seq,
                            sender_id: 1,
                            content: String::new(),
                            created_at: Instant::now(),
                            state: MessageState::Pending,
                        };
                        if ledger.append(message).is_ok() {
                            next_seq += 1;
                        }
                    },
                    Op::Confirm { id } => {
                        let _ = ledger.mark_confirmed(MessageId::new(u128::from(id)));
                    },
                    Op::Fail { id } => {
                        let _ = ledger.mark_failed(
                            MessageId::new(u128::from(id)),
                            "injected".to_string(),
                        );
                    },
                    Op::Retry { id } => {
                        let _ = ledger.mark_retrying(MessageId::new(u128::from(id)));
                    },
                    Op::Remove { id } => {
                        let _ = ledger.remove(MessageId::new(u128::from(id)));
                    },
                }
            }

            let snapshot = ledger.snapshot();
            for window in snapshot.windows(2) {
                prop_assert!(window[0].client_seq < window[1].client_seq);
            }
            prop_assert!(snapshot.iter().all(|m| !m.state.is_terminal()));
            prop_assert_eq!(snapshot.len(), ledger.len());
        }
    }
}
