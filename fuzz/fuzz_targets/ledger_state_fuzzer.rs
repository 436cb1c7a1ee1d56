//! Fuzz target for [`MessageLedger`] and [`DeliveryCoordinator`]
//!
//! Prevent timeline corruption via invalid state transitions
//!
//! # Strategy
//!
//! - Event sequences: Arbitrary interleavings of sends, completions,
//!   retries, removes, and remote ingestion
//! - Id collisions: Ids drawn from a tiny space so duplicates and replays
//!   against deleted entries actually happen
//! - Completion probing: Acknowledgments for settled, deleted, and unknown
//!   entries
//!
//! # Invariants
//!
//! - Snapshot order is strictly increasing `client_seq`, always
//! - Deleted entries never appear in a snapshot (`Deleted` is terminal)
//! - A duplicate id MUST be rejected and MUST NOT consume a sequence number
//! - Completions only apply to `Pending` entries; settled attempts reject
//! - `remove` is idempotent; removing the unknown is a silent no-op
//! - NEVER panic on any event sequence

#![no_main]

use std::time::Instant;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use palaver_core::{
    DeliveryCoordinator, Identity, LedgerError, MessageId, MessageLedger, TransportError,
};

#[derive(Debug, Clone, Arbitrary)]
enum LedgerEvent {
    Send { id: u8 },
    Confirm { id: u8 },
    Fail { id: u8 },
    Retry { id: u8 },
    Remove { id: u8 },
    AcceptRemote { id: u8, sender: u8 },
}

fn message_id(id: u8) -> MessageId {
    MessageId::new(u128::from(id))
}

fuzz_target!(|events: Vec<LedgerEvent>| {
    let mut ledger = MessageLedger::new();
    let mut coordinator = DeliveryCoordinator::new();
    let sender = Identity { user_id: 42, display_name: "fuzz".to_string() };

    let mut seen_ids: Vec<u8> = Vec::new();
    let mut expected_seq: u64 = 0;

    for event in events {
        match event {
            LedgerEvent::Send { id } => {
                let result = coordinator.begin_send(
                    &mut ledger,
                    &sender,
                    message_id(id),
                    format!("m-{id}"),
                    Instant::now(),
                );

                if seen_ids.contains(&id) {
                    assert!(
                        matches!(result, Err(LedgerError::DuplicateId { .. })),
                        "duplicate id {id} was accepted"
                    );
                } else {
                    let message = result.unwrap_or_else(|e| {
                        panic!("fresh id {id} was rejected: {e}");
                    });
                    assert_eq!(message.client_seq, expected_seq, "sequence gap on send");
                    expected_seq += 1;
                    seen_ids.push(id);
                }
            },

            LedgerEvent::Confirm { id } => {
                let _ = coordinator.complete(&mut ledger, message_id(id), Ok(()));
            },

            LedgerEvent::Fail { id } => {
                let _ = coordinator.complete(
                    &mut ledger,
                    message_id(id),
                    Err(TransportError::Network { reason: "injected".to_string() }),
                );
            },

            LedgerEvent::Retry { id } => {
                let before = ledger.snapshot();
                if coordinator.begin_retry(&mut ledger, message_id(id)).is_err() {
                    assert_eq!(
                        ledger.snapshot(),
                        before,
                        "rejected retry of {id} mutated the ledger"
                    );
                }
            },

            LedgerEvent::Remove { id } => {
                ledger.remove(message_id(id));
                let again = ledger.remove(message_id(id));
                assert!(!again, "second remove of {id} reported a change");
            },

            LedgerEvent::AcceptRemote { id, sender } => {
                let result = coordinator.accept_remote(
                    &mut ledger,
                    u64::from(sender),
                    format!("r-{id}"),
                    message_id(id),
                    Instant::now(),
                );

                if seen_ids.contains(&id) {
                    assert!(matches!(result, Err(LedgerError::DuplicateId { .. })));
                } else if result.is_ok() {
                    expected_seq += 1;
                    seen_ids.push(id);
                }
            },
        }

        // Global oracle after every event.
        let snapshot = ledger.snapshot();
        for window in snapshot.windows(2) {
            assert!(
                window[0].client_seq < window[1].client_seq,
                "snapshot out of order: {} then {}",
                window[0].client_seq,
                window[1].client_seq
            );
        }
        assert!(snapshot.iter().all(|m| !m.state.is_terminal()));
        assert_eq!(snapshot.len(), ledger.len());
    }
});
