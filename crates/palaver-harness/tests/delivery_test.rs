//! Integration tests for message delivery under completion races.
//!
//! These tests verify the engine's ordering and reconciliation guarantees
//! with transport completions forced into adversarial orders:
//! - Acknowledgments arriving out of send order
//! - Transmission failure and explicit retry
//! - Deletes that outrun in-flight sends
//! - Completions arriving after logout (stale-epoch discard)
//!
//! Every scenario ends with an oracle over the session snapshot: rendered
//! order must equal `client_seq` order no matter what the wire did.

use std::{sync::Arc, time::Duration};

use palaver_client::{
    ChatSession, DeliveryError, Message, SessionConfig, SessionError, SystemEnv, TransportError,
};
use palaver_harness::{ScriptedTransport, TransportCall};

fn session_over(
    transport: &Arc<ScriptedTransport>,
) -> ChatSession<Arc<ScriptedTransport>, SystemEnv> {
    ChatSession::new(Arc::clone(transport), SystemEnv::new(), SessionConfig::default())
}

/// Let spawned completion tasks run; the paused clock advances instantly.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

/// Oracle: snapshot order is strictly increasing `client_seq`.
fn assert_seq_ordered(messages: &[Message]) {
    for window in messages.windows(2) {
        assert!(
            window[0].client_seq < window[1].client_seq,
            "snapshot out of order: {} before {}",
            window[0].client_seq,
            window[1].client_seq
        );
    }
}

#[tokio::test(start_paused = true)]
async fn send_returns_after_local_append_not_confirmation() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    transport.hold_transmits();

    // The call returns while the transmit is still parked at the wire.
    let message = session.send_message("hi").await.expect("send");
    assert!(message.is_pending());

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.messages.len(), 1);
    assert!(snapshot.messages[0].is_pending());

    transport.release_transmit(message.id);
    settle().await;

    let snapshot = session.snapshot().await;
    assert!(snapshot.messages[0].is_confirmed());
}

#[tokio::test(start_paused = true)]
async fn snapshot_order_follows_client_seq_not_completion_order() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    transport.hold_transmits();
    let a = session.send_message("a").await.expect("send a");
    let b = session.send_message("b").await.expect("send b");

    // "b" completes first.
    transport.release_transmit(b.id);
    settle().await;

    let snapshot = session.snapshot().await;
    assert_seq_ordered(&snapshot.messages);
    assert_eq!(snapshot.messages[0].content, "a");
    assert!(snapshot.messages[0].is_pending());
    assert_eq!(snapshot.messages[1].content, "b");
    assert!(snapshot.messages[1].is_confirmed());

    transport.release_transmit(a.id);
    settle().await;

    let snapshot = session.snapshot().await;
    assert_seq_ordered(&snapshot.messages);
    assert_eq!(snapshot.messages[0].content, "a");
    assert!(snapshot.messages[0].is_confirmed());
    assert!(snapshot.messages[1].is_confirmed());
}

#[tokio::test(start_paused = true)]
async fn failed_send_then_retry_confirms_with_same_identity() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    transport.queue_transmit(Err(TransportError::Network {
        reason: "connection reset".to_string(),
    }));

    let sent = session.send_message("hi").await.expect("send");
    settle().await;

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.messages.len(), 1);
    assert!(snapshot.messages[0].is_failed());

    // Transport has recovered; the user retries.
    session.retry_message(sent.id).await.expect("retry");
    settle().await;

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.messages.len(), 1);
    assert!(snapshot.messages[0].is_confirmed());
    assert_eq!(snapshot.messages[0].id, sent.id);
    assert_eq!(snapshot.messages[0].client_seq, sent.client_seq);

    // Two attempts reached the wire, both carrying the original content.
    assert_eq!(transport.transmit_count(), 2);
    let transmits: Vec<_> = transport
        .calls()
        .into_iter()
        .filter(|c| matches!(c, TransportCall::Transmit { .. }))
        .collect();
    for call in transmits {
        let TransportCall::Transmit { id, client_seq, content } = call else {
            unreachable!();
        };
        assert_eq!(id, sent.id);
        assert_eq!(client_seq, sent.client_seq);
        assert_eq!(content, "hi");
    }
}

#[tokio::test(start_paused = true)]
async fn retry_on_non_failed_message_is_invalid_state() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    let sent = session.send_message("hi").await.expect("send");
    settle().await;

    let before = session.snapshot().await.messages;

    let result = session.retry_message(sent.id).await;
    assert!(matches!(
        result,
        Err(SessionError::Delivery(DeliveryError::InvalidState { .. }))
    ));

    // The failed retry mutated nothing.
    assert_eq!(session.snapshot().await.messages, before);
    assert_eq!(transport.transmit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn delete_is_idempotent_and_never_blocked_by_network() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    // The remote delete will fail; the local removal must stand anyway.
    transport.queue_delete(Err(TransportError::Network { reason: "offline".to_string() }));

    let sent = session.send_message("hi").await.expect("send");
    settle().await;

    session.delete_message(sent.id).await.expect("delete");
    assert!(session.snapshot().await.messages.is_empty());

    // Second delete of the same id is a silent no-op.
    session.delete_message(sent.id).await.expect("redelete");
    assert!(session.snapshot().await.messages.is_empty());

    settle().await;
    assert!(
        transport.calls().iter().any(|c| matches!(c, TransportCall::DeleteRemote { .. })),
        "remote delete was never attempted"
    );
}

#[tokio::test(start_paused = true)]
async fn delete_during_inflight_send_wins_over_late_acknowledgment() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    transport.hold_transmits();
    let sent = session.send_message("hi").await.expect("send");

    session.delete_message(sent.id).await.expect("delete");
    assert!(session.snapshot().await.messages.is_empty());

    // The acknowledgment lands after the delete; it must not resurrect.
    transport.release_transmit(sent.id);
    settle().await;

    assert!(session.snapshot().await.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn logout_discards_inflight_completion() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    transport.hold_transmits();
    let sent = session.send_message("hi").await.expect("send");

    session.logout().await;

    // The completion arrives after the session ended: stale epoch, discarded.
    transport.release_transmit(sent.id);
    settle().await;

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.messages.len(), 1);
    assert!(
        snapshot.messages[0].is_pending(),
        "stale completion mutated the ledger: {:?}",
        snapshot.messages[0].state
    );
}

#[tokio::test(start_paused = true)]
async fn remote_messages_interleave_in_one_total_order() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_over(&transport);
    session.login("ada", "pw").await.expect("login");

    session.send_message("a").await.expect("send a");
    let remote = session.receive_message(99, "from-peer").await.expect("receive");
    session.send_message("c").await.expect("send c");
    settle().await;

    let snapshot = session.snapshot().await;
    let seqs: Vec<_> = snapshot.messages.iter().map(|m| m.client_seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    assert_seq_ordered(&snapshot.messages);

    assert_eq!(snapshot.messages[1].id, remote.id);
    assert_eq!(snapshot.messages[1].sender_id, 99);
    assert!(snapshot.messages[1].is_confirmed(), "remote messages arrive already confirmed");
}
