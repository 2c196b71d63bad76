//! Link manager integration tests
//!
//! End-to-end exercises of the connection-role state machine over the
//! in-process transport: inbound and outbound establishment, failure
//! recovery, teardown, and the event stream contract.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use pairchat_core::memory::{MemoryNetwork, MemoryTransport};
use pairchat_core::{
    ConnectionState, LinkConfig, LinkError, LinkEvent, LinkEventReceiver, LinkSocket,
    ServiceProfile, Transport,
};
use pairchat_link::LinkManager;

// ----------------------------------------------------------------------------
// Test Helpers
// ----------------------------------------------------------------------------

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Window in which an event that must NOT arrive gets a chance to show up
const QUIET_WINDOW: Duration = Duration::from_millis(200);

async fn next_event(events: &mut LinkEventReceiver) -> LinkEvent {
    timeout(TEST_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn expect_state(events: &mut LinkEventReceiver, expected: ConnectionState) {
    match next_event(events).await {
        LinkEvent::StateChanged(state) => assert_eq!(state, expected),
        other => panic!("expected StateChanged({expected}), got {other:?}"),
    }
}

async fn expect_quiet(events: &mut LinkEventReceiver) {
    if let Ok(event) = timeout(QUIET_WINDOW, events.recv()).await {
        panic!("expected no event, got {event:?}");
    }
}

fn manager_for(network: &Arc<MemoryNetwork>, address: &str, name: &str) -> (LinkManager, LinkEventReceiver) {
    LinkManager::new(
        Arc::new(network.transport(address, name)),
        LinkConfig::default(),
    )
}

/// Bring up a listening manager on "alice" and connect to it as "bob",
/// returning the established manager-side session and bob's raw socket.
async fn connected_pair(
    network: &Arc<MemoryNetwork>,
) -> (LinkManager, LinkEventReceiver, Arc<dyn LinkSocket>) {
    let (manager, mut events) = manager_for(network, "alice", "Alice");
    manager.start().await.unwrap();
    expect_state(&mut events, ConnectionState::Listening).await;

    let bob: MemoryTransport = network.transport("bob", "Bob");
    let socket = bob
        .connect(&"alice".into(), &ServiceProfile::default())
        .await
        .unwrap();

    match next_event(&mut events).await {
        LinkEvent::PeerNamed { name } => assert_eq!(name, "Bob"),
        other => panic!("expected PeerNamed, got {other:?}"),
    }
    expect_state(&mut events, ConnectionState::Connected).await;
    assert_eq!(manager.current_state(), ConnectionState::Connected);

    (manager, events, socket)
}

// ----------------------------------------------------------------------------
// Establishment
// ----------------------------------------------------------------------------

#[tokio::test]
async fn inbound_connection_promotes_to_session() {
    let network = MemoryNetwork::new();
    let (_manager, _events, _socket) = connected_pair(&network).await;
}

#[tokio::test]
async fn outbound_connection_promotes_to_session() {
    let network = MemoryNetwork::new();

    let (bob, mut bob_events) = manager_for(&network, "bob", "Bob");
    bob.start().await.unwrap();
    expect_state(&mut bob_events, ConnectionState::Listening).await;

    let (alice, mut alice_events) = manager_for(&network, "alice", "Alice");
    alice.connect_to("bob");
    expect_state(&mut alice_events, ConnectionState::Connecting).await;

    match next_event(&mut alice_events).await {
        LinkEvent::PeerNamed { name } => assert_eq!(name, "Bob"),
        other => panic!("expected PeerNamed, got {other:?}"),
    }
    expect_state(&mut alice_events, ConnectionState::Connected).await;

    match next_event(&mut bob_events).await {
        LinkEvent::PeerNamed { name } => assert_eq!(name, "Alice"),
        other => panic!("expected PeerNamed, got {other:?}"),
    }
    expect_state(&mut bob_events, ConnectionState::Connected).await;

    // Bytes flow both ways across the pair of managers.
    alice.send(b"ping".to_vec()).await.unwrap();
    match next_event(&mut bob_events).await {
        LinkEvent::BytesReceived { peer, payload } => {
            assert_eq!(peer.display_name(), "Alice");
            assert_eq!(payload, b"ping");
        }
        other => panic!("expected BytesReceived, got {other:?}"),
    }

    bob.send(b"pong".to_vec()).await.unwrap();
    match next_event(&mut alice_events).await {
        LinkEvent::BytesSent { payload } => assert_eq!(payload, b"ping"),
        other => panic!("expected BytesSent, got {other:?}"),
    }
    match next_event(&mut alice_events).await {
        LinkEvent::BytesReceived { payload, .. } => assert_eq!(payload, b"pong"),
        other => panic!("expected BytesReceived, got {other:?}"),
    }
}

#[tokio::test]
async fn start_is_idempotent_while_listening() {
    let network = MemoryNetwork::new();
    let (manager, mut events) = manager_for(&network, "alice", "Alice");

    manager.start().await.unwrap();
    expect_state(&mut events, ConnectionState::Listening).await;

    manager.start().await.unwrap();
    expect_quiet(&mut events).await;
    assert_eq!(manager.current_state(), ConnectionState::Listening);
}

// ----------------------------------------------------------------------------
// Failure Recovery
// ----------------------------------------------------------------------------

#[tokio::test]
async fn failed_outbound_connect_restarts_listening() {
    let network = MemoryNetwork::new();
    let (manager, mut events) = manager_for(&network, "alice", "Alice");

    manager.connect_to("nobody");
    expect_state(&mut events, ConnectionState::Connecting).await;

    match next_event(&mut events).await {
        LinkEvent::TransientError { message } => assert_eq!(message, "unable to connect device"),
        other => panic!("expected TransientError, got {other:?}"),
    }
    expect_state(&mut events, ConnectionState::Idle).await;
    expect_state(&mut events, ConnectionState::Listening).await;
    assert_eq!(manager.current_state(), ConnectionState::Listening);
}

#[tokio::test]
async fn lost_session_restarts_listening() {
    let network = MemoryNetwork::new();
    let (manager, mut events, socket) = connected_pair(&network).await;

    // The peer drops the link.
    socket.close();

    match next_event(&mut events).await {
        LinkEvent::TransientError { message } => assert_eq!(message, "connection was lost"),
        other => panic!("expected TransientError, got {other:?}"),
    }
    expect_state(&mut events, ConnectionState::Idle).await;
    expect_state(&mut events, ConnectionState::Listening).await;

    // The session is gone; sends are rejected without touching state.
    let err = manager.send(b"late".to_vec()).await.unwrap_err();
    assert!(matches!(err, LinkError::NotConnected));
    assert_eq!(manager.current_state(), ConnectionState::Listening);
}

// ----------------------------------------------------------------------------
// Send Path
// ----------------------------------------------------------------------------

#[tokio::test]
async fn send_while_connected_reports_bytes_sent() {
    let network = MemoryNetwork::new();
    let (manager, mut events, socket) = connected_pair(&network).await;

    manager.send(vec![0x41, 0x42]).await.unwrap();

    match next_event(&mut events).await {
        LinkEvent::BytesSent { payload } => assert_eq!(payload, vec![0x41, 0x42]),
        other => panic!("expected BytesSent, got {other:?}"),
    }

    let mut buf = [0u8; 8];
    let n = timeout(TEST_TIMEOUT, socket.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], &[0x41, 0x42]);

    // Exactly one event and no state change.
    expect_quiet(&mut events).await;
    assert_eq!(manager.current_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn send_while_listening_is_rejected_without_events() {
    let network = MemoryNetwork::new();
    let (manager, mut events) = manager_for(&network, "alice", "Alice");

    manager.start().await.unwrap();
    expect_state(&mut events, ConnectionState::Listening).await;

    let err = manager.send(b"nope".to_vec()).await.unwrap_err();
    assert!(matches!(err, LinkError::NotConnected));
    expect_quiet(&mut events).await;
    assert_eq!(manager.current_state(), ConnectionState::Listening);
}

// ----------------------------------------------------------------------------
// Teardown
// ----------------------------------------------------------------------------

#[tokio::test]
async fn stop_while_connecting_does_not_restart() {
    let network = MemoryNetwork::new();
    network.add_unresponsive("tarpit");

    let (manager, mut events) = manager_for(&network, "alice", "Alice");
    manager.connect_to("tarpit");
    expect_state(&mut events, ConnectionState::Connecting).await;

    manager.stop();
    expect_state(&mut events, ConnectionState::Idle).await;

    // The cancelled initiator's failure report is stale and must not bring
    // the listener back.
    expect_quiet(&mut events).await;
    assert_eq!(manager.current_state(), ConnectionState::Idle);
}

#[tokio::test]
async fn stop_tears_down_session_without_restart() {
    let network = MemoryNetwork::new();
    let (manager, mut events, socket) = connected_pair(&network).await;

    manager.stop();
    expect_state(&mut events, ConnectionState::Idle).await;

    // Both the local teardown and the peer's close land on the same socket;
    // the double close is a no-op and no stale report leaks through.
    socket.close();
    expect_quiet(&mut events).await;
    assert_eq!(manager.current_state(), ConnectionState::Idle);
}

#[tokio::test]
async fn manager_is_usable_again_after_stop() {
    let network = MemoryNetwork::new();
    let (manager, mut events) = manager_for(&network, "alice", "Alice");

    manager.start().await.unwrap();
    expect_state(&mut events, ConnectionState::Listening).await;

    manager.stop();
    expect_state(&mut events, ConnectionState::Idle).await;

    manager.start().await.unwrap();
    expect_state(&mut events, ConnectionState::Listening).await;
}

// ----------------------------------------------------------------------------
// Role Replacement
// ----------------------------------------------------------------------------

#[tokio::test]
async fn newer_connect_replaces_initiator_silently() {
    let network = MemoryNetwork::new();
    network.add_unresponsive("tarpit-1");
    network.add_unresponsive("tarpit-2");

    let (manager, mut events) = manager_for(&network, "alice", "Alice");

    manager.connect_to("tarpit-1");
    expect_state(&mut events, ConnectionState::Connecting).await;

    // Retargeting cancels the first attempt; the state stays `Connecting`
    // and the superseded initiator reports nothing.
    manager.connect_to("tarpit-2");
    expect_quiet(&mut events).await;
    assert_eq!(manager.current_state(), ConnectionState::Connecting);

    manager.stop();
    expect_state(&mut events, ConnectionState::Idle).await;
}
