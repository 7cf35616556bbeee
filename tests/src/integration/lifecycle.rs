//! # Connection Lifecycle Scenarios

use super::support::{RawPeer, TestNode, WAIT};
use ag_crypto::{
    AgreementKeyPair, EncryptedPayload, IdentityKeyPair, SessionCipher, StaticKeyCipher,
};
use ag_node::envelope::{Envelope, HandshakeRecord, MessageRecord};
use ag_node::handshake::{verify_handshake, LocalIdentity};
use ag_node::{ErrorKind, Node, NodeConfig, NodeError, NodeEvent};
use std::time::Duration;

fn raw_identity() -> LocalIdentity {
    LocalIdentity::new(
        IdentityKeyPair::generate().unwrap(),
        AgreementKeyPair::generate(),
    )
}

fn handshake_frame(identity: &LocalIdentity) -> serde_json::Value {
    serde_json::to_value(Envelope::Handshake(identity.handshake(None))).unwrap()
}

/// Open a raw connection, handshake as `identity` and wait for the reply.
async fn handshake_as(node: &TestNode, identity: &LocalIdentity) -> (RawPeer, StaticKeyCipher) {
    let mut raw = RawPeer::connect(node.tcp()).await;
    raw.send_json(&handshake_frame(identity)).await;

    let reply: HandshakeRecord =
        serde_json::from_value(raw.recv_type("HANDSHAKE").await).unwrap();
    let verified = verify_handshake(&reply).unwrap();
    let secret = identity.agreement().agree(&verified.agreement_key);
    (raw, StaticKeyCipher::from_shared_secret(&secret))
}

#[tokio::test]
async fn test_remote_close_removes_active_peer() {
    let mut b = TestNode::spawn().await;
    let identity = raw_identity();

    let mut raw = RawPeer::connect(b.tcp()).await;
    raw.send_json(&handshake_frame(&identity)).await;
    b.expect_connected(identity.node_id()).await;
    assert_eq!(b.node.active_peers().await.unwrap(), vec![identity.node_id()]);

    drop(raw);
    b.expect_disconnected(identity.node_id()).await;

    assert!(b.node.active_peers().await.unwrap().is_empty());
    assert_eq!(
        b.node.send_message(identity.node_id(), "anyone there?").await,
        Err(NodeError::NotConnected(identity.node_id()))
    );
    // The routing table keeps the peer; only the live connection is gone.
    assert_eq!(b.node.routing_table().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reconnect_replaces_connection() {
    let mut a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;

    a.node.connect(b.tcp()).await.unwrap();
    a.expect_connected(b.id()).await;
    assert!(a.node.disconnect(b.id()).await.unwrap());
    b.expect_disconnected(a.id()).await;

    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;
    a.expect_connected(b.id()).await;

    a.node.send_message(b.id(), "again").await.unwrap();
    b.expect_event(|e| matches!(e, NodeEvent::MessageReceived { content, .. } if content == "again"))
        .await;
}

#[tokio::test]
async fn test_pending_request_fails_when_connection_closes() {
    let a = TestNode::spawn().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Read the first frames, then hang up without answering.
    tokio::spawn(async move {
        use tokio::io::AsyncReadExt;
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    });

    let result = tokio::time::timeout(WAIT, a.node.join(addr)).await.unwrap();
    assert_eq!(result, Err(NodeError::ConnectionClosed));
}

#[tokio::test]
async fn test_shutdown_closes_peers() {
    let a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;

    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;

    a.node.shutdown().await.unwrap();
    b.expect_disconnected(a.id()).await;
    assert_eq!(a.node.ping(b.id()).await, Err(NodeError::Shutdown));
}

#[tokio::test]
async fn test_dropping_all_handles_stops_node() {
    let node = Node::new(NodeConfig::for_testing()).unwrap();
    let mut events = node.subscribe();
    node.listen(0).await.unwrap();

    drop(node);
    let closed = tokio::time::timeout(WAIT, events.recv()).await.unwrap();
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_identity_switch_closes_connection() {
    let mut b = TestNode::spawn().await;
    let x = raw_identity();
    let y = raw_identity();

    let (mut raw, _) = handshake_as(&b, &x).await;
    b.expect_connected(x.node_id()).await;

    raw.send_json(&handshake_frame(&y)).await;
    b.expect_event(|e| {
        matches!(e, NodeEvent::Error { kind: ErrorKind::Handshake, .. })
    })
    .await;
    b.expect_disconnected(x.node_id()).await;

    assert!(b.node.active_peers().await.unwrap().is_empty());
    assert!(!b.node.has_session(y.node_id()).await.unwrap());
    assert_eq!(
        b.node.send_message(x.node_id(), "still there?").await,
        Err(NodeError::NotConnected(x.node_id()))
    );
}

#[tokio::test]
async fn test_closing_newer_connection_keeps_older_route() {
    let mut b = TestNode::spawn().await;
    let x = raw_identity();

    let (mut first, cipher) = handshake_as(&b, &x).await;
    let (second, _) = handshake_as(&b, &x).await;

    drop(second);
    b.expect_quiet(Duration::from_millis(300), |e| {
        matches!(e, NodeEvent::PeerDisconnected { .. })
    })
    .await;
    assert_eq!(b.node.active_peers().await.unwrap(), vec![x.node_id()]);

    b.node.send_message(x.node_id(), "via the first socket").await.unwrap();
    let record: MessageRecord =
        serde_json::from_value(first.recv_type("MESSAGE").await).unwrap();
    let payload = EncryptedPayload::try_from(&record.payload).unwrap();
    assert_eq!(cipher.decrypt(&payload).unwrap(), b"via the first socket");

    drop(first);
    b.expect_disconnected(x.node_id()).await;
}

#[tokio::test]
async fn test_local_disconnect_closes_every_connection_to_peer() {
    let mut b = TestNode::spawn().await;
    let x = raw_identity();

    let (_first, _) = handshake_as(&b, &x).await;
    let (_second, _) = handshake_as(&b, &x).await;

    assert!(b.node.disconnect(x.node_id()).await.unwrap());
    b.expect_disconnected(x.node_id()).await;
    assert!(b.node.active_peers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_peer_that_stops_reading_is_disconnected() {
    let mut config = NodeConfig::for_testing();
    config.transport.outbound_queue_len = 2;
    let mut b = TestNode::with_config(config).await;
    let x = raw_identity();

    // Keep the socket open but never read from it again.
    let (_stalled, _) = handshake_as(&b, &x).await;
    b.expect_connected(x.node_id()).await;

    let text = "z".repeat(256 * 1024);
    let mut outcome = Ok(());
    for _ in 0..512 {
        outcome = b.node.send_message(x.node_id(), &text).await;
        if outcome.is_err() {
            break;
        }
    }
    assert_eq!(outcome, Err(NodeError::OutboundQueueFull));

    b.expect_disconnected(x.node_id()).await;
    assert!(b.node.active_peers().await.unwrap().is_empty());
}
