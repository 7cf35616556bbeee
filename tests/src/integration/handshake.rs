//! # Handshake Scenarios
//!
//! Both handshake modes are pinned here:
//!
//! - `Mutual`: the receiver answers with its own HANDSHAKE, so both sides
//!   hold a session and see `PeerConnected`.
//! - `InitiatorOnly`: only the dialer sends HANDSHAKE. The receiver learns
//!   the dialer; the dialer learns nothing until the receiver dials back.

use super::support::{RawPeer, TestNode, WAIT};
use ag_crypto::{AgreementKeyPair, IdentityKeyPair};
use ag_node::envelope::{Envelope, HandshakeRecord};
use ag_node::handshake::LocalIdentity;
use ag_node::{ErrorKind, HandshakeMode, NodeEvent};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;

#[tokio::test]
async fn test_initiator_only_handshake_is_asymmetric() {
    let mut a = TestNode::with_mode(HandshakeMode::InitiatorOnly).await;
    let mut b = TestNode::with_mode(HandshakeMode::InitiatorOnly).await;

    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;

    // B recorded A under A's advertised listen address.
    let table = b.node.routing_table().await.unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].node_id, a.id());
    assert_eq!(table[0].address, a.tcp());
    assert!(b.node.has_session(a.id()).await.unwrap());

    // A has heard nothing back.
    a.expect_quiet(Duration::from_millis(300), |e| {
        matches!(e, NodeEvent::PeerConnected { .. })
    })
    .await;
    assert!(!a.node.has_session(b.id()).await.unwrap());
    assert!(a.node.routing_table().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_initiator_only_dial_back_completes_both_sessions() {
    let mut a = TestNode::with_mode(HandshakeMode::InitiatorOnly).await;
    let mut b = TestNode::with_mode(HandshakeMode::InitiatorOnly).await;

    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;
    b.node.connect(a.tcp()).await.unwrap();
    a.expect_connected(b.id()).await;

    assert!(a.node.has_session(b.id()).await.unwrap());
    assert!(b.node.has_session(a.id()).await.unwrap());
}

#[tokio::test]
async fn test_mutual_handshake_is_symmetric() {
    let mut a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;

    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;
    a.expect_connected(b.id()).await;

    let a_table = a.node.routing_table().await.unwrap();
    assert_eq!(a_table.len(), 1);
    assert_eq!(a_table[0].node_id, b.id());
    assert_eq!(a_table[0].address, b.tcp());

    assert_eq!(a.node.active_peers().await.unwrap(), vec![b.id()]);
    assert_eq!(b.node.active_peers().await.unwrap(), vec![a.id()]);
}

#[tokio::test]
async fn test_receiver_replies_exactly_once() {
    let b = TestNode::spawn().await;
    let identity = LocalIdentity::new(
        IdentityKeyPair::generate().unwrap(),
        AgreementKeyPair::generate(),
    );

    let mut raw = RawPeer::connect(b.tcp()).await;
    let hello = serde_json::to_value(Envelope::Handshake(identity.handshake(None))).unwrap();
    raw.send_json(&hello).await;
    let reply = raw.recv_type("HANDSHAKE").await;
    let record: HandshakeRecord = serde_json::from_value(reply).unwrap();
    assert_eq!(record.id, b.id());
    assert_eq!(record.listen_port, Some(b.tcp().port()));

    // A second HANDSHAKE re-keys but does not trigger another reply.
    raw.send_json(&hello).await;
    raw.send_json(&json!({ "type": "PING", "senderId": identity.node_id().to_hex(), "rpcId": 1 }))
        .await;
    let next = raw.recv_json().await;
    assert_eq!(next["type"], "PONG");
}

#[tokio::test]
async fn test_forged_identity_is_rejected() {
    let mut b = TestNode::spawn().await;
    let honest = LocalIdentity::new(
        IdentityKeyPair::generate().unwrap(),
        AgreementKeyPair::generate(),
    );
    let other = LocalIdentity::new(
        IdentityKeyPair::generate().unwrap(),
        AgreementKeyPair::generate(),
    );

    // Claim another node's id with our own key.
    let mut record = honest.handshake(None);
    record.id = other.node_id();

    let mut raw = RawPeer::connect(b.tcp()).await;
    raw.send_json(&serde_json::to_value(Envelope::Handshake(record)).unwrap())
        .await;

    b.expect_event(|e| matches!(e, NodeEvent::Error { kind: ErrorKind::Handshake, .. }))
        .await;
    assert!(!b.node.has_session(other.node_id()).await.unwrap());
    assert!(b.node.routing_table().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dial_failure_is_reported() {
    let a = TestNode::spawn().await;
    let closed: SocketAddr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let result = tokio::time::timeout(WAIT, a.node.connect(closed)).await.unwrap();
    assert!(matches!(result, Err(ag_node::NodeError::DialFailure { .. })));
}
