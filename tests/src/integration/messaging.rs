//! # Encrypted Messaging Scenarios

use super::support::{RawPeer, TestNode};
use ag_crypto::{AgreementKeyPair, IdentityKeyPair, SessionCipher, SessionKey, StaticKeyCipher};
use ag_node::envelope::{Envelope, HandshakeRecord, MessageRecord, WirePayload};
use ag_node::handshake::{verify_handshake, LocalIdentity};
use ag_node::{ErrorKind, HandshakeMode, NodeError, NodeEvent};
use std::time::Duration;

async fn connected_pair() -> (TestNode, TestNode) {
    let mut a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;
    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;
    a.expect_connected(b.id()).await;
    (a, b)
}

/// A raw peer that completed a handshake with `node` and holds the
/// matching session cipher.
async fn handshaken_raw_peer(node: &TestNode) -> (RawPeer, LocalIdentity, StaticKeyCipher) {
    let identity = LocalIdentity::new(
        IdentityKeyPair::generate().unwrap(),
        AgreementKeyPair::generate(),
    );
    let mut raw = RawPeer::connect(node.tcp()).await;
    raw.send_json(&serde_json::to_value(Envelope::Handshake(identity.handshake(None))).unwrap())
        .await;

    let reply: HandshakeRecord =
        serde_json::from_value(raw.recv_type("HANDSHAKE").await).unwrap();
    let verified = verify_handshake(&reply).unwrap();
    let secret = identity.agreement().agree(&verified.agreement_key);
    let cipher = StaticKeyCipher::from_shared_secret(&secret);
    (raw, identity, cipher)
}

fn message(identity: &LocalIdentity, cipher: &dyn SessionCipher, text: &str) -> serde_json::Value {
    let payload = cipher.encrypt(text.as_bytes()).unwrap();
    serde_json::to_value(Envelope::Message(MessageRecord {
        from_id: identity.node_id(),
        payload: WirePayload::from(&payload),
        timestamp: 1_700_000_000_000,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_message_roundtrip_both_directions() {
    let (mut a, mut b) = connected_pair().await;

    a.node.send_message(b.id(), "hello from a").await.unwrap();
    let event = b
        .expect_event(|e| matches!(e, NodeEvent::MessageReceived { .. }))
        .await;
    let NodeEvent::MessageReceived {
        from_id,
        content,
        timestamp,
    } = event
    else {
        unreachable!()
    };
    assert_eq!(from_id, a.id());
    assert_eq!(content, "hello from a");
    assert!(timestamp > 0);

    b.node.send_message(a.id(), "héllo bäck ✓").await.unwrap();
    let event = a
        .expect_event(|e| matches!(e, NodeEvent::MessageReceived { .. }))
        .await;
    assert!(matches!(
        event,
        NodeEvent::MessageReceived { ref content, .. } if content == "héllo bäck ✓"
    ));
}

#[tokio::test]
async fn test_messages_arrive_in_order() {
    let (a, mut b) = connected_pair().await;

    for i in 0..20 {
        a.node.send_message(b.id(), &format!("msg-{i}")).await.unwrap();
    }
    for i in 0..20 {
        let event = b
            .expect_event(|e| matches!(e, NodeEvent::MessageReceived { .. }))
            .await;
        let NodeEvent::MessageReceived { content, .. } = event else {
            unreachable!()
        };
        assert_eq!(content, format!("msg-{i}"));
    }
}

#[tokio::test]
async fn test_wrong_key_is_dropped_and_session_survives() {
    let mut b = TestNode::spawn().await;
    let (mut raw, identity, cipher) = handshaken_raw_peer(&b).await;
    b.expect_connected(identity.node_id()).await;

    let wrong = StaticKeyCipher::new(SessionKey::generate());
    raw.send_json(&message(&identity, &wrong, "forged")).await;
    b.expect_event(|e| {
        matches!(e, NodeEvent::Error { kind: ErrorKind::AuthenticationFailure, .. })
    })
    .await;

    // The real session still works.
    raw.send_json(&message(&identity, &cipher, "genuine")).await;
    let event = b
        .expect_event(|e| matches!(e, NodeEvent::MessageReceived { .. }))
        .await;
    assert!(matches!(
        event,
        NodeEvent::MessageReceived { ref content, from_id, .. }
            if content == "genuine" && from_id == identity.node_id()
    ));
}

#[tokio::test]
async fn test_node_message_decrypts_with_agreed_key() {
    let b = TestNode::spawn().await;
    let (mut raw, identity, cipher) = handshaken_raw_peer(&b).await;

    // B's session with us is established before it answered our handshake.
    b.node.send_message(identity.node_id(), "to raw").await.unwrap();
    let value = raw.recv_type("MESSAGE").await;
    let Envelope::Message(record) = serde_json::from_value(value).unwrap() else {
        panic!("expected MESSAGE");
    };
    assert_eq!(record.from_id, b.id());
    assert_eq!(hex::decode(&record.payload.iv).unwrap().len(), 12);
    assert_eq!(hex::decode(&record.payload.auth_tag).unwrap().len(), 16);

    let payload = (&record.payload).try_into().unwrap();
    assert_eq!(cipher.decrypt(&payload).unwrap(), b"to raw");
}

#[tokio::test]
async fn test_spoofed_sender_is_dropped() {
    let (a, mut b) = connected_pair().await;
    let (mut raw, identity, cipher) = handshaken_raw_peer(&b).await;
    b.expect_connected(identity.node_id()).await;

    // Claim to be A on a connection bound to someone else.
    let payload = cipher.encrypt(b"i am a").unwrap();
    let forged = Envelope::Message(MessageRecord {
        from_id: a.id(),
        payload: WirePayload::from(&payload),
        timestamp: 1,
    });
    raw.send_json(&serde_json::to_value(forged).unwrap()).await;

    b.expect_event(|e| {
        matches!(e, NodeEvent::Error { kind: ErrorKind::AuthenticationFailure, .. })
    })
    .await;
    b.expect_quiet(Duration::from_millis(200), |e| {
        matches!(e, NodeEvent::MessageReceived { .. })
    })
    .await;
}

#[tokio::test]
async fn test_initiator_only_dialer_cannot_message() {
    let mut a = TestNode::with_mode(HandshakeMode::InitiatorOnly).await;
    let mut b = TestNode::with_mode(HandshakeMode::InitiatorOnly).await;
    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;

    assert_eq!(
        a.node.send_message(b.id(), "hi").await,
        Err(NodeError::NotConnected(b.id()))
    );

    // B can send, but A has no session to decrypt with.
    b.node.send_message(a.id(), "hi").await.unwrap();
    a.expect_event(|e| matches!(e, NodeEvent::Error { kind: ErrorKind::NoSession, .. }))
        .await;
}
