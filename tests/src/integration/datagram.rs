//! # Datagram Scenarios

use super::support::TestNode;
use ag_node::{Node, NodeConfig, NodeError, NodeEvent};

#[tokio::test]
async fn test_datagram_delivered_with_source() {
    let a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;

    let payload: Vec<u8> = (0..=255u8).collect();
    a.node.send_datagram(b.udp(), &payload).await.unwrap();

    let event = b
        .expect_event(|e| matches!(e, NodeEvent::StreamData { .. }))
        .await;
    assert_eq!(
        event,
        NodeEvent::StreamData {
            payload,
            source: a.udp(),
        }
    );
}

#[tokio::test]
async fn test_datagram_needs_no_handshake_or_session() {
    let a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;

    a.node.send_datagram(b.udp(), b"frame-1").await.unwrap();
    b.expect_event(|e| matches!(e, NodeEvent::StreamData { .. }))
        .await;

    assert!(b.node.routing_table().await.unwrap().is_empty());
    assert!(!b.node.has_session(a.id()).await.unwrap());
}

#[tokio::test]
async fn test_large_datagram_is_not_truncated() {
    let a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;

    let payload = vec![0xAB; 60 * 1024];
    a.node.send_datagram(b.udp(), &payload).await.unwrap();

    let event = b
        .expect_event(|e| matches!(e, NodeEvent::StreamData { .. }))
        .await;
    let NodeEvent::StreamData { payload: got, .. } = event else {
        unreachable!()
    };
    assert_eq!(got.len(), payload.len());
}

#[tokio::test]
async fn test_send_before_bind_is_not_bound() {
    let a = Node::new(NodeConfig::for_testing()).unwrap();
    let b = TestNode::spawn().await;
    assert_eq!(
        a.send_datagram(b.udp(), b"x").await,
        Err(NodeError::NotBound)
    );

    a.bind_datagram(0).await.unwrap();
    a.send_datagram(b.udp(), b"x").await.unwrap();
}
