//! # Framing Scenarios

use super::support::{node_id, RawPeer, TestNode};
use ag_node::{ErrorKind, FramingStrategy, NodeConfig, NodeEvent};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_frame_split_across_reads() {
    let b = TestNode::spawn().await;
    let mut raw = RawPeer::connect(b.tcp()).await;

    let ping = json!({ "type": "PING", "senderId": node_id(1).to_hex(), "rpcId": 3 }).to_string();
    let (head, tail) = ping.as_bytes().split_at(10);

    raw.send_raw(head).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    raw.send_raw(tail).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    raw.send_raw(b"\n").await;

    let pong = raw.recv_json().await;
    assert_eq!(pong["type"], "PONG");
    assert_eq!(pong["rpcId"], 3);
}

#[tokio::test]
async fn test_many_frames_in_one_write() {
    let b = TestNode::spawn().await;
    let mut raw = RawPeer::connect(b.tcp()).await;

    let mut batch = String::new();
    for rpc in 1..=3 {
        batch.push_str(
            &json!({ "type": "PING", "senderId": node_id(rpc).to_hex(), "rpcId": rpc })
                .to_string(),
        );
        batch.push('\n');
    }
    batch.push_str("\n   \n");
    raw.send_raw(batch.as_bytes()).await;

    for rpc in 1..=3 {
        let pong = raw.recv_json().await;
        assert_eq!(pong["rpcId"], rpc);
    }
}

#[tokio::test]
async fn test_bad_frame_is_isolated() {
    let mut b = TestNode::spawn().await;
    let mut raw = RawPeer::connect(b.tcp()).await;

    raw.send_raw(b"{\"type\":\n").await;
    b.expect_event(|e| matches!(e, NodeEvent::Error { kind: ErrorKind::FrameParse, .. }))
        .await;

    raw.send_json(&json!({ "type": "PING", "senderId": node_id(2).to_hex() }))
        .await;
    assert_eq!(raw.recv_json().await["type"], "PONG");
}

#[tokio::test]
async fn test_oversized_frame_is_discarded() {
    let mut config = NodeConfig::for_testing();
    config.transport.max_frame_len = 256;
    let mut b = TestNode::with_config(config).await;
    let mut raw = RawPeer::connect(b.tcp()).await;

    raw.send_raw(&vec![b'x'; 1024]).await;
    b.expect_event(|e| matches!(e, NodeEvent::Error { kind: ErrorKind::FrameParse, .. }))
        .await;

    // Whatever remains of the long line is dropped at the next delimiter;
    // the connection keeps working afterwards.
    raw.send_raw(b"\n").await;
    raw.send_json(&json!({ "type": "PING", "senderId": node_id(4).to_hex() }))
        .await;
    assert_eq!(raw.recv_type("PONG").await["type"], "PONG");
}

#[tokio::test]
async fn test_length_prefixed_nodes_interoperate() {
    let mut config = NodeConfig::for_testing();
    config.transport.framing = FramingStrategy::LengthPrefixed;

    let mut a = TestNode::with_config(config.clone()).await;
    let mut b = TestNode::with_config(config).await;
    a.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(a.id()).await;
    a.expect_connected(b.id()).await;

    a.node
        .send_message(b.id(), "line one\nline two")
        .await
        .unwrap();
    let event = b
        .expect_event(|e| matches!(e, NodeEvent::MessageReceived { .. }))
        .await;
    assert!(matches!(
        event,
        NodeEvent::MessageReceived { ref content, .. } if content == "line one\nline two"
    ));
}
