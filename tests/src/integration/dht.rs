//! # DHT Scenarios

use super::support::{node_id, RawPeer, TestNode};
use ag_node::{NodeConfig, NodeError, NodeEvent};
use serde_json::json;

#[tokio::test]
async fn test_find_node_returns_peers_by_xor_distance() {
    let b = TestNode::spawn().await;
    let mut raw = RawPeer::connect(b.tcp()).await;

    // Each PING records its sender, in insertion order that differs from
    // distance order.
    for (rpc, first) in [(1u64, 0x40u8), (2, 0x08), (3, 0x80), (4, 0x10), (5, 0x20)] {
        raw.send_json(&json!({
            "type": "PING",
            "senderId": node_id(first).to_hex(),
            "rpcId": rpc,
        }))
        .await;
        let pong = raw.recv_json().await;
        assert_eq!(pong["type"], "PONG");
        assert_eq!(pong["senderId"], b.id().to_hex());
        assert_eq!(pong["rpcId"], rpc);
    }

    let target = node_id(0x0F);
    raw.send_json(&json!({
        "type": "FIND_NODE",
        "senderId": node_id(0xFF).to_hex(),
        "targetId": target.to_hex(),
        "rpcId": 9,
    }))
    .await;
    let nodes = raw.recv_json().await;
    assert_eq!(nodes["type"], "NODES");
    assert_eq!(nodes["rpcId"], 9);

    // The requester was recorded before the lookup, so it is included.
    let ids: Vec<String> = nodes["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = [0x08, 0x10, 0x20, 0x40, 0x80, 0xFF]
        .into_iter()
        .map(|b| node_id(b).to_hex())
        .collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_find_node_caps_at_k() {
    let mut config = NodeConfig::for_testing();
    config.kademlia.k = 3;
    let b = TestNode::with_config(config).await;
    let mut raw = RawPeer::connect(b.tcp()).await;

    for first in 1..=5u8 {
        raw.send_json(&json!({ "type": "PING", "senderId": node_id(first).to_hex() }))
            .await;
        raw.recv_type("PONG").await;
    }

    // k = 3 with LRU eviction: only the three most recent survive.
    let table = b.node.routing_table().await.unwrap();
    let ids: Vec<_> = table.iter().map(|p| p.node_id).collect();
    assert_eq!(ids, vec![node_id(3), node_id(4), node_id(5)]);

    raw.send_json(&json!({
        "type": "FIND_NODE",
        "senderId": node_id(5).to_hex(),
        "targetId": node_id(0).to_hex(),
    }))
    .await;
    let nodes = raw.recv_type("NODES").await;
    assert_eq!(nodes["nodes"].as_array().unwrap().len(), 3);
    assert!(nodes.get("rpcId").is_none());
}

#[tokio::test]
async fn test_unknown_dht_command_gets_error() {
    let b = TestNode::spawn().await;
    let mut raw = RawPeer::connect(b.tcp()).await;

    raw.send_json(&json!({
        "type": "STORE",
        "senderId": node_id(1).to_hex(),
        "rpcId": 7,
    }))
    .await;

    let error = raw.recv_json().await;
    assert_eq!(error["type"], "ERROR");
    assert_eq!(error["message"], "Unknown DHT command: STORE");
    assert_eq!(error["rpcId"], 7);

    // Unknown commands never add the sender.
    assert!(b.node.routing_table().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ping_and_find_node_between_nodes() {
    let mut a = TestNode::spawn().await;
    let mut b = TestNode::spawn().await;
    let mut c = TestNode::spawn().await;

    c.node.connect(b.tcp()).await.unwrap();
    b.expect_connected(c.id()).await;
    a.node.connect(b.tcp()).await.unwrap();
    a.expect_connected(b.id()).await;

    assert_eq!(a.node.ping(b.id()).await.unwrap(), b.id());

    let peers = a.node.find_node(b.id(), c.id()).await.unwrap();
    assert_eq!(peers[0].node_id, c.id());
    assert_eq!(peers[0].address, c.tcp());
    assert!(peers.iter().any(|p| p.node_id == a.id()));

    // C was learned from the NODES reply.
    let closest = a.node.closest_peers(c.id(), 1).await.unwrap();
    assert_eq!(closest[0].node_id, c.id());
    c.expect_connected(b.id()).await;
}

#[tokio::test]
async fn test_join_discovers_bootstrap_neighbours() {
    let mut bootstrap = TestNode::spawn().await;
    let c = TestNode::spawn().await;
    let d = TestNode::spawn().await;
    for peer in [&c, &d] {
        peer.node.connect(bootstrap.tcp()).await.unwrap();
        bootstrap.expect_connected(peer.id()).await;
    }

    let a = TestNode::spawn().await;
    let found = a.node.join(bootstrap.tcp()).await.unwrap();
    let found_ids: Vec<_> = found.iter().map(|p| p.node_id).collect();
    assert!(found_ids.contains(&c.id()));
    assert!(found_ids.contains(&d.id()));
    assert!(!found_ids.contains(&a.id()));

    let table: Vec<_> = a
        .node
        .routing_table()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.node_id)
        .collect();
    assert_eq!(table.len(), 3);
    for id in [bootstrap.id(), c.id(), d.id()] {
        assert!(table.contains(&id));
    }
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let mut config = NodeConfig::for_testing();
    config.kademlia.request_timeout_ms = 300;
    let a = TestNode::with_config(config).await;

    // Accepts the connection but never speaks.
    let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_addr = silent.local_addr().unwrap();
    let _keep = tokio::spawn(async move {
        let (stream, _) = silent.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        drop(stream);
    });

    assert_eq!(a.node.join(silent_addr).await, Err(NodeError::Timeout(300)));
}

#[tokio::test]
async fn test_error_reply_resolves_request() {
    let mut a = TestNode::spawn().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A fake bootstrap that rejects every request.
    let fake = tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let value: serde_json::Value = serde_json::from_str(&line).unwrap();
            if value["type"] == "FIND_NODE" {
                let reply = json!({ "type": "ERROR", "message": "nope", "rpcId": value["rpcId"] });
                write
                    .write_all(format!("{reply}\n").as_bytes())
                    .await
                    .unwrap();
            }
        }
    });

    assert_eq!(
        a.node.join(addr).await,
        Err(NodeError::UnknownDhtCommand("nope".into()))
    );
    a.expect_quiet(std::time::Duration::from_millis(100), |e| {
        matches!(e, NodeEvent::PeerConnected { .. })
    })
    .await;
    fake.abort();
}

#[tokio::test]
async fn test_learned_peers_keep_reported_last_seen() {
    let a = TestNode::spawn().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bootstrap_id = node_id(0x77);
    let learned_id = node_id(0x33);

    let fake = tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let value: serde_json::Value = serde_json::from_str(&line).unwrap();
            if value["type"] == "FIND_NODE" {
                let reply = json!({
                    "type": "NODES",
                    "senderId": bootstrap_id.to_hex(),
                    "nodes": [{ "id": learned_id.to_hex(), "address": "10.0.0.3:5000", "lastSeen": 1234 }],
                    "rpcId": value["rpcId"],
                });
                write
                    .write_all(format!("{reply}\n").as_bytes())
                    .await
                    .unwrap();
            }
        }
    });

    let peers = a.node.join(addr).await.unwrap();
    assert_eq!(peers.len(), 1);

    let table = a.node.routing_table().await.unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].node_id, learned_id);
    assert_eq!(table[0].last_seen.as_millis(), 1234);
    fake.abort();
}
