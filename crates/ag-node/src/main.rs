//! # Antigravity Node Binary
//!
//! ```bash
//! ag-node --tcp-port 5000 --udp-port 5001 --bootstrap 10.0.0.2:5000
//! AG_LOG_LEVEL=debug ag-node --config node.toml
//! ```
//!
//! Starts both transports, joins every bootstrap node, logs events and
//! shuts down on Ctrl+C.

use std::net::IpAddr;
use std::path::PathBuf;

use ag_node::telemetry::{init_logging, LogConfig};
use ag_node::{HandshakeMode, Node, NodeConfig, NodeEvent};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "ag-node", version, about = "Antigravity peer-to-peer node")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "AG_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<IpAddr>,

    /// Reliable transport port.
    #[arg(long)]
    tcp_port: Option<u16>,

    /// Datagram transport port.
    #[arg(long)]
    udp_port: Option<u16>,

    /// Bootstrap node to join (repeatable).
    #[arg(long = "bootstrap", value_name = "IP:PORT")]
    bootstrap: Vec<String>,

    /// `mutual` or `initiator_only`.
    #[arg(long)]
    handshake_mode: Option<HandshakeMode>,
}

impl Cli {
    fn into_config(self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => NodeConfig::default(),
        };
        config.apply_env();

        if let Some(host) = self.host {
            config.network.host = host;
        }
        if let Some(port) = self.tcp_port {
            config.network.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            config.network.udp_port = port;
        }
        if !self.bootstrap.is_empty() {
            config.network.bootstrap_nodes = self.bootstrap;
        }
        if let Some(mode) = self.handshake_mode {
            config.session.handshake_mode = mode;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LogConfig::from_env()).context("Failed to initialize logging")?;

    let config = Cli::parse().into_config()?;
    let bootstrap = config.bootstrap_addrs()?;

    info!("===========================================");
    info!("  Antigravity Node v{}", ag_node::VERSION);
    info!("===========================================");

    let node = Node::new(config).context("Failed to create node")?;
    let mut events = node.subscribe();
    let addrs = node.start().await.context("Failed to start transports")?;
    info!(node_id = %node.id(), tcp = ?addrs.tcp, udp = ?addrs.udp, "Node ready");

    for addr in bootstrap {
        match node.join(addr).await {
            Ok(peers) => info!(bootstrap = %addr, peers = peers.len(), "Bootstrap complete"),
            Err(e) => warn!(bootstrap = %addr, error = %e, "Bootstrap failed"),
        }
    }

    info!("Press Ctrl+C to stop");
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
            event = events.recv() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
        }
    }

    info!("Shutting down...");
    node.shutdown().await?;
    info!("Node stopped");
    Ok(())
}

fn log_event(event: &NodeEvent) {
    match event {
        NodeEvent::PeerConnected { id } => info!(peer = %id, "Peer connected"),
        NodeEvent::PeerDisconnected { id } => info!(peer = %id, "Peer disconnected"),
        NodeEvent::MessageReceived {
            from_id,
            content,
            timestamp,
        } => info!(from = %from_id, timestamp, "Message: {content}"),
        NodeEvent::StreamData { payload, source } => {
            debug!(%source, len = payload.len(), "Stream data")
        }
        NodeEvent::Error { kind, detail } => warn!(?kind, %detail, "Node error"),
    }
}
