//! # Node Events
//!
//! Outbound notifications for collaborators (UI facades, bridges).
//! Uses `tokio::sync::broadcast`, so every subscriber sees every event
//! published after it subscribed.

use crate::error::ErrorKind;
use ag_peer_discovery::NodeId;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::Stream;
use tracing::debug;

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something that happened on the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A handshake from `id` completed.
    PeerConnected {
        /// Remote node id.
        id: NodeId,
    },
    /// The connection carrying `id` closed.
    PeerDisconnected {
        /// Remote node id.
        id: NodeId,
    },
    /// A MESSAGE decrypted successfully.
    MessageReceived {
        /// Sender.
        from_id: NodeId,
        /// Plaintext.
        content: String,
        /// Sender's timestamp, milliseconds since epoch.
        timestamp: u64,
    },
    /// A raw datagram arrived.
    StreamData {
        /// Exact datagram bytes.
        payload: Vec<u8>,
        /// Sender address.
        source: SocketAddr,
    },
    /// A frame, message or handshake was dropped.
    Error {
        /// Category.
        kind: ErrorKind,
        /// Human-readable detail.
        detail: String,
    },
}

/// Publishes [`NodeEvent`]s to subscribers.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<NodeEvent>,
    events_published: AtomicU64,
    capacity: usize,
}

impl EventBus {
    /// Create a bus with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: NodeEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Event published with no subscribers");
                0
            }
        }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Total events published.
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

/// A subscription handle.
pub struct EventSubscription {
    receiver: broadcast::Receiver<NodeEvent>,
}

impl EventSubscription {
    /// A subscription that is already closed.
    pub fn closed() -> Self {
        let (_, receiver) = broadcast::channel(1);
        Self { receiver }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the node has shut down. Events missed because the
    /// subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<NodeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some events dropped");
                }
            }
        }
    }

    /// Receive without waiting. `None` if nothing is queued or the bus closed.
    pub fn try_recv(&mut self) -> Option<NodeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Convert into a `Stream`.
    pub fn into_stream(self) -> EventStream {
        EventStream {
            inner: BroadcastStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter over a subscription.
pub struct EventStream {
    inner: BroadcastStream<NodeEvent>,
}

impl Stream for EventStream {
    type Item = NodeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Event stream lagged, some events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
