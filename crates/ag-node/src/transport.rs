//! # Transport Tasks
//!
//! Socket I/O runs in spawned tasks that report back to the node event loop
//! through a bounded `mpsc` channel of [`TransportEvent`]s. The loop is the
//! only owner of connection state.
//!
//! | Task | Lifetime |
//! |------|----------|
//! | accept loop | until the listener is replaced or the node stops |
//! | connection reader | until EOF, a socket error, an unrecoverable frame error, or abort |
//! | connection writer | until its sender is dropped, a write fails, or abort |
//! | datagram receiver | until a receive error or the socket is replaced |

use crate::error::{FrameError, NodeError};
use crate::framing::{FrameDecoder, FramingStrategy};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Datagram receive buffer size.
pub const DATAGRAM_BUFFER_LEN: usize = 64 * 1024;

/// Frames a connection may queue for its writer by default.
pub const DEFAULT_OUTBOUND_QUEUE_LEN: usize = 256;

const READ_CHUNK_LEN: usize = 8 * 1024;

/// Identifier for one reliable connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Accepted by our listener.
    Inbound,
    /// Dialed by us.
    Outbound,
}

/// Messages from transport tasks to the event loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// The listener accepted a connection.
    Accepted {
        /// Accepted stream.
        stream: TcpStream,
        /// Remote address.
        remote: SocketAddr,
    },
    /// An outbound dial finished.
    Dialed {
        /// Connection id reserved when the dial started.
        conn: ConnectionId,
        /// Dialed address.
        addr: SocketAddr,
        /// Stream or the dial error.
        result: Result<TcpStream, NodeError>,
    },
    /// A complete frame arrived.
    Frame {
        /// Source connection.
        conn: ConnectionId,
        /// Frame bytes without delimiter or prefix.
        frame: Vec<u8>,
    },
    /// A frame was discarded but the connection stays up.
    FrameDropped {
        /// Source connection.
        conn: ConnectionId,
        /// Reason.
        error: FrameError,
    },
    /// The connection closed.
    Closed {
        /// Closed connection.
        conn: ConnectionId,
        /// `None` for a clean EOF.
        reason: Option<String>,
    },
    /// A datagram arrived.
    Datagram {
        /// Exact bytes.
        payload: Vec<u8>,
        /// Sender.
        source: SocketAddr,
    },
    /// The datagram socket failed and stopped receiving.
    DatagramClosed {
        /// Socket generation that failed.
        generation: u64,
        /// OS error text.
        reason: String,
    },
}

/// Sender half used by transport tasks.
pub type TransportSender = mpsc::Sender<TransportEvent>;

/// Event-loop side of one open connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Connection id.
    pub id: ConnectionId,
    /// Remote socket address.
    pub remote: SocketAddr,
    /// Who opened it.
    pub direction: Direction,
    outbound: mpsc::Sender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Queue framed bytes for the writer task.
    ///
    /// # Errors
    ///
    /// `OutboundQueueFull` if the remote is not draining the socket,
    /// `ConnectionClosed` if the writer has stopped.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), NodeError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => NodeError::OutboundQueueFull,
            TrySendError::Closed(_) => NodeError::ConnectionClosed,
        })
    }

    /// Stop reading immediately and let the writer flush and shut down.
    pub fn close(self) {
        self.reader.abort();
        drop(self.outbound);
    }

    /// Stop both tasks now, discarding queued frames.
    pub fn abort(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Per-connection framing and queue limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Frame boundary rule.
    pub framing: FramingStrategy,
    /// Largest accepted frame.
    pub max_frame_len: usize,
    /// Writer queue depth.
    pub outbound_queue_len: usize,
}

/// Split a stream into reader and writer tasks.
pub fn spawn_connection(
    id: ConnectionId,
    stream: TcpStream,
    remote: SocketAddr,
    direction: Direction,
    limits: ConnectionLimits,
    events: TransportSender,
) -> ConnectionHandle {
    let (read_half, write_half) = stream.into_split();
    let (outbound, outbound_rx) = mpsc::channel(limits.outbound_queue_len.max(1));

    let writer = tokio::spawn(write_loop(id, write_half, outbound_rx));
    let reader = tokio::spawn(read_loop(
        id,
        read_half,
        FrameDecoder::new(limits.framing, limits.max_frame_len),
        events,
    ));

    ConnectionHandle {
        id,
        remote,
        direction,
        outbound,
        reader,
        writer,
    }
}

async fn read_loop(
    id: ConnectionId,
    mut read_half: OwnedReadHalf,
    mut decoder: FrameDecoder,
    events: TransportSender,
) {
    let mut chunk = vec![0u8; READ_CHUNK_LEN];

    let reason = loop {
        let n = match read_half.read(&mut chunk).await {
            Ok(0) => break None,
            Ok(n) => n,
            Err(e) => break Some(e.to_string()),
        };
        decoder.extend(&chunk[..n]);

        let mut fatal = None;
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    if events
                        .send(TransportEvent::Frame { conn: id, frame })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Ok(None) => break,
                Err(error) if decoder.is_recoverable() => {
                    warn!(conn = %id, %error, "Discarding oversized frame");
                    if events
                        .send(TransportEvent::FrameDropped { conn: id, error })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(error) => {
                    fatal = Some(error.to_string());
                    break;
                }
            }
        }
        if fatal.is_some() {
            break fatal;
        }
    };

    debug!(conn = %id, ?reason, "Reader stopped");
    let _ = events
        .send(TransportEvent::Closed { conn: id, reason })
        .await;
}

async fn write_loop(
    id: ConnectionId,
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_half.write_all(&frame).await {
            warn!(conn = %id, error = %e, "Write failed, dropping connection writer");
            return;
        }
    }
    let _ = write_half.shutdown().await;
}

/// Bind a listener and spawn its accept loop.
///
/// # Errors
///
/// `BindFailure` if the address cannot be bound.
pub async fn listen(
    addr: SocketAddr,
    events: TransportSender,
) -> Result<(SocketAddr, JoinHandle<()>), NodeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| NodeError::BindFailure {
            transport: "tcp",
            addr,
            reason: e.to_string(),
        })?;
    let local = listener.local_addr().map_err(|e| NodeError::BindFailure {
        transport: "tcp",
        addr,
        reason: e.to_string(),
    })?;

    info!(addr = %local, "TCP transport listening");
    let task = tokio::spawn(accept_loop(listener, events));
    Ok((local, task))
}

async fn accept_loop(listener: TcpListener, events: TransportSender) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                debug!(%remote, "Accepted connection");
                if events
                    .send(TransportEvent::Accepted { stream, remote })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                // Per-connection accept errors (e.g. EMFILE) must not stop the listener.
                error!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Dial `addr` with a timeout and report the outcome as [`TransportEvent::Dialed`].
pub fn spawn_dial(
    conn: ConnectionId,
    addr: SocketAddr,
    timeout: Duration,
    events: TransportSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(NodeError::DialFailure {
                addr,
                reason: e.to_string(),
            }),
            Err(_) => Err(NodeError::DialFailure {
                addr,
                reason: "timed out".into(),
            }),
        };
        let _ = events
            .send(TransportEvent::Dialed { conn, addr, result })
            .await;
    })
}

/// Bind a datagram socket and spawn its receive loop.
///
/// # Errors
///
/// `BindFailure` if the address cannot be bound.
pub async fn bind_datagram(
    addr: SocketAddr,
    generation: u64,
    events: TransportSender,
) -> Result<(Arc<UdpSocket>, SocketAddr, JoinHandle<()>), NodeError> {
    let bind_err = |e: std::io::Error| NodeError::BindFailure {
        transport: "udp",
        addr,
        reason: e.to_string(),
    };
    let socket = Arc::new(UdpSocket::bind(addr).await.map_err(bind_err)?);
    let local = socket.local_addr().map_err(bind_err)?;

    info!(addr = %local, "UDP transport bound");
    let task = tokio::spawn(receive_loop(Arc::clone(&socket), generation, events));
    Ok((socket, local, task))
}

async fn receive_loop(socket: Arc<UdpSocket>, generation: u64, events: TransportSender) {
    let mut buf = vec![0u8; DATAGRAM_BUFFER_LEN];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, source)) => {
                let event = TransportEvent::Datagram {
                    payload: buf[..n].to_vec(),
                    source,
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                error!(error = %e, "Datagram receive failed, closing socket");
                let _ = events
                    .send(TransportEvent::DatagramClosed {
                        generation,
                        reason: e.to_string(),
                    })
                    .await;
                return;
            }
        }
    }
}

/// Send one datagram.
///
/// # Errors
///
/// `DialFailure` carrying the OS error if the send fails.
pub async fn send_datagram(
    socket: &UdpSocket,
    addr: SocketAddr,
    payload: &[u8],
) -> Result<(), NodeError> {
    socket
        .send_to(payload, addr)
        .await
        .map(|_| ())
        .map_err(|e| NodeError::DialFailure {
            addr,
            reason: e.to_string(),
        })
}
